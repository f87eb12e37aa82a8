use std::path::PathBuf;

use clap::Parser;

pub mod private_key;

pub use private_key::PrivateKey;
use reqwest::Url;

use crate::artifacts::ContractSpec;
use crate::constants::TOKEN_CONTRACT_NAME;

#[derive(Debug, Clone, Parser)]
#[clap(rename_all = "kebab-case")]
pub struct Args {
    /// Private key of the deploying account
    #[clap(short, long, env)]
    pub private_key: PrivateKey,

    /// The RPC Url of the network to deploy to
    #[clap(short, long, env)]
    pub rpc_url: Url,

    /// Directory holding the compiled contract artifacts
    #[clap(short, long, env, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    /// Token contract to deploy, either `Name` or `path/To.sol:Name` when
    /// the name alone is ambiguous
    #[clap(short, long, env, default_value = TOKEN_CONTRACT_NAME)]
    pub contract: ContractSpec,
}
