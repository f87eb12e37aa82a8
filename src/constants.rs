use ethers::types::Address;
use eyre::Context;

/// Address of the Crypto Devs NFT contract deployed in the previous step
pub const CRYPTO_DEVS_NFT_CONTRACT_ADDRESS: &str =
    "0x5FbDB2315678afecb367f032d93F642f64180aa3";

pub const TOKEN_CONTRACT_NAME: &str = "CryptoDevToken";

/// The number of confirmations to wait for the deployment transaction
pub const NUM_DEPLOY_CONFIRMATIONS: usize = 1;

pub const TOKEN_ADDRESS_LABEL: &str = "Crypto Devs Token Contract Address:";

pub fn nft_contract_address() -> eyre::Result<Address> {
    CRYPTO_DEVS_NFT_CONTRACT_ADDRESS.parse::<Address>().with_context(|| {
        format!(
            "Parsing NFT contract address {CRYPTO_DEVS_NFT_CONTRACT_ADDRESS}"
        )
    })
}
