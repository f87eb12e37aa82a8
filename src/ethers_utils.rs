use std::sync::Arc;

use ethers::prelude::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer, Wallet};
use eyre::Context;
use reqwest::Url;
use tracing::{info, instrument};

use crate::cli::PrivateKey;

// TODO: Allow for different wallet kinds
pub type RpcClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub fn wallet(private_key: &PrivateKey, chain_id: u64) -> LocalWallet {
    Wallet::from(private_key.key.clone()).with_chain_id(chain_id)
}

#[instrument(skip_all)]
pub async fn connect(
    rpc_url: &Url,
    private_key: &PrivateKey,
) -> eyre::Result<Arc<RpcClient>> {
    let provider = Provider::try_from(rpc_url.as_str())?;
    let chain_id = provider
        .get_chainid()
        .await
        .with_context(|| {
            format!(
                "Fetching chain id from {}",
                rpc_url.host_str().unwrap_or_default()
            )
        })?;

    let wallet = wallet(private_key, chain_id.as_u64());

    info!(chain_id = %chain_id, deployer = ?wallet.address(), "Connected");

    Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
}
