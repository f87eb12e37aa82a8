use std::io::Write;

use ethers::types::{Address, H256};
use ethers::utils::to_checksum;
use eyre::Context;
use tracing::{info, instrument};

use crate::artifacts::{ArtifactStore, ContractSpec};
use crate::cli::Args;
use crate::constants::{self, TOKEN_ADDRESS_LABEL};
use crate::ethers_utils;

pub mod ethers_factory;

pub use self::ethers_factory::ArtifactFactorySource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractDeployment {
    pub address: Address,
    pub deployer: Address,
    pub transaction_hash: H256,
}

/// Resolves contract names to something that can deploy them
pub trait FactorySource {
    type Factory: DeployFactory;

    async fn contract_factory(
        &self,
        spec: &ContractSpec,
    ) -> eyre::Result<Self::Factory>;
}

pub trait DeployFactory {
    type Pending: PendingDeployment;

    /// Submits the creation transaction and returns without waiting for it
    /// to be mined.
    async fn deploy(
        &self,
        constructor_arg: Address,
    ) -> eyre::Result<Self::Pending>;
}

pub trait PendingDeployment {
    fn transaction_hash(&self) -> H256;

    /// Resolves once the creation transaction has one confirmation
    async fn deployed(self) -> eyre::Result<ContractDeployment>;
}

/// Deploys `spec` with the address of an already deployed contract as its
/// only constructor argument.
#[instrument(skip_all, fields(contract = %spec))]
pub async fn deploy_with_dependency<S: FactorySource>(
    source: &S,
    spec: &ContractSpec,
    dependency: Address,
) -> eyre::Result<ContractDeployment> {
    let factory = source
        .contract_factory(spec)
        .await
        .with_context(|| format!("Resolving contract factory for {spec}"))?;

    let pending = factory
        .deploy(dependency)
        .await
        .with_context(|| format!("Deploying {spec}"))?;

    info!(
        transaction_hash = ?pending.transaction_hash(),
        "Waiting for deployment confirmation"
    );

    let deployment = pending
        .deployed()
        .await
        .context("Awaiting deployment confirmation")?;

    info!(
        address = ?deployment.address,
        deployer = ?deployment.deployer,
        transaction_hash = ?deployment.transaction_hash,
        "Deployed"
    );

    Ok(deployment)
}

pub fn write_token_address(
    out: &mut impl Write,
    address: Address,
) -> eyre::Result<()> {
    writeln!(out, "{TOKEN_ADDRESS_LABEL} {}", to_checksum(&address, None))?;
    out.flush()?;

    Ok(())
}

/// Deploys the token contract against the NFT contract and prints its
/// address once the deployment is confirmed.
pub async fn deploy_token<S: FactorySource>(
    source: &S,
    spec: &ContractSpec,
    out: &mut impl Write,
) -> eyre::Result<ContractDeployment> {
    let nft_contract = constants::nft_contract_address()?;

    let deployment = deploy_with_dependency(source, spec, nft_contract).await?;

    write_token_address(out, deployment.address)?;

    Ok(deployment)
}

pub async fn run_deployment(args: Args) -> eyre::Result<ContractDeployment> {
    let client =
        ethers_utils::connect(&args.rpc_url, &args.private_key).await?;

    let artifacts = ArtifactStore::new(&args.artifacts_dir);
    info!("Using artifacts from {}", artifacts.root().display());

    let source = ArtifactFactorySource::new(artifacts, client);

    deploy_token(&source, &args.contract, &mut std::io::stdout()).await
}
