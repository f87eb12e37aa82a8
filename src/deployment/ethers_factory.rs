use std::sync::Arc;

use ethers::abi::{Abi, Token};
use ethers::contract::ContractFactory;
use ethers::providers::{Middleware, PendingTransaction};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256};
use eyre::{bail, Context, ContextCompat};
use tracing::{debug, instrument};

use super::{ContractDeployment, DeployFactory, FactorySource, PendingDeployment};
use crate::artifacts::{ArtifactStore, ContractSpec};
use crate::constants::NUM_DEPLOY_CONFIRMATIONS;

/// Builds factories from compiled artifacts, all signing with one client
pub struct ArtifactFactorySource<M> {
    artifacts: ArtifactStore,
    client: Arc<M>,
}

impl<M> ArtifactFactorySource<M> {
    pub fn new(artifacts: ArtifactStore, client: Arc<M>) -> Self {
        Self { artifacts, client }
    }
}

impl<M: Middleware + 'static> FactorySource for ArtifactFactorySource<M> {
    type Factory = EthersContractFactory<M>;

    async fn contract_factory(
        &self,
        spec: &ContractSpec,
    ) -> eyre::Result<EthersContractFactory<M>> {
        let contract = self.artifacts.load(spec).await?;

        Ok(EthersContractFactory::new(
            contract.abi,
            contract.bytecode,
            self.client.clone(),
        ))
    }
}

pub struct EthersContractFactory<M> {
    abi: Abi,
    bytecode: Bytes,
    client: Arc<M>,
}

impl<M: Middleware + 'static> EthersContractFactory<M> {
    pub fn new(abi: Abi, bytecode: Bytes, client: Arc<M>) -> Self {
        Self {
            abi,
            bytecode,
            client,
        }
    }

    /// Creation transaction: bytecode followed by the encoded constructor
    /// argument, not yet filled or signed.
    pub fn deployment_transaction(
        &self,
        constructor_arg: Address,
    ) -> eyre::Result<TypedTransaction> {
        let factory = ContractFactory::new(
            self.abi.clone(),
            self.bytecode.clone(),
            self.client.clone(),
        );

        let deployer = factory
            .deploy_tokens(vec![Token::Address(constructor_arg)])
            .context("Encoding constructor arguments")?;

        Ok(deployer.tx)
    }
}

impl<M: Middleware + 'static> DeployFactory for EthersContractFactory<M> {
    type Pending = EthersPendingDeployment<M>;

    #[instrument(skip_all)]
    async fn deploy(
        &self,
        constructor_arg: Address,
    ) -> eyre::Result<EthersPendingDeployment<M>> {
        let mut tx = self.deployment_transaction(constructor_arg)?;

        self.client
            .fill_transaction(&mut tx, None)
            .await
            .context("Filling deployment transaction")?;

        debug!(nonce = ?tx.nonce(), gas = ?tx.gas(), "Sending deployment transaction");

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .context("Send transaction")?;

        Ok(EthersPendingDeployment {
            transaction_hash: pending.tx_hash(),
            client: self.client.clone(),
        })
    }
}

pub struct EthersPendingDeployment<M> {
    transaction_hash: H256,
    client: Arc<M>,
}

impl<M: Middleware + 'static> PendingDeployment for EthersPendingDeployment<M> {
    fn transaction_hash(&self) -> H256 {
        self.transaction_hash
    }

    #[instrument(skip_all, fields(transaction_hash = ?self.transaction_hash))]
    async fn deployed(self) -> eyre::Result<ContractDeployment> {
        let receipt =
            PendingTransaction::new(self.transaction_hash, self.client.provider())
                .confirmations(NUM_DEPLOY_CONFIRMATIONS)
                .await
                .context("Awaiting receipt")?
                .context("Deployment transaction dropped from the mempool")?;

        if receipt.status != Some(1.into()) {
            bail!(
                "Deployment transaction {:?} reverted",
                self.transaction_hash
            );
        }

        let address = receipt
            .contract_address
            .context("Receipt is missing the contract address")?;

        Ok(ContractDeployment {
            address,
            deployer: receipt.from,
            transaction_hash: receipt.transaction_hash,
        })
    }
}
