//! Access to the chain the contract gets deployed to.

use {
    crate::config::NetworkConfig,
    alloy::{
        network::{EthereumWallet, TransactionBuilder},
        primitives::{Address, B256, Bytes, TxHash},
        providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
        rpc::types::{TransactionReceipt, TransactionRequest},
    },
    anyhow::{Context, Result, ensure},
    std::time::Duration,
};

/// A deployment transaction that was accepted by the node but is not
/// necessarily mined yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDeployment {
    pub tx_hash: TxHash,
    /// Address the contract will live at, derived from the sender and the
    /// nonce of the deployment transaction.
    pub expected_address: Address,
}

/// The parts of a transaction receipt the deployer reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub status: bool,
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            block_hash: receipt.block_hash,
            gas_used: receipt.gas_used,
            contract_address: receipt.contract_address,
            status: receipt.status(),
        }
    }
}

/// Submits transactions to a network and reads its state.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Signs and submits a contract creation transaction with the given init
    /// code. Returns as soon as the node accepted the transaction.
    async fn submit_deployment(&self, init_code: Bytes) -> Result<PendingDeployment>;

    /// Waits until the deployment is mined and returns the address of the
    /// created contract. Fails if the transaction reverted or created a
    /// contract at another address than expected.
    async fn await_deployment(&self, deployment: PendingDeployment) -> Result<Address>;

    /// Fetches the receipt of a mined transaction.
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>>;

    /// Executes a read-only call against a contract.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes>;
}

/// [`Network`] backed by an alloy provider signing with a local key.
pub struct AlloyNetwork {
    provider: DynProvider,
    sender: Address,
    confirmations: u64,
    confirmation_timeout: Option<Duration>,
}

impl AlloyNetwork {
    pub fn new(config: &NetworkConfig) -> Self {
        let sender = config.signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::new(config.signer.clone()))
            .connect_http(config.node_url.clone())
            .erased();
        Self::with_provider(
            provider,
            sender,
            config.confirmations,
            config.confirmation_timeout,
        )
    }

    pub fn with_provider(
        provider: DynProvider,
        sender: Address,
        confirmations: u64,
        confirmation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            sender,
            confirmations,
            confirmation_timeout,
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }
}

#[async_trait::async_trait]
impl Network for AlloyNetwork {
    async fn submit_deployment(&self, init_code: Bytes) -> Result<PendingDeployment> {
        // The nonce is fixed up front so the address of the contract is known
        // before the transaction gets mined.
        let nonce = self
            .provider
            .get_transaction_count(self.sender)
            .pending()
            .await
            .with_context(|| format!("failed to fetch nonce of {}", self.sender))?;
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_nonce(nonce)
            .with_deploy_code(init_code);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("node rejected the deployment transaction")?;
        let deployment = PendingDeployment {
            tx_hash: *pending.tx_hash(),
            expected_address: deployment_address(self.sender, nonce),
        };
        tracing::debug!(?deployment, nonce, "submitted deployment transaction");
        Ok(deployment)
    }

    async fn await_deployment(&self, deployment: PendingDeployment) -> Result<Address> {
        let tx_hash =
            PendingTransactionBuilder::new(self.provider.root().clone(), deployment.tx_hash)
                .with_required_confirmations(self.confirmations)
                .with_timeout(self.confirmation_timeout)
                .watch()
                .await
                .with_context(|| {
                    format!("deployment transaction {} was not mined", deployment.tx_hash)
                })?;

        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .with_context(|| format!("failed to fetch receipt of {tx_hash}"))?
            .with_context(|| format!("mined transaction {tx_hash} has no receipt"))?;
        check_deployment(&Receipt::from(receipt), &deployment)
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .with_context(|| format!("failed to fetch receipt of {tx_hash}"))?;
        Ok(receipt.map(Receipt::from))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        self.provider
            .call(tx)
            .await
            .with_context(|| format!("call to {to} failed"))
    }
}

/// `CREATE` address of a contract deployed by `sender` with `nonce`.
fn deployment_address(sender: Address, nonce: u64) -> Address {
    sender.create(nonce)
}

/// Checks that a mined deployment succeeded and created the contract where it
/// was expected.
fn check_deployment(receipt: &Receipt, deployment: &PendingDeployment) -> Result<Address> {
    let tx_hash = receipt.transaction_hash;
    ensure!(receipt.status, "deployment transaction {tx_hash} reverted");

    let address = receipt
        .contract_address
        .with_context(|| format!("transaction {tx_hash} did not create a contract"))?;
    ensure!(
        address == deployment.expected_address,
        "transaction {tx_hash} created contract {address} instead of {}",
        deployment.expected_address
    );
    Ok(address)
}
