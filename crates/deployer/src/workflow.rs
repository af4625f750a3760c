//! The deployment workflow.
//!
//! A deployment moves strictly forward through
//! `Start → FactoryResolved → Submitted → Confirmed → ReceiptObtained →
//! QueryComplete → Done`. Any failing step aborts the whole workflow, nothing
//! is retried.

use {
    crate::{
        artifacts::Artifacts,
        config::ContractConfig,
        network::{Network, PendingDeployment, Receipt},
        query::Getter,
    },
    alloy::primitives::{Address, TxHash},
    anyhow::{Context, ensure},
    std::io::Write,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("could not resolve contract factory for {name}")]
    Resolution {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("deployment transaction was not accepted by the network")]
    Submission(#[source] anyhow::Error),

    #[error("deployment transaction {tx_hash} was not confirmed")]
    Confirmation {
        tx_hash: TxHash,
        #[source]
        source: anyhow::Error,
    },

    #[error("receipt of confirmed deployment transaction {tx_hash} is unavailable")]
    ReceiptUnavailable {
        tx_hash: TxHash,
        #[source]
        source: anyhow::Error,
    },

    #[error("query {function}() against contract {address} failed")]
    Query {
        function: String,
        address: Address,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write deployment report")]
    Output(#[from] std::io::Error),
}

/// Outcome of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub receipt: Receipt,
    pub table_name: String,
}

pub struct Deployer {
    contract: ContractConfig,
    artifacts: Box<dyn Artifacts>,
    network: Box<dyn Network>,
}

impl Deployer {
    pub fn new(
        contract: ContractConfig,
        artifacts: Box<dyn Artifacts>,
        network: Box<dyn Network>,
    ) -> Self {
        Self {
            contract,
            artifacts,
            network,
        }
    }

    /// Deploys the configured contract once and writes the report lines to
    /// `out` as soon as the information for them is available.
    pub async fn run(&self, out: &mut impl Write) -> Result<Deployment, DeployError> {
        let name = &self.contract.name;
        let resolution_error = |source| DeployError::Resolution {
            name: name.clone(),
            source,
        };

        let factory = self.artifacts.resolve(name).map_err(resolution_error)?;
        let init_code = factory
            .deploy_code(&self.contract.constructor_args)
            .map_err(resolution_error)?;
        let getter = Getter::new(factory.abi(), &self.contract.query_function)
            .map_err(resolution_error)?;
        tracing::debug!(contract = %name, "factory resolved");

        let pending = self
            .network
            .submit_deployment(init_code)
            .await
            .map_err(DeployError::Submission)?;
        tracing::info!(
            tx_hash = %pending.tx_hash,
            expected_address = %pending.expected_address,
            "deployment submitted"
        );

        let address = self
            .network
            .await_deployment(pending)
            .await
            .map_err(|source| DeployError::Confirmation {
                tx_hash: pending.tx_hash,
                source,
            })?;
        tracing::debug!(%address, "deployment confirmed");

        let receipt = self.receipt(pending).await?;
        tracing::info!(
            %address,
            tx_hash = %receipt.transaction_hash,
            block_number = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "contract deployed"
        );
        writeln!(out, "Contract deployed to '{address}'")?;
        writeln!(out, "Transaction hash: '{}'\n", receipt.transaction_hash)?;

        let table_name = self.query(address, &getter).await?;
        tracing::debug!(%table_name, "query complete");
        writeln!(out, "Table name '{table_name}' minted to contract.")?;

        Ok(Deployment {
            address,
            receipt,
            table_name,
        })
    }

    /// Fetches the receipt of a deployment that was already confirmed. A
    /// confirmed transaction always has a receipt, so failing here means the
    /// node is in an inconsistent state.
    async fn receipt(&self, pending: PendingDeployment) -> Result<Receipt, DeployError> {
        let tx_hash = pending.tx_hash;
        let receipt = self
            .network
            .transaction_receipt(tx_hash)
            .await
            .and_then(|receipt| receipt.context("node returned no receipt"))
            .and_then(|receipt| {
                ensure!(
                    receipt.transaction_hash == tx_hash,
                    "node returned receipt of transaction {}",
                    receipt.transaction_hash
                );
                Ok(receipt)
            });
        receipt.map_err(|source| {
            tracing::error!(%tx_hash, ?source, "confirmed deployment has no receipt");
            DeployError::ReceiptUnavailable { tx_hash, source }
        })
    }

    async fn query(&self, address: Address, getter: &Getter) -> Result<String, DeployError> {
        let query_error = |source| DeployError::Query {
            function: getter.name().to_string(),
            address,
            source,
        };
        let calldata = getter.calldata().map_err(query_error)?;
        let data = self
            .network
            .call(address, calldata)
            .await
            .map_err(query_error)?;
        getter.decode(&data).map_err(query_error)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            artifacts::{ContractFactory, MockArtifacts},
            network::MockNetwork,
        },
        alloy::{
            dyn_abi::DynSolValue,
            json_abi::JsonAbi,
            primitives::{B256, Bytes, address, b256, bytes},
        },
        anyhow::anyhow,
        mockall::predicate::eq,
        serde_json::json,
    };

    const ADDRESS: Address = address!("abababababababababababababababababababab");
    const TX_HASH: B256 =
        b256!("4242424242424242424242424242424242424242424242424242424242424242");

    fn pending() -> PendingDeployment {
        PendingDeployment {
            tx_hash: TX_HASH,
            expected_address: ADDRESS,
        }
    }

    fn receipt(transaction_hash: B256) -> Receipt {
        Receipt {
            transaction_hash,
            block_number: Some(7),
            block_hash: Some(B256::repeat_byte(0x07)),
            gas_used: 250_000,
            contract_address: Some(ADDRESS),
            status: true,
        }
    }

    fn contract_config() -> ContractConfig {
        ContractConfig {
            name: "DataContent".to_string(),
            constructor_args: vec![],
            query_function: "tableName".to_string(),
        }
    }

    fn factory() -> ContractFactory {
        let abi: JsonAbi = serde_json::from_value(json!([{
            "type": "function",
            "name": "tableName",
            "inputs": [],
            "outputs": [{ "name": "", "type": "string" }],
            "stateMutability": "view"
        }]))
        .unwrap();
        ContractFactory::new("DataContent", abi, bytes!("60806040")).unwrap()
    }

    fn artifacts() -> MockArtifacts {
        let mut artifacts = MockArtifacts::new();
        artifacts
            .expect_resolve()
            .with(eq("DataContent"))
            .times(1)
            .returning(|_| Ok(factory()));
        artifacts
    }

    fn encoded_table_name(name: &str) -> Bytes {
        DynSolValue::Tuple(vec![DynSolValue::String(name.to_string())])
            .abi_encode_params()
            .into()
    }

    fn table_name_selector() -> Bytes {
        Getter::new(factory().abi(), "tableName")
            .unwrap()
            .calldata()
            .unwrap()
    }

    /// Network whose deployment gets submitted and confirmed.
    fn confirming_network() -> MockNetwork {
        let mut network = MockNetwork::new();
        network
            .expect_submit_deployment()
            .with(eq(bytes!("60806040")))
            .times(1)
            .returning(|_| Ok(pending()));
        network
            .expect_await_deployment()
            .with(eq(pending()))
            .times(1)
            .returning(|_| Ok(ADDRESS));
        network
    }

    fn deployer(artifacts: MockArtifacts, network: MockNetwork) -> Deployer {
        Deployer::new(contract_config(), Box::new(artifacts), Box::new(network))
    }

    fn report_header() -> String {
        format!("Contract deployed to '{ADDRESS}'\nTransaction hash: '{TX_HASH}'\n\n")
    }

    #[tokio::test]
    async fn deploys_and_reports() {
        let mut network = confirming_network();
        network
            .expect_transaction_receipt()
            .with(eq(TX_HASH))
            .times(1)
            .returning(|hash| Ok(Some(receipt(hash))));
        network
            .expect_call()
            .with(eq(ADDRESS), eq(table_name_selector()))
            .times(1)
            .returning(|_, _| Ok(encoded_table_name("my_table")));

        let mut out = Vec::new();
        let deployment = deployer(artifacts(), network)
            .run(&mut out)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(
                "{}Table name 'my_table' minted to contract.\n",
                report_header()
            )
        );
        assert_eq!(
            deployment,
            Deployment {
                address: ADDRESS,
                receipt: receipt(TX_HASH),
                table_name: "my_table".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn unknown_contract_is_not_deployed() {
        let mut artifacts = MockArtifacts::new();
        artifacts
            .expect_resolve()
            .returning(|name| Err(anyhow!("no artifact for contract {name}")));
        let mut network = MockNetwork::new();
        network.expect_submit_deployment().never();

        let mut out = Vec::new();
        let err = deployer(artifacts, network).run(&mut out).await.unwrap_err();

        assert!(matches!(err, DeployError::Resolution { ref name, .. } if name == "DataContent"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn missing_getter_is_detected_before_deploying() {
        let mut network = MockNetwork::new();
        network.expect_submit_deployment().never();
        let contract = ContractConfig {
            query_function: "missing".to_string(),
            ..contract_config()
        };

        let mut out = Vec::new();
        let err = Deployer::new(contract, Box::new(artifacts()), Box::new(network))
            .run(&mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Resolution { .. }));
    }

    #[tokio::test]
    async fn rejected_submission() {
        let mut network = MockNetwork::new();
        network
            .expect_submit_deployment()
            .times(1)
            .returning(|_| Err(anyhow!("insufficient funds for gas * price + value")));
        network.expect_await_deployment().never();

        let mut out = Vec::new();
        let err = deployer(artifacts(), network).run(&mut out).await.unwrap_err();

        assert!(matches!(err, DeployError::Submission(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn confirmation_timeout_stops_the_workflow() {
        let mut network = MockNetwork::new();
        network
            .expect_submit_deployment()
            .times(1)
            .returning(|_| Ok(pending()));
        network
            .expect_await_deployment()
            .times(1)
            .returning(|_| Err(anyhow!("timed out waiting for confirmations")));
        network.expect_transaction_receipt().never();
        network.expect_call().never();

        let mut out = Vec::new();
        let err = deployer(artifacts(), network).run(&mut out).await.unwrap_err();

        assert!(matches!(err, DeployError::Confirmation { tx_hash, .. } if tx_hash == TX_HASH));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn missing_receipt_is_an_error() {
        let mut network = confirming_network();
        network
            .expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(None));
        network.expect_call().never();

        let mut out = Vec::new();
        let err = deployer(artifacts(), network).run(&mut out).await.unwrap_err();

        assert!(matches!(err, DeployError::ReceiptUnavailable { .. }));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn receipt_of_other_transaction_is_rejected() {
        let mut network = confirming_network();
        network
            .expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(Some(receipt(B256::repeat_byte(0x99)))));
        network.expect_call().never();

        let mut out = Vec::new();
        let err = deployer(artifacts(), network).run(&mut out).await.unwrap_err();

        assert!(matches!(err, DeployError::ReceiptUnavailable { tx_hash, .. } if tx_hash == TX_HASH));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn reverted_query_keeps_deployment_lines() {
        let mut network = confirming_network();
        network
            .expect_transaction_receipt()
            .times(1)
            .returning(|hash| Ok(Some(receipt(hash))));
        network
            .expect_call()
            .times(1)
            .returning(|_, _| Err(anyhow!("execution reverted")));

        let mut out = Vec::new();
        let err = deployer(artifacts(), network).run(&mut out).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Query { ref function, address, .. }
                if function == "tableName" && address == ADDRESS
        ));
        assert_eq!(String::from_utf8(out).unwrap(), report_header());
    }

    #[tokio::test]
    async fn every_run_deploys_again() {
        let mut network = MockNetwork::new();
        let mut nonce = 0u64;
        network
            .expect_submit_deployment()
            .times(2)
            .returning(move |_| {
                nonce += 1;
                Ok(PendingDeployment {
                    tx_hash: B256::with_last_byte(nonce as u8),
                    expected_address: Address::with_last_byte(nonce as u8),
                })
            });
        network
            .expect_await_deployment()
            .times(2)
            .returning(|pending| Ok(pending.expected_address));
        network
            .expect_transaction_receipt()
            .times(2)
            .returning(|hash| Ok(Some(receipt(hash))));
        network
            .expect_call()
            .times(2)
            .returning(|_, _| Ok(encoded_table_name("my_table")));
        let mut artifacts = MockArtifacts::new();
        artifacts
            .expect_resolve()
            .times(2)
            .returning(|_| Ok(factory()));
        let deployer = deployer(artifacts, network);

        let first = deployer.run(&mut Vec::new()).await.unwrap();
        let second = deployer.run(&mut Vec::new()).await.unwrap();

        assert_ne!(first.address, second.address);
        assert_ne!(
            first.receipt.transaction_hash,
            second.receipt.transaction_hash
        );
    }

    /// Writer shared between threads that only holds its lock for a single
    /// write, like `std::io::Stdout`.
    #[derive(Clone, Default)]
    struct SharedWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn output_is_not_locked_while_waiting_on_the_network() {
        let out = SharedWriter::default();
        let side = out.clone();
        let mut network = MockNetwork::new();
        network
            .expect_submit_deployment()
            .times(1)
            .returning(move |_| {
                // Another thread writes to the same output while the
                // deployment is in flight.
                let mut side = side.clone();
                let (done, written) = std::sync::mpsc::channel();
                std::thread::spawn(move || {
                    writeln!(side, "log line").unwrap();
                    done.send(()).unwrap();
                });
                written
                    .recv_timeout(std::time::Duration::from_secs(5))
                    .map_err(|_| anyhow!("output stayed locked"))?;
                Ok(pending())
            });
        network
            .expect_await_deployment()
            .times(1)
            .returning(|_| Ok(ADDRESS));
        network
            .expect_transaction_receipt()
            .times(1)
            .returning(|hash| Ok(Some(receipt(hash))));
        network
            .expect_call()
            .times(1)
            .returning(|_, _| Ok(encoded_table_name("my_table")));

        deployer(artifacts(), network)
            .run(&mut out.clone())
            .await
            .unwrap();

        let written = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            written,
            format!(
                "log line\n{}Table name 'my_table' minted to contract.\n",
                report_header()
            )
        );
    }
}
