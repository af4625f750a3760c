//! Explicit configuration of a deployment. Everything the deployer talks to
//! is named here instead of being picked up from ambient state.

use {
    crate::arguments::Arguments,
    alloy::signers::local::PrivateKeySigner,
    anyhow::{Context, Result},
    std::{path::PathBuf, time::Duration},
    url::Url,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub network: NetworkConfig,
    /// Directory containing the compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    pub contract: ContractConfig,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub node_url: Url,
    /// Account paying for and signing the deployment.
    pub signer: PrivateKeySigner,
    /// Number of blocks (including the inclusion block) to wait for before a
    /// deployment counts as confirmed.
    pub confirmations: u64,
    /// Upper bound for the confirmation wait. `None` waits forever.
    pub confirmation_timeout: Option<Duration>,
}

/// What gets deployed and what gets read back afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractConfig {
    pub name: String,
    pub constructor_args: Vec<String>,
    pub query_function: String,
}

impl TryFrom<Arguments> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Arguments) -> Result<Self> {
        let signer = args
            .private_key
            .trim()
            .parse::<PrivateKeySigner>()
            .context("invalid private key")?;

        Ok(Self {
            network: NetworkConfig {
                node_url: args.node_url,
                signer,
                confirmations: args.confirmations,
                confirmation_timeout: args.confirmation_timeout,
            },
            artifacts_dir: args.artifacts_dir,
            contract: ContractConfig {
                name: args.contract,
                constructor_args: args.constructor_args,
                query_function: args.query_function,
            },
        })
    }
}
