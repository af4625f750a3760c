use {
    clap::Parser,
    std::{
        fmt::{self, Display, Formatter},
        path::PathBuf,
        time::Duration,
    },
    tracing::level_filters::LevelFilter,
    url::Url,
};

#[derive(Parser)]
pub struct LoggingArguments {
    #[clap(long, env, default_value = "warn,deployer=info")]
    pub log_filter: String,

    /// Logs at this level or more severe go to stderr. Defaults to `trace`
    /// which keeps stdout reserved for the deployment report.
    #[clap(long, env, default_value = "trace")]
    pub log_stderr_threshold: LevelFilter,
}

impl Display for LoggingArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            log_filter,
            log_stderr_threshold,
        } = self;

        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "log_stderr_threshold: {log_stderr_threshold}")?;
        Ok(())
    }
}

/// Deploys a compiled contract and reads a value back from it.
#[derive(Parser)]
#[clap(name = "deploy")]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    /// The Ethereum node URL to connect to.
    #[clap(long, env, default_value = "http://localhost:8545")]
    pub node_url: Url,

    /// Private key of the account signing and paying for the deployment.
    #[clap(long, env, hide_env_values = true)]
    pub private_key: String,

    /// Directory containing the Hardhat or Foundry build artifacts.
    #[clap(long, env, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    /// Name of the contract to deploy. Use `<source>:<name>` if several
    /// contracts share the same name.
    #[clap(long, env, default_value = "DataContent")]
    pub contract: String,

    /// Constructor arguments, in the order the constructor declares them.
    #[clap(long, env, use_value_delimiter = true)]
    pub constructor_args: Vec<String>,

    /// Getter queried on the deployed contract once it is confirmed.
    #[clap(long, env, default_value = "tableName")]
    pub query_function: String,

    /// Number of confirmations to wait for before the deployment counts as
    /// mined.
    #[clap(long, env, default_value = "1")]
    pub confirmations: u64,

    /// How long to wait for the deployment to be confirmed. Waits
    /// indefinitely if unset.
    #[clap(long, env, value_parser = humantime::parse_duration)]
    pub confirmation_timeout: Option<Duration>,
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            node_url,
            private_key: _,
            artifacts_dir,
            contract,
            constructor_args,
            query_function,
            confirmations,
            confirmation_timeout,
        } = self;

        write!(f, "{logging}")?;
        writeln!(f, "node_url: {node_url}")?;
        writeln!(f, "private_key: SECRET")?;
        writeln!(f, "artifacts_dir: {}", artifacts_dir.display())?;
        writeln!(f, "contract: {contract}")?;
        writeln!(f, "constructor_args: {constructor_args:?}")?;
        writeln!(f, "query_function: {query_function}")?;
        writeln!(f, "confirmations: {confirmations}")?;
        writeln!(f, "confirmation_timeout: {confirmation_timeout:?}")?;
        Ok(())
    }
}
