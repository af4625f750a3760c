pub mod arguments;
pub mod artifacts;
pub mod config;
pub mod network;
pub mod query;
pub mod workflow;

use {
    artifacts::ArtifactDir,
    config::Config,
    network::AlloyNetwork,
    workflow::{Deployer, Deployment},
};

pub async fn run(args: arguments::Arguments) -> anyhow::Result<Deployment> {
    let config = Config::try_from(args)?;
    let network = AlloyNetwork::new(&config.network);
    tracing::info!(
        node_url = %config.network.node_url,
        sender = %network.sender(),
        artifacts_dir = %config.artifacts_dir.display(),
        "deploying {}",
        config.contract.name
    );

    let deployer = Deployer::new(
        config.contract,
        Box::new(ArtifactDir::new(config.artifacts_dir)),
        Box::new(network),
    );
    // Not locked for the whole run, other threads might log to stdout while
    // the deployer waits on the node.
    let deployment = deployer.run(&mut std::io::stdout()).await?;
    Ok(deployment)
}
