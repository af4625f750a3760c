use clap::Parser;

#[tokio::main]
async fn main() {
    let args = deployer::arguments::Arguments::parse();
    observe::tracing::initialize(&observe::Config::new(
        &args.logging.log_filter,
        args.logging.log_stderr_threshold,
    ));
    tracing::info!("running deployer with validated arguments:\n{}", args);
    if let Err(err) = deployer::run(args).await {
        tracing::error!("deployment failed: {err:?}");
        std::process::exit(1);
    }
}
