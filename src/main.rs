mod cli;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (config, command) = match cli::run() {
        cli::RunOutcome::Run(config, command) => (config, command),
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };
    std::process::exit(cli::execute(config, command).await);
}
