pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;

pub use error::AppError;

/// Install the panic hook and the tracing subscriber.
///
/// Logs go to stderr so console output on stdout stays readable.
pub fn init_tracing() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in netwatch: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netwatch=info,netwatch_lib=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point shared by the binary: set up logging, then run one command.
pub async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    init_tracing();
    commands::execute(cli.command).await
}
