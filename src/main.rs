use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = <netwatch_lib::cli::Cli as clap::Parser>::parse();
    netwatch_lib::run(cli).await
}
