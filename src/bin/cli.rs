//! Command-line entry point for fixture provisioning and deploy scripts.

use tapioca_fixture::cli;
use tapioca_fixture::setup_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (ctx, command) = cli::CliEnv::parse_and_convert()?;
    setup_tracing(ctx.log_level);

    cli::run_command(ctx, command).await?;
    Ok(())
}
