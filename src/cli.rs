use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tapioca_ledger::Ledger;
use tapioca_ledger::artifact::ArtifactStore;
use tapioca_ledger::rpc::RpcLedger;
use tracing::info;

use crate::config::Ctx;
use crate::deploy::deploy_beach_bar;
use crate::modules::ModuleRegistry;
use crate::provision::Provisioner;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Provision the full lending market fixture
    Fixture {
        /// Keep the node's existing state and leave the extra account unfunded
        #[arg(long)]
        staging: bool,
    },
    /// Deploy a BeachBar controller for an existing YieldBox
    DeployBeachBar {
        /// Address of the deployed YieldBox
        #[arg(long = "yield-box")]
        yield_box: Address,
    },
}

#[derive(Debug, Parser)]
#[command(name = "tapioca-fixture")]
#[command(about = "Provisions lending market fixtures on a development node")]
#[command(version)]
pub struct CliEnv {
    /// Path to TOML configuration file
    #[clap(long)]
    config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

impl CliEnv {
    /// Parse CLI arguments and load the referenced config file
    pub fn parse_and_convert() -> anyhow::Result<(Ctx, Commands)> {
        let cli_env = Self::parse();
        let ctx = Ctx::load_file(&cli_env.config)?;
        Ok((ctx, cli_env.command))
    }
}

pub async fn run_command(ctx: Ctx, command: Commands) -> anyhow::Result<()> {
    let artifacts = ArtifactStore::load(&ctx.artifacts_dir)?;
    let ledger = Arc::new(RpcLedger::connect_http(
        ctx.rpc_url.clone(),
        artifacts,
        ctx.required_confirmations,
    ));

    if matches!(command, Commands::Fixture { staging: false }) {
        ledger.auto_impersonate().await?;
    }
    let chain_id = ledger.chain_id().await?;

    run_command_with_writers(&ctx, chain_id, ledger, command, &mut std::io::stdout()).await
}

async fn run_command_with_writers<L: Ledger, W: Write>(
    ctx: &Ctx,
    chain_id: u64,
    ledger: Arc<L>,
    command: Commands,
    stdout: &mut W,
) -> anyhow::Result<()> {
    let summary = match command {
        Commands::Fixture { staging } => {
            let mut provisioner = Provisioner::new(ledger, ModuleRegistry::standard());
            let fixture = provisioner.provision(staging).await?;
            info!(market = %fixture.market, "Fixture ready");

            fixture.artifacts.summary()
        }
        Commands::DeployBeachBar { yield_box } => {
            let constants = ctx.network(chain_id)?;
            info!(chain_id, %yield_box, "Deploying BeachBar");

            deploy_beach_bar(ledger.as_ref(), yield_box, constants).await?
        }
    };

    writeln!(stdout, "{}", summary.to_json_pretty()?)?;
    Ok(())
}
