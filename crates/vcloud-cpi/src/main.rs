use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vcloud_cpi::{CloudOperation, VCloud, rpc};

#[derive(Parser)]
#[command(name = "vcloud-cpi")]
#[command(about = "vCloud Director cloud provider interface", long_about = None)]
struct Cli {
    /// Settings file (otherwise VCLOUD_CPI_CONFIG, ./cpi.yml, ./.cpi.yml, ~/.config/vcloud-cpi/cpi.yml)
    #[arg(short, long, env = "VCLOUD_CPI_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one JSON request read from stdin
    Rpc,
    /// Log in and resolve the configured organization and datacenter
    Check,
    /// List CPI operations and whether they are supported
    Operations,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the response; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match cli.command {
        Commands::Version => {
            println!("vcloud-cpi {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Operations => {
            for op in CloudOperation::ALL {
                let status = if op.is_implemented() {
                    "supported".green()
                } else {
                    "not implemented".yellow()
                };
                println!("{:<22} {}", op.as_str(), status);
            }
        }
        Commands::Check => {
            let cloud = VCloud::from_config(cli.config.as_deref())?;
            let (org, vdc) = cloud.check().await?;
            println!(
                "{} {} ({})",
                "✓".green(),
                cloud.client().base_url(),
                cloud.client().org_name().cyan()
            );
            println!("  org: {}", org.href);
            println!("  vdc: {}", vdc.href);
        }
        Commands::Rpc => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            let response = rpc::respond(&input, cli.config.as_deref()).await;
            println!("{}", serde_json::to_string(&response)?);
        }
    }

    Ok(())
}
