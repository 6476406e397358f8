mod archive;
mod formatter;
mod simulate;

use clap::{Parser, Subcommand};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wapt_recorder::config::loader::ConfigLoader;

#[derive(Parser)]
#[command(name = "wapt", version, about = "Inspect, archive and simulate recorded sessions")]
struct Args {
    /// Config file (defaults to ./wapt.yaml, then ~/.wapt/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a posted payload, one line per record
    Inspect { payload: PathBuf },
    /// Store a posted payload under <out>/<task>/<timestamp>/
    Archive {
        payload: PathBuf,
        /// Archive root (overrides archive_dir from the config)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a recording script against an in-memory browser and print the payload
    Simulate { script: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr, stdout carries payloads
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await?,
        None => ConfigLoader::load_default().await?,
    };

    match args.command {
        Command::Inspect { payload } => {
            let payload = archive::read_payload(&payload).await?;
            println!("{}", formatter::format_payload(&payload));
        }
        Command::Archive { payload, out } => {
            let payload = archive::read_payload(&payload).await?;
            let out = out.unwrap_or(config.archive_dir);
            let path = archive::archive_payload(&payload, &out, archive::unix_seconds()).await?;
            println!("{}", path.display());
        }
        Command::Simulate { script } => {
            let content = tokio::fs::read_to_string(&script).await?;
            let mut simulator = simulate::Simulator::new(config);
            let payloads = simulator.run_script(&content).await.map_err(|e| {
                eprintln!("Error executing file {}: {}", script.display(), e);
                io::Error::other(e)
            })?;
            if payloads.is_empty() {
                eprintln!("No session was finalized");
            }
            for payload in payloads {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }
    }

    Ok(())
}
