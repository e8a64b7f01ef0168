use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;

use mail_stager::mail::SmtpDispatcher;
use mail_stager::staging::{StagingRepository, StagingService};
use mail_stager::storage::{ScyllaGateway, StorageConfig};

#[derive(Parser, Debug)]
#[command(
    name = "dispatch",
    about = "Send and purge every staged email sharing a magic number"
)]
struct Args {
    /// Grouping key of the batch to send.
    #[arg(long)]
    magic_number: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    if args.magic_number == 0 {
        writeln!(io::stderr(), "error: magic number must be non-zero")?;
        std::process::exit(1);
    }

    let config = StorageConfig::from_env()?;
    let gateway = ScyllaGateway::connect(&config).await?;
    let repository = StagingService::new(Arc::new(gateway), Arc::new(SmtpDispatcher::new()));

    let report = repository.send_pending(args.magic_number).await?;

    println!(
        "magic number {}: sent {}, purged {}",
        report.magic_number, report.sent, report.purged
    );
    Ok(())
}
