use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use phone_ledger::Engine;
use phone_ledger::csv::{
    read_commands, write_batches, write_bookings, write_dealers, write_users, write_wallet,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Report {
    Bookings,
    Inventory,
    Batches,
    Dealers,
    Wallet,
    Users,
}

/// Replay a booking command log and print a report as csv.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Command log in csv format
    commands: PathBuf,

    /// Which report to print
    #[arg(long, value_enum, default_value_t = Report::Bookings)]
    report: Report,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.commands.extension().is_none_or(|ext| ext != "csv") {
        warn!(path = %args.commands.display(), "input file seems to not be a csv file");
    }

    let commands = match read_commands(&args.commands) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::new();
    let (cmd_sender, cmd_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if cmd_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(cmd_receiver)).await;

    if let Err(e) = print_report(&engine, args.report) {
        error!("failed to write report: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn print_report(engine: &Engine, report: Report) -> Result<(), ::csv::Error> {
    let stdout = io::stdout();
    let out = stdout.lock();
    match report {
        Report::Bookings => write_bookings(out, engine.bookings()),
        Report::Inventory => write_bookings(out, engine.inventory()),
        Report::Batches => write_batches(out, engine.batches()),
        Report::Dealers => write_dealers(out, engine.dealers().zip(engine.dealer_summaries())),
        Report::Wallet => write_wallet(out, engine.wallet().entries()),
        Report::Users => write_users(out, engine.users().zip(engine.user_summaries())),
    }
}
