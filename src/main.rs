use std::env;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use wallet_ledger::csv::{read_commands, write_wallets};
use wallet_ledger::{Engine, LedgerConfig, LedgerStore};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: wallet-ledger <commands.csv>");
        return ExitCode::FAILURE;
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = match LedgerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // the reader moves to a blocking task, so it must own its path
    let commands = match read_commands(path.clone()) {
        Ok(commands) => commands,
        Err(e) => {
            error!(path, "{e}");
            return ExitCode::FAILURE;
        }
    };

    let engine = Engine::new(Arc::new(LedgerStore::new()), config);
    let (cmd_sender, cmd_receiver) = tokio::sync::mpsc::channel(16);

    // csv reading is blocking io, keep it off the runtime workers
    tokio::task::spawn_blocking(move || {
        for result in commands {
            match result {
                Ok(command) => {
                    if cmd_sender.blocking_send(command).is_err() {
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

    let wallets = match engine.wallets().await {
        Ok(wallets) => wallets,
        Err(e) => {
            error!(cause = ?e, "failed to read wallets");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_wallets(io::stdout().lock(), wallets) {
        error!("failed to write output: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
