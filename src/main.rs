mod advertising;
mod bluetooth;
mod capture;
mod config;
mod models;
mod report;
mod utils;

use std::io::{BufRead, Write};

use log::{error, info, warn};
use tokio::sync::mpsc;

use advertising::CommandTemplate;
use bluetooth::capture_advertisements;
use capture::{lock_store, replay, CaptureStore, ReplayError, SystemRunner};
use config::CaptureConfig;
use report::{format_command_listing, save_report};

/// Read lines from `reader` on a dedicated thread and forward them
///
/// A blocking stdin read cannot be cancelled, so it is kept off the runtime.
/// The thread is detached and stops at EOF, on a read error, or once the
/// receiver is dropped.
fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Prompt for packet numbers and replay them until the user quits
///
/// Numbers are 1-based. Anything that is not a number, EOF or Ctrl+C ends
/// the loop; replay failures are reported and the prompt continues.
async fn interactive_replay(store: &CaptureStore) {
    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));

    loop {
        print!(
            "Select packet to replay (1-{}, or 'q' to quit): ",
            store.len()
        );
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => break,
        };
        let choice = match line {
            Some(Ok(line)) => line,
            None => break,
            Some(Err(e)) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        let choice = choice.trim();
        if choice.eq_ignore_ascii_case("q") {
            break;
        }
        let number = match choice.parse::<usize>() {
            Ok(number) => number,
            Err(_) => break,
        };

        let result = match number.checked_sub(1) {
            Some(index) => {
                tokio::task::block_in_place(|| replay(store, index, &SystemRunner))
            }
            None => Err(ReplayError::IndexOutOfRange {
                index: 0,
                len: store.len(),
            }),
        };

        match result {
            Ok(()) => info!("Command executed successfully"),
            Err(e) => error!("Replay failed: {}", e),
        }
        println!();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match CaptureConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let shared = CaptureStore::new(CommandTemplate::new(config.adapter.clone())).into_shared();

    // Whatever was captured before a scanner failure is still reported
    if let Err(e) = capture_advertisements(&config, shared.clone()).await {
        error!("Scan failed: {}", e);
    }

    let store = std::mem::take(&mut *lock_store(&shared));

    if let Err(e) = save_report(&store, &config.report_file).await {
        error!("Failed to save report to {}: {}", config.report_file, e);
    }

    if store.is_empty() {
        warn!("No advertising packets captured");
        return Ok(());
    }

    let commands = store.commands();

    println!("\n=== Captured HCI commands ===");
    print!("{}", format_command_listing(&commands));

    if config.interactive_replay {
        interactive_replay(&store).await;
    }

    info!("Exiting");
    Ok(())
}
