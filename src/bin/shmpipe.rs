// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Usage:
//   shmpipe <file>   send <file> to the receiver
//   shmpipe          receive and write the stream to stdout
//
// Both roles meet through the marker file named by SHMPIPE_KEY_PATH
// (default /tmp/shmpipe_key). Diagnostics go to stderr; RUST_LOG controls
// their verbosity.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use shmpipe::{acquire_resources, Config, Receiver, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn run_sender(config: &Config, path: &Path) -> Result<()> {
    let stats = shmpipe::send_file(config, path)?;
    tracing::info!(records = stats.records, bytes = stats.bytes, "transfer complete");
    Ok(())
}

fn run_receiver(config: &Config) -> Result<()> {
    let res = acquire_resources(config)?;
    let mut receiver = Receiver::attach(&res)?;
    receiver.rendezvous()?;
    let stats = receiver.stream(&mut io::stdout().lock())?;
    tracing::info!(records = stats.records, bytes = stats.bytes, "transfer complete");
    // The sender stays up until this process is gone, not just this session.
    receiver.hold_until_exit();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shmpipe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // File names are arbitrary bytes on unix; never insist on UTF-8.
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let config = Config::from_env();

    let result = match args.as_slice() {
        [] => run_receiver(&config),
        [path] => run_sender(&config, Path::new(path)),
        _ => {
            eprintln!("Wrong argument count!");
            eprintln!("usage: shmpipe [file]");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("shmpipe: {e}");
            ExitCode::FAILURE
        }
    }
}
