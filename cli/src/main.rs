// Copyright (c) 2026 TapTicket Contributors. MIT License.
// See LICENSE for details.

//! # TapTicket CLI
//!
//! Entry point for the `tapticket` binary. Parses CLI arguments,
//! initializes logging, opens the device in the data directory and
//! dispatches the subcommand:
//!
//! - `generate`, `list`, `show`: create and inspect tickets
//! - `export`, `import`: move a ticket between devices
//! - `activate`, `deactivate`, `add-to-wallet`, `delete`: ticket state
//! - `tap`: verify the active ticket over a local loopback link
//! - `version`: print build version information

mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use cli::{Commands, TapTicketCli};
use commands::Device;
use logging::LogFormat;

fn main() -> Result<ExitCode> {
    let cli = TapTicketCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(ExitCode::SUCCESS);
    }

    // Everything past this point works on the device's data directory.
    logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));

    let device = Device::open(&cli.data_dir)?;
    let mut out = std::io::stdout().lock();

    match &cli.command {
        Commands::Generate => commands::generate(&device, &mut out)?,
        Commands::List => commands::list(&device, &mut out)?,
        Commands::Show(args) => commands::show(&device, &args.ticket_id, &mut out)?,
        Commands::Export(args) => commands::export(&device, &args.ticket_id, &mut out)?,
        Commands::Import(args) => commands::import(&device, args, &mut out)?,
        Commands::Activate(args) => commands::set_active(&device, &args.ticket_id, true, &mut out)?,
        Commands::Deactivate(args) => {
            commands::set_active(&device, &args.ticket_id, false, &mut out)?
        }
        Commands::AddToWallet(args) => commands::add_to_wallet(&device, &args.ticket_id, &mut out)?,
        Commands::Delete(args) => commands::delete(&device, &args.ticket_id, &mut out)?,
        Commands::Tap(args) => {
            // Invalid signature: the read completed, exit non-zero anyway.
            if !commands::tap(&device, args, &mut out)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Version => print_version(),
    }

    Ok(ExitCode::SUCCESS)
}

/// Prints version information for the binary and the protocol library.
fn print_version() {
    println!("tapticket {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", tapticket_protocol::config::PROTOCOL_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
