//! Subcommand handlers.
//!
//! Each handler takes the opened [`Device`] and writes its human or JSON
//! output to `out`, so tests can drive them against a temp directory.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use tapticket_protocol::crypto::SoftwareSigningCapability;
use tapticket_protocol::session::{FixedPosition, Initiator, LoopbackTag, Responder};
use tapticket_protocol::storage::SledRepository;
use tapticket_protocol::ticket::{Position, Ticket, TicketWallet};

use crate::cli::{ImportArgs, TapArgs};

const DEVICE_KEY_FILE: &str = "device.key";
const DATABASE_DIR: &str = "db";

/// The holder device backed by a data directory.
pub struct Device {
    wallet: TicketWallet<Arc<SledRepository>>,
}

impl Device {
    /// Open (or initialize) the device key and ticket database under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

        let key_path = data_dir.join(DEVICE_KEY_FILE);
        let capability = SoftwareSigningCapability::load_or_create(&key_path)
            .with_context(|| format!("failed to load device key from {}", key_path.display()))?;
        restrict_permissions(&key_path)?;

        let db_path = data_dir.join(DATABASE_DIR);
        let repository = SledRepository::open(&db_path)
            .with_context(|| format!("failed to open ticket database at {}", db_path.display()))?;

        tracing::debug!(data_dir = %data_dir.display(), "device opened");
        Ok(Self {
            wallet: TicketWallet::new(Arc::new(repository), Arc::new(capability)),
        })
    }

    /// Resolve a full ticket ID from an exact ID or a unique prefix.
    fn resolve(&self, selector: &str) -> Result<String> {
        if selector.is_empty() {
            bail!("empty ticket id");
        }
        let matches: Vec<String> = self
            .wallet
            .list()?
            .into_iter()
            .map(|t| t.ticket_id)
            .filter(|id| id.starts_with(selector))
            .collect();

        if matches.iter().any(|id| id == selector) {
            return Ok(selector.to_string());
        }
        match matches.as_slice() {
            [] => bail!("no ticket matches {selector}"),
            [one] => Ok(one.clone()),
            _ => bail!("{} tickets match {selector}, use a longer prefix", matches.len()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Public view of a ticket. Secrets never leave the device through the CLI.
#[derive(Debug, Serialize)]
struct TicketSummary {
    ticket_id: String,
    public_key: String,
    registered_keys: usize,
    created: String,
    added_to_wallet: bool,
    nfc_enabled: bool,
}

impl From<&Ticket> for TicketSummary {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            public_key: ticket.public_key_hex(),
            registered_keys: ticket.public_keys.len(),
            created: format_millis(ticket.timestamp),
            added_to_wallet: ticket.added_to_wallet,
            nfc_enabled: ticket.nfc_enabled,
        }
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn print_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Holder commands
// ---------------------------------------------------------------------------

pub fn generate(device: &Device, out: &mut impl Write) -> Result<()> {
    let ticket = device.wallet.generate()?;
    tracing::info!(ticket = %ticket.ticket_id, "ticket generated");
    writeln!(out, "{}", ticket.ticket_id)?;
    Ok(())
}

pub fn list(device: &Device, out: &mut impl Write) -> Result<()> {
    let tickets = device.wallet.list()?;
    if tickets.is_empty() {
        writeln!(out, "no tickets")?;
        return Ok(());
    }
    for ticket in &tickets {
        let marker = if ticket.nfc_enabled { "*" } else { " " };
        writeln!(
            out,
            "{marker} {}  keys={}  created={}{}",
            ticket.ticket_id,
            ticket.public_keys.len(),
            format_millis(ticket.timestamp),
            if ticket.added_to_wallet { "  [wallet]" } else { "" },
        )?;
    }
    Ok(())
}

pub fn show(device: &Device, selector: &str, out: &mut impl Write) -> Result<()> {
    let id = device.resolve(selector)?;
    let ticket = device
        .wallet
        .get(&id)?
        .ok_or_else(|| anyhow!("ticket {id} disappeared"))?;
    print_json(out, &TicketSummary::from(&ticket))
}

pub fn export(device: &Device, selector: &str, out: &mut impl Write) -> Result<()> {
    let id = device.resolve(selector)?;
    let document = device.wallet.export_json(&id)?;
    writeln!(out, "{document}")?;
    Ok(())
}

pub fn import(device: &Device, args: &ImportArgs, out: &mut impl Write) -> Result<()> {
    let json = match args.file.as_deref() {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read export document from stdin")?;
            buffer
        }
    };
    let ticket = device.wallet.import_json(&json)?;
    tracing::info!(
        ticket = %ticket.ticket_id,
        keys = ticket.public_keys.len(),
        "ticket imported"
    );
    writeln!(out, "{}", ticket.ticket_id)?;
    Ok(())
}

pub fn set_active(
    device: &Device,
    selector: &str,
    enabled: bool,
    out: &mut impl Write,
) -> Result<()> {
    let id = device.resolve(selector)?;
    device.wallet.set_nfc_enabled(&id, enabled)?;
    writeln!(out, "{id} {}", if enabled { "active" } else { "inactive" })?;
    Ok(())
}

pub fn add_to_wallet(device: &Device, selector: &str, out: &mut impl Write) -> Result<()> {
    let id = device.resolve(selector)?;
    device.wallet.mark_added_to_wallet(&id)?;
    writeln!(out, "{id} added to wallet")?;
    Ok(())
}

pub fn delete(device: &Device, selector: &str, out: &mut impl Write) -> Result<()> {
    let id = device.resolve(selector)?;
    device.wallet.delete(&id)?;
    writeln!(out, "{id} deleted")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Run one verifier read against this device's responder over the loopback
/// link and print the verification result as JSON.
pub fn tap(device: &Device, args: &TapArgs, out: &mut impl Write) -> Result<bool> {
    let repository = Arc::clone(device.wallet.repository());
    let params = device.wallet.params().clone();
    let responder = Arc::new(Mutex::new(Responder::with_params(repository, params.clone())));

    let position = Position::new(args.latitude, args.longitude);
    let verifier = Initiator::with_params(params, Arc::new(FixedPosition(position)))
        .with_timeout(Duration::from_millis(args.timeout_ms));

    let result = verifier
        .verify_tag(&LoopbackTag::new(responder))
        .context("tap failed")?;
    print_json(out, &result)?;
    Ok(result.is_valid)
}
