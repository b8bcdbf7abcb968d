/// Text report and command listing for a capture session
use std::fmt::Write;
use std::path::Path;

use log::info;

use crate::capture::CaptureStore;
use crate::models::{CapturedPacket, CommandEntry};
use crate::utils::format_datetime;

const RULER_WIDTH: usize = 80;

/// Render one packet as labelled lines (`Time:`, `Address:`, ...)
pub fn format_packet(packet: &CapturedPacket) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "Time: {}", format_datetime(&packet.timestamp));
    let _ = writeln!(out, "Address: {}", packet.address);
    let _ = writeln!(out, "Name: {}", packet.name);
    let _ = writeln!(out, "RSSI: {} dBm", packet.rssi);
    if let Some(command) = &packet.command {
        let _ = writeln!(out, "Raw data: {}", packet.payload.to_hex());
        let _ = writeln!(out, "HCI command:\n{}", command);
    }
    out
}

/// Render the full session report
///
/// One block per packet in capture order, numbered from 1, separated by
/// dashed rulers so that downstream tools can split on them.
pub fn format_report(store: &CaptureStore) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "BLE advertising capture results");
    let _ = writeln!(out, "{}\n", "=".repeat(RULER_WIDTH));

    for (i, packet) in store.iter().enumerate() {
        let _ = writeln!(out, "Packet #{}", i + 1);
        out.push_str(&format_packet(packet));
        let _ = writeln!(out, "\n{}\n", "-".repeat(RULER_WIDTH));
    }
    out
}

/// Write the session report to `path`
///
/// # Arguments
/// * `store` - Captured packets of the session
/// * `path` - Destination file, overwritten if it exists
///
/// # Returns
/// Result indicating success or the I/O failure
pub async fn save_report(store: &CaptureStore, path: impl AsRef<Path>) -> std::io::Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, format_report(store)).await?;
    info!("Saved {} packets to {}", store.len(), path.display());
    Ok(())
}

/// Numbered `name (address)` lines, each followed by its indented command
pub fn format_command_listing(commands: &[CommandEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in commands.iter().enumerate() {
        let _ = writeln!(out, "{}. {} ({})", i + 1, entry.name, entry.address);
        let _ = writeln!(out, "   {}\n", entry.command);
    }
    out
}
