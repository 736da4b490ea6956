//! Debug-file logging. The TUI owns the terminal, so nothing is logged
//! unless `DEBUG` is set or `--debug` is passed.

use color_eyre::eyre::{eyre, Result};
use std::sync::Mutex;
use tracing::Level;

pub const LOG_FILE: &str = "debug.log";

/// Maps `LOG_LEVEL` onto a tracing level. Unset means `debug`; an unknown
/// value means `info`.
pub fn parse_level(value: Option<&str>) -> Level {
    let Some(value) = value else {
        return Level::DEBUG;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

pub fn enabled(debug_flag: bool) -> bool {
    debug_flag || std::env::var_os("DEBUG").is_some()
}

pub fn init(debug_flag: bool) -> Result<()> {
    if !enabled(debug_flag) {
        return Ok(());
    }
    let level = parse_level(std::env::var("LOG_LEVEL").ok().as_deref());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)
        .map_err(|e| eyre!("Failed to open log file {LOG_FILE}: {e}"))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .init();
    tracing::info!(
        %level,
        "ghpr v{} starting with debug logging",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}
