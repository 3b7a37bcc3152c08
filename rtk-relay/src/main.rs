#![deny(missing_docs)]
//! # RTK relay
//! Streams NTRIP corrections from a caster into a serial GNSS receiver.
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use rtk_gps::{CancelToken, CorrectionRelay, LastError, NtripConnection, SerialTransport};

pub use config::{RelayArgs, RelayCfg};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: RelayArgs = argh::from_env();

    let mut cfg = match &args.config {
        Some(path) => match RelayCfg::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::error!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => RelayCfg::load_default().unwrap_or_else(|e| {
            log::debug!("No stored configuration: {e}");
            RelayCfg::default()
        }),
    };
    cfg.apply(&args);
    if let Err(e) = cfg.validate("rtk-relay") {
        log::error!("{e}");
        return ExitCode::FAILURE;
    }
    if args.save {
        match cfg.store_default() {
            Ok(path) => log::info!("Configuration stored in {}", path.display()),
            Err(e) => log::warn!("Failed to store configuration: {e}"),
        }
    }

    let connection = Arc::new(NtripConnection::new(cfg.ntrip.clone()));
    let cancel = CancelToken::new();
    let last_error = Arc::new(LastError::new());
    {
        let cancel = cancel.clone();
        let connection = connection.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("Stopping correction relay");
            cancel.cancel();
            connection.close();
        }) {
            log::warn!("Failed to install Ctrl-C handler: {e}");
        }
    }

    log::info!(
        "Relaying {} from {} to {} at {} baud",
        cfg.ntrip.mountpoint,
        cfg.ntrip.url,
        cfg.serial.serial_path,
        cfg.serial.baud_rate()
    );
    let transport = SerialTransport::new(&cfg.serial.serial_path, cfg.serial.baud_rate());
    CorrectionRelay::new(connection, transport, cancel, last_error.clone()).run();

    match last_error.get() {
        Some(e) if !e.is_cancelled() => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
        _ => {
            log::info!("Correction relay stopped");
            ExitCode::SUCCESS
        }
    }
}
