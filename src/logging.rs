//! Opt-in logger initialization for embedding binaries (§10).
//!
//! The engine crate itself only ever calls the `log` facade macros; it
//! never forces a subscriber on its caller. This mirrors the reference
//! engine's binary, which wires `simple_logger::SimpleLogger` in its own
//! `main()` rather than inside the engine library.

use anyhow::{Context, Result};
use log::LevelFilter;
use once_cell::sync::OnceCell;
use simple_logger::SimpleLogger;

/// Guards against a second `init_logger` call panicking inside
/// `log::set_logger` (a harness that drives several engine instances in
/// one process, e.g. a test binary, may call this more than once).
static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initializes a basic stderr logger at `level`. Intended for examples,
/// tests, and embedding binaries that don't already have a subscriber.
/// A second call is a no-op rather than an error.
pub fn init_logger(level: LevelFilter) -> Result<()> {
    let mut result = Ok(());
    LOGGER_INIT.get_or_init(|| {
        result = SimpleLogger::new()
            .with_level(level)
            .init()
            .context("failed to initialize logger");
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_harmless_no_op() {
        assert!(init_logger(LevelFilter::Warn).is_ok());
        assert!(init_logger(LevelFilter::Debug).is_ok());
    }
}
