#![doc(test(attr(deny(warnings))))]

//! Session Ledger tracks billable therapy sessions, the payments received for
//! them, and how long the remaining balance has been outstanding.

pub mod cli;
pub mod config;
pub mod errors;
pub mod export;
pub mod ledger;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Session Ledger tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
    }
}
