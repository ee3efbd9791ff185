#![doc(test(attr(deny(warnings))))]

//! Recurring Core schedules recurring income and expense rules and merges their
//! projected occurrences with real ledger entries to produce period analytics.

pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Recurring Core tracing initialized.");
    });
}
