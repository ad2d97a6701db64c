//! Execution Adapters
//!
//! Only paper execution is provided; fills are simulated at the quoted price.

mod paper_broker;

pub use paper_broker::{transaction_id, PaperBroker};
