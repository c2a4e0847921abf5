//! delivery-hook: provider webhook reconciliation and auto-acknowledgement.

pub mod autoreply;
pub mod channels;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod webhook;
