//! Outbound-call resilience: failure classification, backoff retry with
//! rate-limit escalation, and a guarded fetch that refuses private hosts.

pub mod classify;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod retry;
