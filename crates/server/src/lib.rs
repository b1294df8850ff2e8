//! Dashboard service: a TTL sample cache over a [`gst_contracts::SampleProvider`],
//! pure filters over the cached snapshot, and the axum router that serves them.

pub mod cache;
pub mod config;
pub mod filter;
pub mod http;
pub mod metrics;
