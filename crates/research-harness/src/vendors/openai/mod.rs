//! OpenAI Responses API backend for deep research runs.
//!
//! Vendor-specific wire handling lives here so the reducer and driver stay
//! provider-agnostic.
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::OpenAiBackend;
pub use config::OpenAiClientConfig;
