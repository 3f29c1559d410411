//! Probe transport adapters.

pub mod http;
pub mod scripted;

pub use http::HttpProbeTransport;
pub use scripted::ScriptedTransport;
