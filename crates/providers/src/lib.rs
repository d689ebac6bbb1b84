//! Outbound clients for Concierge.
//!
//! The language model provider implements `concierge_core::Provider`; the
//! search clients implement `PlaceSearch` and `WebSearch`.

pub mod anthropic;
mod http;
pub mod valueserp;
pub mod youcom;

pub use anthropic::AnthropicProvider;
pub use valueserp::ValueSerpClient;
pub use youcom::YouComClient;
