//! Search provider implementations.

mod bing;
mod duckduckgo;
mod static_provider;

pub use bing::{Bing, BING_ENDPOINT};
pub use duckduckgo::{DuckDuckGo, DEFAULT_ENDPOINT, DEFAULT_LANGUAGE};
pub use static_provider::StaticProvider;
