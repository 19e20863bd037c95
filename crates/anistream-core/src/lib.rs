//! Anime episode stream resolution
//!
//! Turns a title and an episode number into a ranked list of playable
//! stream URLs by walking a prioritised registry of third-party providers.
//!
//! # Overview
//!
//! - [`providers`] search titles, list episodes and return entry points,
//!   either through a JSON API with an HTML fallback or from HTML alone
//! - [`PlayerResolver`] unwraps embed pages through a registry of
//!   host-specific strategies
//! - [`quality::rank`] orders sources best-first
//! - [`FallbackOrchestrator`] tries providers strictly one after another
//! - [`ResolutionService`] validates input and fronts a short-lived cache
//!
//! # Example
//!
//! ```no_run
//! use anistream_core::{ResolutionService, ResolverConfig, ResolveRequest, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = ResolutionService::from_config(&ResolverConfig::default())?;
//!
//!     let result = service.resolve(&ResolveRequest::new("Frieren", 1.0)).await?;
//!     for source in &result.sources {
//!         println!("{} {} (hls: {})", source.quality_label, source.url, source.is_hls);
//!     }
//!     println!("served by {}", result.provider_used);
//!
//!     Ok(())
//! }
//! ```
//!
//! Stream URLs usually carry expiring tokens. The built-in cache keeps
//! results for minutes, not longer.

pub mod cache;
pub mod catalog;
mod client;
pub mod config;
mod error;
pub mod extract;
pub mod matching;
pub mod orchestrator;
pub mod parser;
pub mod providers;
pub mod quality;
pub mod resolver;
pub mod service;
mod types;
pub mod url;

pub use client::{Accept, ClientConfig, HttpClient, RateLimiter};

pub use error::{
    ExtractError, ProviderAttempt, ProviderFailure, ResolveError, Result, TransportError,
};

pub use cache::{CacheKey, ResolutionCache};
pub use catalog::{CatalogClient, CatalogError};
pub use config::{ConfigError, ProviderConfig, ResolverConfig};
pub use orchestrator::FallbackOrchestrator;
pub use providers::{ApiBackedProvider, HtmlScrapedProvider, Lookup, ProviderClient};
pub use resolver::{EmbedPage, EmbedStrategy, PlayerResolver};
pub use service::ResolutionService;

pub use types::{
    DIRECT_LABEL, EntryKind, EntryPoint, EpisodeDescriptor, ProviderDescriptor, ProviderKind,
    ResolutionResult, ResolveRequest, SearchResult, StreamSource, UNRESOLVED_IFRAME_LABEL,
};
