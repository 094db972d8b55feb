//! Marketplace Scout - concurrent product search across online marketplaces
//!
//! A search fans out to one source adapter per requested platform, merges
//! whatever each marketplace returns, and derives price, rating and
//! best-seller analysis over the combined listings. Progress is observable
//! through snapshots (`poll`) and an event stream (`subscribe`).

// Module declarations
pub mod analysis;
pub mod crawling;
pub mod domain;
pub mod infrastructure;

pub use analysis::AnalysisEngine;
pub use crawling::{OrchestratorBuilder, ScrapeOrchestrator};
pub use domain::{
    FetchError, FetchErrorKind, Platform, Product, ProgressEvent, SearchFilters, SearchId, SearchRequest, SearchResult,
    SearchStatus, SortBy, SourceAdapter, ValidationError,
};
pub use infrastructure::{AppConfig, init_logging};
