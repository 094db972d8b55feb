//! Domain module - core records and service contracts
//!
//! Everything a search produces or consumes is defined here: products,
//! requests and results, progress events, the error taxonomy and the traits
//! implemented by adapters and external collaborators.

pub mod analysis;
pub mod errors;
pub mod events;
pub mod product;
pub mod search;
pub mod services;

pub use analysis::{
    AnalysisReport, MerchantAnalysis, MerchantStats, PlatformBreakdown, PlatformMetrics, PriceAnalysis, RatingAnalysis,
    RatingDistribution,
};
pub use errors::{FetchError, FetchErrorKind, OrchestrationError, ValidationError};
pub use events::ProgressEvent;
pub use product::{Platform, Product};
pub use search::{
    PlatformError, SearchFilters, SearchId, SearchRequest, SearchResult, SearchStatus, SortBy,
};
pub use services::{
    ExportError, ExportFormat, ExportRenderer, HistoryEntry, HistoryError, HistoryStore, SourceAdapter,
};
