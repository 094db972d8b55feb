//! Infrastructure layer for configuration, logging, HTTP and marketplace integrations
//!
//! Concrete implementations of the domain service traits live here: the
//! source adapters, the in-memory history store and the export renderer.

pub mod adapters;
pub mod config; // Layered configuration (file + environment)
pub mod export;
pub mod history_store;
pub mod http_client;
pub mod logging;

// Re-export commonly used items
pub use adapters::{ScriptedAdapter, ScriptedStep, live_adapters, offline_adapters};
pub use config::{AppConfig, ConfigError, LoggingConfig, OrchestratorConfig, RateLimitConfig, RetryConfig, ScraperConfig};
pub use export::JsonExporter;
pub use history_store::InMemoryHistoryStore;
pub use http_client::HttpClient;
pub use logging::{get_log_directory, init_logging};
