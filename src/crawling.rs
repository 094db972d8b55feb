//! # Crawling
//!
//! Concurrent search execution: the orchestrator, per-search state, progress
//! fan-out, and the shared rate limiting and retry machinery.

pub mod orchestrator;
pub mod progress;
pub mod rate_limiter;
pub mod retry;
pub mod state;

pub use orchestrator::{OrchestratorBuilder, ScrapeOrchestrator};
pub use progress::{ProgressHub, ProgressStream};
pub use rate_limiter::PlatformRateLimiters;
pub use retry::{RetryOutcome, RetryPolicy, run_with_retry};
pub use state::{PlatformOutcome, SearchHandle};
