//! Programmable adapter for tests and the `--offline` demo mode

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::domain::{FetchError, Platform, Product, SourceAdapter};

#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Products(Vec<Product>),
    Fail(FetchError),
    /// Deterministic made-up listings derived from the keyword
    Sample,
}

/// Replays queued steps in order, then repeats the fallback step forever
pub struct ScriptedAdapter {
    platform: Platform,
    delay: Duration,
    queue: Mutex<VecDeque<ScriptedStep>>,
    fallback: ScriptedStep,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedAdapter {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            delay: Duration::ZERO,
            queue: Mutex::new(VecDeque::new()),
            fallback: ScriptedStep::Products(Vec::new()),
            calls: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(platform: Platform, products: Vec<Product>) -> Self {
        Self::new(platform).with_fallback(ScriptedStep::Products(products))
    }

    pub fn failing(platform: Platform, error: FetchError) -> Self {
        Self::new(platform).with_fallback(ScriptedStep::Fail(error))
    }

    pub fn sample(platform: Platform) -> Self {
        Self::new(platform).with_fallback(ScriptedStep::Sample)
    }

    #[must_use]
    pub fn with_fallback(mut self, step: ScriptedStep) -> Self {
        self.fallback = step;
        self
    }

    /// Queue a one-shot step ahead of the fallback
    #[must_use]
    pub fn then(self, step: ScriptedStep) -> Self {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(step);
        self
    }

    /// Time spent "on the network" before every response
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wall-clock start of every `fetch`, in call order
    pub fn call_instants(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn next_step(&self) -> ScriptedStep {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

const VARIANTS: &[&str] = &["Original", "Premium", "Murah", "Fast Charging", "1m", "2m", "Braided"];

/// Stable listings for `keyword` so repeated offline runs match
pub fn sample_products(platform: Platform, keyword: &str, count: usize) -> Vec<Product> {
    let mut hasher = DefaultHasher::new();
    keyword.hash(&mut hasher);
    platform.hash(&mut hasher);
    let mut rng = fastrand::Rng::with_seed(hasher.finish());
    (0..count)
        .map(|i| {
            let variant = VARIANTS[rng.usize(..VARIANTS.len())];
            let cents = rng.i64(500..50_000);
            let product = Product::new(
                format!("{keyword} {variant} #{}", i + 1),
                Decimal::new(cents, 2),
                format!("https://{}.example/listing/{}", platform.as_str(), i + 1),
                platform,
            );
            match platform {
                Platform::Mudah => product.with_merchant(Some(format!("Seller {}", rng.u8(1..50)))),
                _ => product
                    .with_rating(Some(f64::from(rng.u8(30..=50)) / 10.0))
                    .with_sold(rng.bool().then(|| rng.u64(0..5_000)))
                    .with_merchant(Some(format!("{} Store {}", platform.display_name(), rng.u8(1..20)))),
            }
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, keyword: &str, limit: usize, cancel: &CancellationToken) -> Result<Vec<Product>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Instant::now());
        if !self.delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => return Err(FetchError::network("request cancelled")),
                () = tokio::time::sleep(self.delay) => {}
            }
        }

        match self.next_step() {
            ScriptedStep::Products(mut products) => {
                products.truncate(limit);
                Ok(products)
            }
            ScriptedStep::Fail(error) => Err(error),
            ScriptedStep::Sample => Ok(sample_products(self.platform, keyword, limit.min(20))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FetchErrorKind;

    #[tokio::test]
    async fn queued_steps_run_before_fallback() {
        let adapter = ScriptedAdapter::returning(Platform::Shopee, sample_products(Platform::Shopee, "x", 3))
            .then(ScriptedStep::Fail(FetchError::timeout("slow")));
        let cancel = CancellationToken::new();

        let first = adapter.fetch("x", 10, &cancel).await.unwrap_err();
        assert_eq!(first.kind, FetchErrorKind::Timeout);
        assert_eq!(adapter.fetch("x", 2, &cancel).await.unwrap().len(), 2);
        assert_eq!(adapter.calls(), 2);

        let instants = adapter.call_instants();
        assert_eq!(instants.len(), 2);
        assert!(instants[0] <= instants[1]);
    }

    #[test]
    fn samples_are_deterministic_per_keyword() {
        let a = sample_products(Platform::Lazada, "cable", 5);
        let b = sample_products(Platform::Lazada, "cable", 5);
        assert_eq!(a, b);
        assert!(a.iter().all(|p| p.platform == Platform::Lazada));
        assert!(sample_products(Platform::Mudah, "cable", 5).iter().all(|p| p.rating.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_observes_cancellation() {
        let adapter = ScriptedAdapter::sample(Platform::Tokopedia).with_delay(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = adapter.fetch("cable", 5, &cancel).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NetworkError);
    }
}
