//! Per-provider request-rate limiting, independent of the daily quota in
//! `alexandria-quota` — this caps burst rate (requests/second) rather than
//! total daily volume, so a provider with no published daily cap (Archive.org,
//! Wikidata) still gets throttled to something polite.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};

pub struct ProviderRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl ProviderRateLimiter {
    /// `requests_per_second` must be non-zero; callers pass a per-provider
    /// constant (e.g. OpenLibrary's documented 100 req/5min -> ~0.33 rps).
    pub fn new(requests_per_second: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        }
    }

    /// Block until a slot is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
