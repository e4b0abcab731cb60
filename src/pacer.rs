//! # Token-Bucket Pacer
//!
//! Admits a send only when enough tokens have accrued at the currently
//! configured rate, capping burst at 10·MTU. The bucket never goes
//! negative and a rejected admission never consumes tokens.
//!
//! The very first call to [`Pacer::allow`] is a no-refill primer: it sets
//! `last_tick` without accruing any tokens, so it only admits a
//! zero-byte send. Real traffic always needs a second call once time has
//! actually elapsed.

use quanta::Instant;

/// Token-bucket rate limiter.
pub struct Pacer {
    mtu: usize,
    rate_bps: f64,
    tokens: f64,
    last_tick: Option<Instant>,
}

impl Pacer {
    /// Create a pacer for the given MTU with a zero initial rate.
    pub fn new(mtu: usize) -> Self {
        Pacer {
            mtu: mtu.max(1),
            rate_bps: 0.0,
            tokens: 0.0,
            last_tick: None,
        }
    }

    /// Burst ceiling: 10·MTU bytes.
    pub fn burst_cap(&self) -> f64 {
        10.0 * self.mtu as f64
    }

    /// Current pacing rate in bytes/sec.
    pub fn rate_bps(&self) -> f64 {
        self.rate_bps
    }

    /// Current token balance, in bytes. Always within `[0, burst_cap]`.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Set the pacing rate. Negative values are coerced to zero.
    pub fn set_rate(&mut self, bps: f64) {
        self.rate_bps = bps.max(0.0);
    }

    /// Attempt to admit a send of `size` bytes at time `now`.
    ///
    /// On the first call ever, `last_tick` is primed to `now` with zero
    /// tokens accrued — no refill has happened yet, so only a zero-byte
    /// send is admitted. On every subsequent call, tokens accrue for the
    /// elapsed time at the current rate, clamp to the burst ceiling, and
    /// the send is admitted iff enough tokens are on hand. A rejected
    /// admission leaves the token balance untouched.
    pub fn allow(&mut self, now: Instant, size: usize) -> bool {
        let primed_before = self.last_tick.is_some();
        let last = *self.last_tick.get_or_insert(now);

        if primed_before {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + self.rate_bps * elapsed)
                .min(self.burst_cap())
                .max(0.0);
            self.last_tick = Some(now);
        }

        let size = size as f64;
        if self.tokens >= size {
            self.tokens -= size;
            true
        } else {
            false
        }
    }
}
