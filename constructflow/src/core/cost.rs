//! Bounded resource estimates and their composition algebra.
//!
//! `add` models sequential composition, `alt_min`/`alt_max` model a choice
//! between alternatives. Every [`Bounds`] keeps `min <= max`.

use serde::{Deserialize, Serialize};

/// A closed `[min, max]` interval of a non-negative resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawBounds")]
pub struct Bounds {
    min: u64,
    max: u64,
}

#[derive(Deserialize)]
struct RawBounds {
    min: u64,
    max: u64,
}

impl From<RawBounds> for Bounds {
    fn from(raw: RawBounds) -> Self {
        Self::new(raw.min, raw.max)
    }
}

impl Bounds {
    /// Creates bounds from two endpoints, in either order.
    #[must_use]
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// The `[0, 0]` interval.
    #[must_use]
    pub const fn zero() -> Self {
        Self { min: 0, max: 0 }
    }

    /// The degenerate interval `[value, value]`.
    #[must_use]
    pub const fn exact(value: u64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> u64 {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> u64 {
        self.max
    }

    /// Interval sum.
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self {
            min: self.min.saturating_add(other.min),
            max: self.max.saturating_add(other.max),
        }
    }

    /// Per-endpoint minimum.
    #[must_use]
    pub fn lower(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.min(other.max),
        }
    }

    /// Per-endpoint maximum.
    #[must_use]
    pub fn upper(self, other: Self) -> Self {
        Self {
            min: self.min.max(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Scales both endpoints by `factor`.
    #[must_use]
    pub const fn scale(self, factor: u64) -> Self {
        Self {
            min: self.min.saturating_mul(factor),
            max: self.max.saturating_mul(factor),
        }
    }

    /// Caps both endpoints at `limit`.
    #[must_use]
    pub fn cap(self, limit: u64) -> Self {
        Self {
            min: self.min.min(limit),
            max: self.max.min(limit),
        }
    }

    /// Returns true if `value` lies within the interval.
    #[must_use]
    pub const fn contains(&self, value: u64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Resource estimate of a construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostSemiring {
    /// Model provider calls.
    pub llm_calls: Bounds,
    /// Tokens consumed.
    pub tokens: Bounds,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: Bounds,
    /// File reads.
    pub file_reads: Bounds,
    /// Whether any network request may be made.
    pub network_requests: bool,
}

impl CostSemiring {
    /// The zero cost: identity of [`CostSemiring::add`].
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            llm_calls: Bounds::zero(),
            tokens: Bounds::zero(),
            latency_ms: Bounds::zero(),
            file_reads: Bounds::zero(),
            network_requests: false,
        }
    }

    /// Sets the model call bounds.
    #[must_use]
    pub fn with_llm_calls(mut self, min: u64, max: u64) -> Self {
        self.llm_calls = Bounds::new(min, max);
        self
    }

    /// Sets the token bounds.
    #[must_use]
    pub fn with_tokens(mut self, min: u64, max: u64) -> Self {
        self.tokens = Bounds::new(min, max);
        self
    }

    /// Sets the latency bounds.
    #[must_use]
    pub fn with_latency_ms(mut self, min: u64, max: u64) -> Self {
        self.latency_ms = Bounds::new(min, max);
        self
    }

    /// Sets the file read bounds.
    #[must_use]
    pub fn with_file_reads(mut self, min: u64, max: u64) -> Self {
        self.file_reads = Bounds::new(min, max);
        self
    }

    /// Sets whether network requests may be made.
    #[must_use]
    pub const fn with_network_requests(mut self, network_requests: bool) -> Self {
        self.network_requests = network_requests;
        self
    }

    /// Sequential composition: sums bounds, ORs the network flag.
    #[must_use]
    pub const fn add(&self, other: &Self) -> Self {
        Self {
            llm_calls: self.llm_calls.add(other.llm_calls),
            tokens: self.tokens.add(other.tokens),
            latency_ms: self.latency_ms.add(other.latency_ms),
            file_reads: self.file_reads.add(other.file_reads),
            network_requests: self.network_requests || other.network_requests,
        }
    }

    /// Concurrent composition: counted resources add up, latency is that of
    /// the slower side.
    #[must_use]
    pub fn concurrent(&self, other: &Self) -> Self {
        Self {
            latency_ms: self.latency_ms.upper(other.latency_ms),
            ..self.add(other)
        }
    }

    /// Best of two alternatives, per field. The network flag is ORed.
    #[must_use]
    pub fn alt_min(&self, other: &Self) -> Self {
        Self {
            llm_calls: self.llm_calls.lower(other.llm_calls),
            tokens: self.tokens.lower(other.tokens),
            latency_ms: self.latency_ms.lower(other.latency_ms),
            file_reads: self.file_reads.lower(other.file_reads),
            network_requests: self.network_requests || other.network_requests,
        }
    }

    /// Worst of two alternatives, per field. The network flag is ORed.
    #[must_use]
    pub fn alt_max(&self, other: &Self) -> Self {
        Self {
            llm_calls: self.llm_calls.upper(other.llm_calls),
            tokens: self.tokens.upper(other.tokens),
            latency_ms: self.latency_ms.upper(other.latency_ms),
            file_reads: self.file_reads.upper(other.file_reads),
            network_requests: self.network_requests || other.network_requests,
        }
    }

    /// Cost of running the same construction `times` times in sequence.
    #[must_use]
    pub const fn scale(&self, times: u64) -> Self {
        Self {
            llm_calls: self.llm_calls.scale(times),
            tokens: self.tokens.scale(times),
            latency_ms: self.latency_ms.scale(times),
            file_reads: self.file_reads.scale(times),
            network_requests: self.network_requests && times > 0,
        }
    }
}

/// Resources actually consumed by one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Model provider calls made.
    pub llm_calls: u64,
    /// Tokens consumed.
    pub tokens: u64,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: u64,
    /// File reads performed.
    pub file_reads: u64,
    /// Whether a network request was made.
    pub network_requests: bool,
}

impl ResourceUsage {
    /// Accumulates another usage record.
    pub fn record(&mut self, other: &Self) {
        self.llm_calls += other.llm_calls;
        self.tokens += other.tokens;
        self.latency_ms += other.latency_ms;
        self.file_reads += other.file_reads;
        self.network_requests |= other.network_requests;
    }

    /// Returns true if this usage lies between the lower bounds of `best`
    /// and the upper bounds of `worst` in every dimension.
    #[must_use]
    pub const fn within(&self, best: &CostSemiring, worst: &CostSemiring) -> bool {
        self.llm_calls >= best.llm_calls.min()
            && self.llm_calls <= worst.llm_calls.max()
            && self.tokens >= best.tokens.min()
            && self.tokens <= worst.tokens.max()
            && self.latency_ms >= best.latency_ms.min()
            && self.latency_ms <= worst.latency_ms.max()
            && self.file_reads >= best.file_reads.min()
            && self.file_reads <= worst.file_reads.max()
            && (!self.network_requests || worst.network_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_normalize_order() {
        let b = Bounds::new(9, 2);
        assert_eq!(b.min(), 2);
        assert_eq!(b.max(), 9);
    }

    #[test]
    fn test_bounds_deserialize_normalizes() {
        let b: Bounds = serde_json::from_str(r#"{"min": 5, "max": 1}"#).unwrap();
        assert_eq!((b.min(), b.max()), (1, 5));
    }

    #[test]
    fn test_add_is_sequential() {
        let a = CostSemiring::zero().with_llm_calls(1, 2).with_tokens(100, 400);
        let b = CostSemiring::zero()
            .with_llm_calls(0, 1)
            .with_network_requests(true);

        let sum = a.add(&b);
        assert_eq!(sum.llm_calls, Bounds::new(1, 3));
        assert_eq!(sum.tokens, Bounds::new(100, 400));
        assert!(sum.network_requests);
    }

    #[test]
    fn test_zero_is_identity() {
        let a = CostSemiring::zero().with_file_reads(2, 5);
        assert_eq!(a.add(&CostSemiring::zero()), a);
    }

    #[test]
    fn test_concurrent_overlaps_latency() {
        let a = CostSemiring::zero()
            .with_llm_calls(1, 1)
            .with_latency_ms(100, 100);
        let b = CostSemiring::zero()
            .with_llm_calls(1, 2)
            .with_latency_ms(40, 150);

        let both = a.concurrent(&b);
        assert_eq!(both.llm_calls, Bounds::new(2, 3));
        assert_eq!(both.latency_ms, Bounds::new(100, 150));
    }

    #[test]
    fn test_alternatives_keep_min_le_max() {
        let a = CostSemiring::zero().with_tokens(10, 100);
        let b = CostSemiring::zero().with_tokens(50, 60);

        let best = a.alt_min(&b);
        let worst = a.alt_max(&b);
        assert_eq!(best.tokens, Bounds::new(10, 60));
        assert_eq!(worst.tokens, Bounds::new(50, 100));
        assert!(best.tokens.min() <= best.tokens.max());
        assert!(worst.tokens.min() <= worst.tokens.max());
    }

    #[test]
    fn test_scale() {
        let a = CostSemiring::zero()
            .with_llm_calls(1, 2)
            .with_network_requests(true);
        assert_eq!(a.scale(3).llm_calls, Bounds::new(3, 6));
        assert!(!a.scale(0).network_requests);
    }

    #[test]
    fn test_usage_within() {
        let best = CostSemiring::zero().with_llm_calls(1, 1);
        let worst = CostSemiring::zero().with_llm_calls(1, 3);
        let usage = ResourceUsage {
            llm_calls: 2,
            ..ResourceUsage::default()
        };
        assert!(usage.within(&best, &worst));

        let too_many = ResourceUsage {
            llm_calls: 4,
            ..ResourceUsage::default()
        };
        assert!(!too_many.within(&best, &worst));

        let networked = ResourceUsage {
            llm_calls: 1,
            network_requests: true,
            ..ResourceUsage::default()
        };
        assert!(!networked.within(&best, &worst));
    }
}
