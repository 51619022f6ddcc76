//! Fuzzy segment length matching
//!
//! A reference length `r` matches a query length `q` when `q` falls inside
//! `[r*(1-s) - m, r*(1+s) + m]`, where `m` is the additive measurement error
//! and `s` the relative scaling range.

use serde::{Deserialize, Serialize};

/// Decides whether reference length `r` matches query length `q`.
pub fn is_match(r: f64, q: f64, meas: f64, scale: f64) -> bool {
    r * (1.0 + scale) + meas >= q && r * (1.0 - scale) - meas <= q
}

/// Symmetric variant: the larger of the two lengths plays the reference.
pub fn is_fuzzy_match(a: f64, b: f64, meas: f64, scale: f64) -> bool {
    if a >= b {
        is_match(a, b, meas, scale)
    } else {
        is_match(b, a, meas, scale)
    }
}

/// Smallest reference length matching `q`.
pub fn min_matching_ref_size(q: f64, meas: f64, scale: f64) -> f64 {
    ((q - meas) / (1.0 + scale)).max(0.0)
}

/// Largest reference length matching `q`; unbounded once `scale >= 1`.
pub fn max_matching_ref_size(q: f64, meas: f64, scale: f64) -> f64 {
    if scale >= 1.0 {
        return f64::INFINITY;
    }
    ((q + meas) / (1.0 - scale)).max(0.0)
}

/// Measurement error and scaling range bundled together
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub meas: f64,
    pub scale: f64,
}

impl Tolerance {
    pub fn new(meas: f64, scale: f64) -> Self {
        Self { meas, scale }
    }

    pub fn exact() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Tighter tolerance for comparisons without pending residue.
    pub fn halved(&self) -> Self {
        Self::new(self.meas / 2.0, self.scale)
    }

    pub fn matches(&self, r: i64, q: i64) -> bool {
        is_match(r as f64, q as f64, self.meas, self.scale)
    }

    /// Integer window of reference lengths that can match `q`.
    ///
    /// The window may be slightly wider than the exact bounds; callers still
    /// confirm candidates with [`Tolerance::matches`].
    pub fn ref_window(&self, q: i64) -> (i64, i64) {
        let lo = min_matching_ref_size(q as f64, self.meas, self.scale).floor();
        let hi = max_matching_ref_size(q as f64, self.meas, self.scale).ceil();
        let hi = if hi.is_finite() && hi < i64::MAX as f64 {
            hi as i64
        } else {
            i64::MAX
        };
        (lo as i64, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_basic_match() {
        assert!(is_match(1000.0, 1040.0, 0.0, 0.05));
        assert!(!is_match(1000.0, 1060.0, 0.0, 0.05));
        assert!(is_match(1000.0, 1060.0, 20.0, 0.05));
        assert!(!is_match(1000.0, 900.0, 20.0, 0.05));
    }

    #[test]
    fn test_exact_requires_equality() {
        assert!(is_match(1500.0, 1500.0, 0.0, 0.0));
        assert!(!is_match(1500.0, 1501.0, 0.0, 0.0));
        assert!(!is_match(1500.0, 1499.0, 0.0, 0.0));
    }

    #[test]
    fn test_fuzzy_agrees_when_ref_is_larger() {
        let cases = [(1000.0, 980.0), (5000.0, 4700.0), (300.0, 10.0), (700.0, 700.0)];
        for &(r, q) in &cases {
            for &(m, s) in &[(0.0, 0.0), (50.0, 0.02), (500.0, 0.1)] {
                assert_eq!(is_match(r, q, m, s), is_fuzzy_match(r, q, m, s));
                assert_eq!(is_fuzzy_match(r, q, m, s), is_fuzzy_match(q, r, m, s));
            }
        }
    }

    #[test]
    fn test_inverse_bounds() {
        for &q in &[0.0, 150.0, 1000.0, 24_321.0] {
            for &(m, s) in &[(0.0, 0.0), (100.0, 0.05), (500.0, 0.2)] {
                let lo = min_matching_ref_size(q, m, s);
                let hi = max_matching_ref_size(q, m, s);
                assert!(lo >= 0.0);
                assert!(lo <= hi);

                // Boundary values match within floating tolerance
                assert!(is_match(lo, q, m + EPS, s));
                assert!(is_match(hi, q, m + EPS, s));

                // Just outside does not
                if lo > 1.0 {
                    assert!(!is_match(lo - 1.0, q, m, s));
                }
                assert!(!is_match(hi + 1.0, q, m, s));
            }
        }
    }

    #[test]
    fn test_unbounded_max() {
        assert!(max_matching_ref_size(100.0, 0.0, 1.0).is_infinite());
        assert_eq!(min_matching_ref_size(10.0, 50.0, 0.1), 0.0);
    }

    #[test]
    fn test_tolerance_window() {
        let tol = Tolerance::new(100.0, 0.05);
        let (lo, hi) = tol.ref_window(2000);
        assert!(lo <= 1810 && hi >= 2211);
        assert!(tol.matches(1810, 2000));
        assert!(!tol.matches(lo - 1, 2000));
        assert!(!tol.matches(hi + 1, 2000));
        assert_eq!(tol.halved().meas, 50.0);
        assert_eq!(tol.halved().scale, 0.05);
    }
}
