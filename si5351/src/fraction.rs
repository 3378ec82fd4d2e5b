//! Best rational approximation with a bounded denominator.
//!
//! A fractional divider of the form `a + b/c` with `c < 2^20` cannot hit an arbitrary ratio
//! exactly. Fixing `c = 2^20 - 1` quantizes the output to steps that are far too coarse for
//! WSPR tone spacing (1.46 Hz at 144 MHz collapses four tones onto one). Truncating the
//! continued fraction expansion of the target ratio instead yields the convergent with the
//! largest admissible denominator, which is accurate to well below a millihertz.

/// Find the best approximation `c/d ≈ a/b` with `d <= max_denominator`.
///
/// # Args
/// * `a` - Numerator of the ratio to approximate.
/// * `b` - Denominator of the ratio to approximate. Must be nonzero.
/// * `max_denominator` - Largest admissible denominator of the result.
///
/// # Returns
/// `(c, d, eps)` where `eps = a/b - c/d`. A denominator of `0` means that not even the integer
/// part of `a/b` is admissible (only possible with `max_denominator == 0`,
/// `a > 0` and `b > 1`); callers must treat
/// that as "no approximation" and keep what they had.
pub fn nearest_fraction(a: u64, b: u64, max_denominator: u64) -> (u64, u64, f64) {
    assert!(b != 0, "zero divisor");
    // Exact regardless of the bound
    if a == 0 {
        return (0, 1, 0.0);
    }
    if b == 1 {
        return (a, 1, 0.0);
    }
    let (c, d) = continued_fraction(a, b, 0, 1, max_denominator);
    let eps = a as f64 / b as f64 - c as f64 / d as f64;
    (c, d, eps)
}

/// Expand `a/b` into a continued fraction and fold it back into a single ratio.
///
/// `a/b = term + 1 / (b / (a mod b))`, so each level emits one term and recurses on the
/// inverted remainder. `(e, f)` carry the denominators of the two previous convergents so each
/// level knows the denominator its own term would produce. The expansion stops at an exact
/// division or at the first term whose convergent denominator exceeds the bound, which is
/// signalled to the parent as `(1, 0)` so that `term * 1 + 0` truncates cleanly there.
///
/// Convergent denominators grow at least as fast as the Fibonacci numbers, so the recursion
/// depth is bounded by about 93 levels for any `u64` input.
fn continued_fraction(a: u64, b: u64, e: u64, f: u64, max_denominator: u64) -> (u64, u64) {
    let term = a / b;
    // Saturation only happens beyond any admissible bound.
    let denom = term.saturating_mul(e).saturating_add(f);
    if denom > max_denominator {
        return (1, 0);
    }
    let rem = a % b;
    if rem == 0 {
        return (term, 1);
    }
    // a/b = term + rem/b = term + 1 / (b/rem) = term + dx/cx
    let (cx, dx) = continued_fraction(b, rem, denom, e, max_denominator);
    (term * cx + dx, cx)
}
