//! Fractional-Kelly stake sizing.
//!
//! The Kelly numerator check is a second, stricter gate that is independent
//! of the evaluator's percentage-edge threshold: a bet can clear one and not
//! the other, and both are applied in sequence.

/// Size a stake from the de-vigged fair odds and the bookmaker's quote.
///
/// `p = 1/fair_odds`, `b = target_odds - 1`, `f* = (b*p - q)/b`; the stake is
/// `bankroll * f* * fraction`, floored to whole cents and never negative.
/// Returns 0.0 when Kelly sees no positive expectation.
pub fn kelly_stake(fair_odds: f64, target_odds: f64, bankroll: f64, fraction: f64) -> f64 {
    if fair_odds <= 1.0 || target_odds <= 1.0 || bankroll <= 0.0 || fraction <= 0.0 {
        return 0.0;
    }

    let p = 1.0 / fair_odds;
    let b = target_odds - 1.0;
    let q = 1.0 - p;
    let numerator = b * p - q;
    if numerator <= 0.0 {
        return 0.0;
    }

    let stake = bankroll * (numerator / b) * fraction;
    floor_cents(stake.min(bankroll))
}

/// Floor a monetary amount to 2 decimal places.
pub fn floor_cents(amount: f64) -> f64 {
    (amount * 100.0).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_no_edge_yields_zero() {
        // Fair and quoted agree: b*p - q = 0 exactly.
        assert_relative_eq!(kelly_stake(2.0, 2.0, 100.0, 0.1), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_edge_yields_zero() {
        assert_relative_eq!(kelly_stake(2.0, 1.8, 100.0, 0.1), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_positive_edge_sizing() {
        // p = 0.5, b = 1.2, f* = (0.6 - 0.5)/1.2 = 0.08333..
        // stake = 100 * 0.08333 * 0.1 = 0.8333 -> floored to 0.83
        assert_relative_eq!(kelly_stake(2.0, 2.2, 100.0, 0.1), 0.83, epsilon = 1e-9);
    }

    #[test]
    fn test_doubling_fraction_roughly_doubles_stake() {
        let single = kelly_stake(2.0, 2.2, 1000.0, 0.1);
        let double = kelly_stake(2.0, 2.2, 1000.0, 0.2);
        assert!(single > 0.0);
        // Exact doubling up to the cent flooring.
        assert!((double - 2.0 * single).abs() <= 0.02);
    }

    #[test]
    fn test_stake_never_negative_and_bounded_by_bankroll() {
        let stake = kelly_stake(1.1, 3.5, 50.0, 1.0);
        assert!(stake >= 0.0);
        assert!(stake <= 50.0);
    }

    #[test]
    fn test_floored_to_cents() {
        let stake = kelly_stake(2.0, 2.2, 123.45, 0.1);
        assert_relative_eq!(stake, (stake * 100.0).floor() / 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_inputs_yield_zero() {
        assert_eq!(kelly_stake(1.0, 2.2, 100.0, 0.1), 0.0);
        assert_eq!(kelly_stake(2.0, 1.0, 100.0, 0.1), 0.0);
        assert_eq!(kelly_stake(2.0, 2.2, 0.0, 0.1), 0.0);
        assert_eq!(kelly_stake(2.0, 2.2, 100.0, 0.0), 0.0);
    }
}
