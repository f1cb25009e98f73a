//! Risk-based position sizing.
//!
//! Converts an account balance, a per-trade risk percentage, and a stop
//! distance into a broker lot size, clamped to the firm's position cap.
//! Sizing never panics: unusable inputs, including magnitudes that
//! would overflow `Decimal`, degrade to the minimum lot.

use prop_core::rules::{FirmRules, InstrumentClass, MIN_LOT_SIZE, MIN_STOP_DISTANCE_PIPS};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Units of base currency in one standard lot.
pub const UNITS_PER_STANDARD_LOT: Decimal = dec!(100_000);

/// Full output of a sizing computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskComputation {
    /// Final lot size, floored to broker precision (0.01).
    pub lot_size: Decimal,
    /// Dollar amount at risk if the stop is hit.
    pub risk_amount: Decimal,
    /// Pip value used, in USD per pip per standard lot.
    pub pip_value: Decimal,
    /// Stop distance used for the computation, in pips.
    pub stop_distance_pips: Decimal,
    /// Total units of base currency.
    pub units: Decimal,
    /// Whole standard lots in `lot_size`.
    pub standard_lots: u32,
    /// Mini lots (0.1) after standard lots are taken out.
    pub mini_lots: u32,
    /// Micro lots (0.01) after standard and mini lots are taken out.
    pub micro_lots: u32,
    /// True when the firm's position cap reduced the lot size.
    pub firm_capped: bool,
    /// True when the inputs were unusable and the minimum lot size was
    /// returned instead of a computed one.
    pub degraded: bool,
}

/// Stop distance in pips between entry and stop price.
///
/// Pip scale depends on the instrument class: crypto stops are measured
/// as a percentage of entry, metals use 0.1 price units per pip, JPY
/// pairs 0.01, and everything else the standard 0.0001. Distances below
/// one pip are floored to one pip so a stop placed on top of the entry
/// can never produce an unbounded size. Deltas too large for the pip
/// scale saturate to `Decimal::MAX`, which the lot computation rejects
/// as unusable.
pub fn stop_distance_pips(
    class: InstrumentClass,
    entry_price: Decimal,
    stop_price: Decimal,
) -> Decimal {
    let delta = entry_price.checked_sub(stop_price).map_or(Decimal::MAX, |d| d.abs());
    let pips = match class {
        InstrumentClass::Crypto => {
            if entry_price <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                delta
                    .checked_div(entry_price)
                    .and_then(|pct| pct.checked_mul(dec!(100)))
                    .unwrap_or(Decimal::MAX)
            }
        }
        InstrumentClass::Metal => delta.checked_mul(dec!(10)).unwrap_or(Decimal::MAX),
        InstrumentClass::JpyPair => delta.checked_mul(dec!(100)).unwrap_or(Decimal::MAX),
        InstrumentClass::Forex => delta.checked_mul(dec!(10_000)).unwrap_or(Decimal::MAX),
    };
    pips.max(MIN_STOP_DISTANCE_PIPS)
}

/// Compute the lot size for a trade risking `risk_pct` of `balance`.
///
/// `lot_size = balance * risk_pct / 100 / (stop_distance_pips * pip_value)`,
/// floored to two decimals and clamped to `[MIN_LOT_SIZE, firm cap]`.
///
/// Unusable inputs never error: non-positive balance, risk percentage
/// outside (0, 100], non-positive pip value, or magnitudes that
/// overflow the lot arithmetic all return the minimum lot size with
/// `degraded` set so the caller can still quote something tradeable.
pub fn compute_lot_size(
    balance: Decimal,
    risk_pct: Decimal,
    stop_distance_pips: Decimal,
    pip_value: Decimal,
    rules: &FirmRules,
) -> RiskComputation {
    let stop_pips = stop_distance_pips.max(MIN_STOP_DISTANCE_PIPS);

    if balance <= Decimal::ZERO
        || risk_pct <= Decimal::ZERO
        || risk_pct > dec!(100)
        || pip_value <= Decimal::ZERO
    {
        warn!(
            %balance,
            %risk_pct,
            %pip_value,
            "Degraded sizing input, falling back to minimum lot size"
        );
        return breakdown(MIN_LOT_SIZE, Decimal::ZERO, pip_value, stop_pips, false, true);
    }

    let (risk_amount, raw_lots) = match raw_lot_size(balance, risk_pct, stop_pips, pip_value) {
        Some(parts) => parts,
        None => {
            warn!(
                %balance,
                %stop_pips,
                %pip_value,
                "Sizing arithmetic overflowed, falling back to minimum lot size"
            );
            return breakdown(MIN_LOT_SIZE, Decimal::ZERO, pip_value, stop_pips, false, true);
        }
    };

    // Broker lot precision is 0.01; always round down so the realized
    // risk never exceeds the requested risk.
    let mut lots = raw_lots
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        .max(MIN_LOT_SIZE);

    let cap = rules.max_position_size(balance);
    let firm_capped = lots > cap;
    if firm_capped {
        lots = cap;
    }

    breakdown(lots, risk_amount, pip_value, stop_pips, firm_capped, false)
}

/// Risk amount and raw (unrounded) lot count, or `None` when the
/// magnitudes overflow `Decimal`.
fn raw_lot_size(
    balance: Decimal,
    risk_pct: Decimal,
    stop_pips: Decimal,
    pip_value: Decimal,
) -> Option<(Decimal, Decimal)> {
    let risk_amount = balance.checked_mul(risk_pct)? / dec!(100);
    let denominator = stop_pips.checked_mul(pip_value)?;
    let raw_lots = risk_amount.checked_div(denominator)?;
    Some((risk_amount, raw_lots))
}

fn breakdown(
    lot_size: Decimal,
    risk_amount: Decimal,
    pip_value: Decimal,
    stop_distance_pips: Decimal,
    firm_capped: bool,
    degraded: bool,
) -> RiskComputation {
    let standard = lot_size.trunc();
    let after_standard = (lot_size - standard) * dec!(10);
    let mini = after_standard.trunc();
    let micro = ((after_standard - mini) * dec!(10)).trunc();

    RiskComputation {
        lot_size,
        risk_amount,
        pip_value,
        stop_distance_pips,
        // Extreme balances can overflow the unit conversion; saturate.
        units: lot_size.checked_mul(UNITS_PER_STANDARD_LOT).unwrap_or(Decimal::MAX),
        standard_lots: standard.to_u32().unwrap_or(0),
        mini_lots: mini.to_u32().unwrap_or(0),
        micro_lots: micro.to_u32().unwrap_or(0),
        firm_capped,
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prop_core::rules::PropFirm;

    fn ftmo() -> FirmRules {
        PropFirm::Ftmo.rules()
    }

    #[test]
    fn test_one_percent_twenty_pips_is_one_lot() {
        let comp = compute_lot_size(dec!(20_000), dec!(1), dec!(20), dec!(10), &ftmo());

        assert_eq!(comp.lot_size, dec!(1.00));
        assert_eq!(comp.risk_amount, dec!(200));
        assert_eq!(comp.pip_value, dec!(10));
        assert_eq!(comp.units, dec!(100_000));
        assert_eq!(comp.standard_lots, 1);
        assert_eq!(comp.mini_lots, 0);
        assert_eq!(comp.micro_lots, 0);
        assert!(!comp.firm_capped);
        assert!(!comp.degraded);
    }

    #[test]
    fn test_lot_size_rounds_down_not_up() {
        // 10_000 * 1.5% = 150; 150 / (17 * 10) = 0.8823... -> 0.88
        let comp = compute_lot_size(dec!(10_000), dec!(1.5), dec!(17), dec!(10), &ftmo());

        assert_eq!(comp.lot_size, dec!(0.88));
        assert_eq!(comp.standard_lots, 0);
        assert_eq!(comp.mini_lots, 8);
        assert_eq!(comp.micro_lots, 8);
    }

    #[test]
    fn test_firm_cap_applies() {
        // 10_000 * 10% = 1000; 1000 / (2 * 10) = 50 lots, FTMO caps at 5 per 10k.
        let comp = compute_lot_size(dec!(10_000), dec!(10), dec!(2), dec!(10), &ftmo());

        assert_eq!(comp.lot_size, dec!(5.00));
        assert!(comp.firm_capped);
        assert!(!comp.degraded);
    }

    #[test]
    fn test_tiny_computed_size_floors_to_minimum() {
        // 500 * 0.1% = 0.5; 0.5 / (50 * 10) = 0.001 -> floors to 0.01.
        let comp = compute_lot_size(dec!(500), dec!(0.1), dec!(50), dec!(10), &ftmo());

        assert_eq!(comp.lot_size, MIN_LOT_SIZE);
        assert!(!comp.degraded);
    }

    #[test]
    fn test_degraded_inputs_return_minimum_lot() {
        for (balance, risk_pct, pip_value) in [
            (dec!(0), dec!(1), dec!(10)),
            (dec!(-100), dec!(1), dec!(10)),
            (dec!(10_000), dec!(0), dec!(10)),
            (dec!(10_000), dec!(101), dec!(10)),
            (dec!(10_000), dec!(1), dec!(0)),
            // Overflows the risk multiplication instead of failing validation.
            (Decimal::MAX, dec!(100), dec!(10)),
        ] {
            let comp = compute_lot_size(balance, risk_pct, dec!(20), pip_value, &ftmo());
            assert_eq!(comp.lot_size, MIN_LOT_SIZE);
            assert!(comp.degraded);
            assert_eq!(comp.risk_amount, Decimal::ZERO);
        }
    }

    #[test]
    fn test_stop_distance_forex() {
        let pips = stop_distance_pips(InstrumentClass::Forex, dec!(1.1000), dec!(1.0980));
        assert_eq!(pips, dec!(20.0000));
    }

    #[test]
    fn test_stop_distance_jpy() {
        let pips = stop_distance_pips(InstrumentClass::JpyPair, dec!(150.00), dec!(149.50));
        assert_eq!(pips, dec!(50.00));
    }

    #[test]
    fn test_stop_distance_metal() {
        let pips = stop_distance_pips(InstrumentClass::Metal, dec!(2400.0), dec!(2395.0));
        assert_eq!(pips, dec!(50.0));
    }

    #[test]
    fn test_stop_distance_crypto_is_percent_of_entry() {
        let pips = stop_distance_pips(InstrumentClass::Crypto, dec!(60_000), dec!(58_800));
        assert_eq!(pips, dec!(2));
    }

    #[test]
    fn test_stop_distance_floors_at_one_pip() {
        let pips = stop_distance_pips(InstrumentClass::Forex, dec!(1.1000), dec!(1.1000));
        assert_eq!(pips, MIN_STOP_DISTANCE_PIPS);
    }

    #[test]
    fn test_stop_distance_saturates_instead_of_overflowing() {
        let pips = stop_distance_pips(InstrumentClass::Forex, Decimal::MAX, dec!(1));
        assert_eq!(pips, Decimal::MAX);

        let dust_entry = dec!(0.0000000000000000000000000001);
        let pips = stop_distance_pips(InstrumentClass::Crypto, dust_entry, dec!(1));
        assert_eq!(pips, Decimal::MAX);
    }

    #[test]
    fn test_extreme_entry_price_degrades_to_minimum_lot() {
        // A quote far beyond any real price must come back degraded,
        // never panic the caller.
        let pips = stop_distance_pips(InstrumentClass::Forex, Decimal::MAX, dec!(1.0850));
        let comp = compute_lot_size(dec!(10_000), dec!(1), pips, dec!(10), &ftmo());

        assert_eq!(comp.lot_size, MIN_LOT_SIZE);
        assert!(comp.degraded);
        assert_eq!(comp.risk_amount, Decimal::ZERO);
    }

    #[test]
    fn test_unit_breakdown() {
        // 100_000 * 2.46% = 2460; 2460 / (20 * 10) = 12.3 lots.
        // FTMO cap at 100k balance is 50 lots, so 12.3 stands.
        let comp = compute_lot_size(dec!(100_000), dec!(2.46), dec!(20), dec!(10), &ftmo());

        assert_eq!(comp.lot_size, dec!(12.30));
        assert_eq!(comp.standard_lots, 12);
        assert_eq!(comp.mini_lots, 3);
        assert_eq!(comp.micro_lots, 0);
    }
}
