//! Prop-firm rule catalog and instrument tables.
//!
//! All limits and fallbacks the engine applies live here as explicit, named
//! values. Callers pass these into the pure sizing/breaker functions; nothing
//! in the engine reads ambient configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Smallest tradeable size, in standard lots. The sizer never goes below this.
pub const MIN_LOT_SIZE: Decimal = dec!(0.01);

/// Stop distances are floored here to keep the risk division away from zero.
pub const MIN_STOP_DISTANCE_PIPS: Decimal = dec!(1);

/// Conservative pip value for instruments missing from the table. An explicit
/// default, never a silent zero: unknown symbols size as if they were a
/// USD-quoted major.
pub const DEFAULT_PIP_VALUE_USD: Decimal = dec!(10);

/// Prop firm an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropFirm {
    Ftmo,
    FundedNext,
    E8Markets,
    /// Accounts funded by the desk itself.
    InHouse,
}

/// Firm-level limits, fixed per firm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmRules {
    /// Hard ceiling on the daily loss limit; personal limits may only tighten it.
    pub max_daily_loss_pct: Decimal,
    /// Maximum drawdown from starting balance before the firm fails the account.
    pub max_total_drawdown_pct: Decimal,
    /// Position cap, expressed as lots per 10 000 of account balance.
    pub max_lots_per_10k: Decimal,
}

impl PropFirm {
    /// Every firm the desk currently onboards.
    pub const ALL: [PropFirm; 4] = [
        PropFirm::Ftmo,
        PropFirm::FundedNext,
        PropFirm::E8Markets,
        PropFirm::InHouse,
    ];

    /// Firm rule table.
    pub fn rules(&self) -> FirmRules {
        match self {
            PropFirm::Ftmo => FirmRules {
                max_daily_loss_pct: dec!(5),
                max_total_drawdown_pct: dec!(10),
                max_lots_per_10k: dec!(5),
            },
            PropFirm::FundedNext => FirmRules {
                max_daily_loss_pct: dec!(5),
                max_total_drawdown_pct: dec!(10),
                max_lots_per_10k: dec!(4),
            },
            PropFirm::E8Markets => FirmRules {
                max_daily_loss_pct: dec!(5),
                max_total_drawdown_pct: dec!(8),
                max_lots_per_10k: dec!(4),
            },
            PropFirm::InHouse => FirmRules {
                max_daily_loss_pct: dec!(4),
                max_total_drawdown_pct: dec!(8),
                max_lots_per_10k: dec!(3),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropFirm::Ftmo => "ftmo",
            PropFirm::FundedNext => "funded_next",
            PropFirm::E8Markets => "e8_markets",
            PropFirm::InHouse => "in_house",
        }
    }

    pub fn parse_str(s: &str) -> Option<PropFirm> {
        match s {
            "ftmo" => Some(PropFirm::Ftmo),
            "funded_next" => Some(PropFirm::FundedNext),
            "e8_markets" => Some(PropFirm::E8Markets),
            "in_house" => Some(PropFirm::InHouse),
            _ => None,
        }
    }
}

impl FirmRules {
    /// Position cap for a given balance, in lots. Scales linearly with
    /// balance and never drops below the minimum lot.
    pub fn max_position_size(&self, balance: Decimal) -> Decimal {
        // Divide first so the intermediate stays in range for any balance.
        let cap = balance / dec!(10000) * self.max_lots_per_10k;
        cap.max(MIN_LOT_SIZE)
    }
}

/// Instrument class, derived from the symbol. Selects how a price delta is
/// converted into pips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    Crypto,
    Metal,
    /// Forex pair quoted in JPY (two-decimal pricing).
    JpyPair,
    /// Any other forex pair (four-decimal pricing).
    Forex,
}

impl InstrumentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentClass::Crypto => "crypto",
            InstrumentClass::Metal => "metal",
            InstrumentClass::JpyPair => "jpy_pair",
            InstrumentClass::Forex => "forex",
        }
    }
}

const CRYPTO_BASES: &[&str] = &["BTC", "ETH", "SOL", "XRP", "LTC", "BNB", "ADA", "DOGE"];

/// Classify a symbol by its ticker conventions. Unknown symbols fall through
/// to `Forex`, which pairs with the conservative default pip value.
pub fn classify_symbol(symbol: &str) -> InstrumentClass {
    let s = symbol.to_ascii_uppercase();
    if s.starts_with("XAU") || s.starts_with("XAG") || s.starts_with("XPT") || s.starts_with("XPD")
    {
        InstrumentClass::Metal
    } else if CRYPTO_BASES.iter().any(|base| s.starts_with(base)) {
        InstrumentClass::Crypto
    } else if s.ends_with("JPY") {
        InstrumentClass::JpyPair
    } else {
        InstrumentClass::Forex
    }
}

/// USD pip value per standard lot.
///
/// Explicit entries for instruments whose pip value is fixed in USD; anything
/// else (including non-USD-quoted crosses, whose pip value floats with the
/// quote currency) takes `DEFAULT_PIP_VALUE_USD`.
pub fn pip_value_usd(symbol: &str) -> Decimal {
    match symbol.to_ascii_uppercase().as_str() {
        // USD-quoted majors: $10 per pip per standard lot
        "EURUSD" | "GBPUSD" | "AUDUSD" | "NZDUSD" => dec!(10),
        // Gold: pip is a 0.1 move on a 100 oz contract
        "XAUUSD" => dec!(10),
        // Silver: pip is a 0.01 move on a 5000 oz contract
        "XAGUSD" => dec!(50),
        // Crypto sizes off percentage-of-price distances; $10 per point
        "BTCUSD" | "ETHUSD" => dec!(10),
        _ => DEFAULT_PIP_VALUE_USD,
    }
}
