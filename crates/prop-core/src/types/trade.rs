//! Trade types fed in by the external trade pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// One open or closed trade on an account.
///
/// Trades are created and closed by the external pipeline; the risk engine
/// only reads them. `pnl`, `exit_price` and `closed_at` are set together by
/// the single legal `close` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Unique identifier for this trade.
    pub id: Uuid,
    /// Account the trade belongs to.
    pub account_id: Uuid,
    /// Instrument symbol, e.g. "EURUSD" or "XAUUSD".
    pub symbol: String,
    pub direction: TradeDirection,
    /// Size in standard lots.
    pub lot_size: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    /// Signed realized P&L in account currency; `Some` iff the trade is closed.
    pub pnl: Option<Decimal>,
    /// When the position was opened.
    pub opened_at: DateTime<Utc>,
    /// When the position was closed (if it has been).
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// Create a new open trade.
    pub fn new(
        account_id: Uuid,
        symbol: String,
        direction: TradeDirection,
        lot_size: Decimal,
        entry_price: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            symbol,
            direction,
            lot_size,
            entry_price,
            exit_price: None,
            pnl: None,
            opened_at,
            closed_at: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// Close the trade, recording exit price, realized P&L and close time.
    ///
    /// Returns an error if the trade is already closed.
    pub fn close(
        &mut self,
        exit_price: Decimal,
        pnl: Decimal,
        closed_at: DateTime<Utc>,
    ) -> std::result::Result<(), String> {
        if self.is_closed() {
            return Err(format!("Trade {} is already closed", self.id));
        }
        self.exit_price = Some(exit_price);
        self.pnl = Some(pnl);
        self.closed_at = Some(closed_at);
        Ok(())
    }
}
