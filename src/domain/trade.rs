//! ClosedTrade: an immutable fact fetched from the trade-history feed.

use crate::domain::{AccountLogin, Decimal, Ticket, TimeS};
use serde::{Deserialize, Serialize};

/// One closed trade on a client's trading account.
///
/// Trades are never mutated locally; they are fetched, evaluated, and (if
/// eligible) monetized at most once per chain participant, keyed by ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub ticket: Ticket,
    pub login: AccountLogin,
    pub symbol: String,
    /// Traded volume in lots (two or more decimal places).
    pub lots: Decimal,
    pub profit: Decimal,
    pub open_time: TimeS,
    pub close_time: TimeS,
}

impl ClosedTrade {
    /// Trade duration in seconds. The feed can deliver equal or inverted
    /// timestamps on corrupt records; callers treat <= 60 as too short
    /// either way.
    pub fn duration_secs(&self) -> i64 {
        self.close_time.as_i64() - self.open_time.as_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn make_trade(open: i64, close: i64) -> ClosedTrade {
        ClosedTrade {
            ticket: Ticket::new(900100),
            login: AccountLogin::new(500123),
            symbol: "EURUSD".to_string(),
            lots: Decimal::from_str("1.5").unwrap(),
            profit: Decimal::from_str("120.40").unwrap(),
            open_time: TimeS::new(open),
            close_time: TimeS::new(close),
        }
    }

    #[test]
    fn test_duration_secs() {
        assert_eq!(make_trade(1_700_000_000, 1_700_000_045).duration_secs(), 45);
        assert_eq!(make_trade(1_700_000_000, 1_700_003_600).duration_secs(), 3600);
    }

    #[test]
    fn test_trade_serialization_roundtrip() {
        let trade = make_trade(1_700_000_000, 1_700_000_300);
        let json = serde_json::to_string(&trade).unwrap();
        let back: ClosedTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
