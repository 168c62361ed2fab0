//! Domain types for the commission distribution engine.
//!
//! This module provides:
//! - Lossless monetary/rate arithmetic via the Decimal wrapper
//! - Identifier newtypes: BrokerId, ClientId, Ticket, AccountLogin, GroupId,
//!   ReferralCode, TimeS
//! - Broker records with per-instrument-group rate tables
//! - ClosedTrade and LedgerEntry types with canonical serialization

pub mod broker;
pub mod decimal;
pub mod ids;
pub mod ledger;
pub mod trade;

pub use broker::{Broker, RateTable};
pub use decimal::Decimal;
pub use ids::{AccountLogin, BrokerId, ClientId, GroupId, ReferralCode, Ticket, TimeS};
pub use ledger::{EntryStatus, ExclusionReason, LedgerEntry};
pub use trade::ClosedTrade;
