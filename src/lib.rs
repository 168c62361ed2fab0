pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod orchestration;

pub use config::Config;
pub use datasource::{FeedError, MockTradeFeed, Mt5TradeFeed, TradeFeed};
pub use db::{init_db, Repository};
pub use domain::{
    AccountLogin, Broker, BrokerId, ClientId, ClosedTrade, Decimal, EntryStatus, ExclusionReason,
    GroupId, LedgerEntry, RateTable, ReferralCode, Ticket, TimeS,
};
pub use engine::{BrokerDirectory, ChainParticipant, TradeValidity};
pub use orchestration::{SyncReport, SyncRunner};
