//! Autonomous funding and rebalancing for a payment-channel wallet.
//!
//! The controller watches the wallet's on-chain balances, moves spare funds
//! into the channel, exchanges channel wei into tokens, and exposes derived
//! status to the UI through [`app::ControllerHandle`]. Logging is installed
//! at bootstrap via `common::logger::init_logger` unless the embedding app
//! already set a subscriber.

pub mod app;
pub mod chain;
pub mod channel;
pub mod config;
pub mod constants;
pub mod currency;
pub mod db;
pub mod events;
pub mod gas;
pub mod guard;
pub mod metrics;
pub mod minimum_balance;
pub mod reconciler;
pub mod refund;
pub mod scheduler;
pub mod status;
pub mod types;

pub mod error;
pub mod logger;
pub mod time;
