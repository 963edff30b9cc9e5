//! Seller Pulse Library
//!
//! Daily order/sale/return reconciliation and search position tracking for
//! Wildberries sellers.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod retry;
pub mod secrets;
