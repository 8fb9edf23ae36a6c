//! Chemical receipt calculator
//!
//! Receipts are named mixtures of five chemicals. This crate computes each
//! chemical's share of a receipt, distributes a reactor load across the
//! chemicals by those shares, and sums the distributions of several
//! receipts. Receipts live in a SQLite store with live snapshot
//! subscriptions; access goes through an email/password identity provider.

pub mod auth;
pub mod calculator;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod store;

pub use auth::{IdentityProvider, SqliteIdentityProvider};
pub use calculator::{aggregate, distribute, parse_chemical_value, ratios};
pub use db::SqliteReceiptStore;
pub use error::{ReceiptError, Result};
pub use models::{
    Chemical, ChemicalFields, ChemicalQuantitySet, RatioSet, ReactorCalculation, Receipt,
    ReceiptDraft, ReceiptField,
};
pub use store::{ReceiptStore, Subscription};
