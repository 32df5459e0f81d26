//! Studio back office service: organizations, clients, catalog, purchases,
//! payments and balances over PostgreSQL.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::{AppState, Application};
