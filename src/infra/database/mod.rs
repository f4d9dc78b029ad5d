//! Durable store implementations.

pub mod postgres;

pub use postgres::{PostgresBalanceRepository, PostgresConfig};
