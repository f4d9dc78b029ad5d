//! Test support: mock collaborators shared by unit and integration tests.

pub mod mocks;

pub use mocks::{FailingCacheStore, MockBalanceRepository, MockChainAdapter};
