//! Cached Starknet token balance service.
//!
//! Shields clients from the latency and rate limits of a remote chain RPC
//! endpoint with a cache-aside read path, classified retries with
//! exponential backoff, asynchronous durable persistence, and a periodic
//! reconciliation job that keeps watched pairs warm.

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
