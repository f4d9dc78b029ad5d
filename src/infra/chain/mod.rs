//! Chain adapter implementations.

pub mod starknet;

pub use starknet::{StarknetChainAdapter, StarknetConfig};
