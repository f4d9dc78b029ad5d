//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod format;
pub mod traits;
pub mod types;

pub use error::{AppError, CacheError, ChainError, DatabaseError, ValidationError};
pub use format::format_token_balance;
pub use traits::{BalanceRepository, CacheStore, ChainAdapter};
pub use types::{
    BalanceObservation, BalanceQuery, BalanceSnapshot, BalanceView, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, HistoryQuery, MultipleBalancesRequest, Network,
    ReconciliationReport, TokenInfo, WatchedPair,
};
