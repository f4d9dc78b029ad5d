//! Application layer containing business logic and shared state.

pub mod persist;
pub mod scheduler;
pub mod service;
pub mod state;

pub use persist::{PersistHandle, spawn_persist_worker};
pub use scheduler::{ReconciliationWorker, SchedulerConfig, spawn_scheduler};
pub use service::{BalanceService, BalanceServiceConfig};
pub use state::AppState;
