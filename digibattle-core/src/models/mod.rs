pub mod config;
pub mod error;
pub mod exchange_result;
pub mod partition;
pub mod state;
