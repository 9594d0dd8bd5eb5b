//! Core domain types and configuration for ProxDeck

pub mod config;
pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{OperationKind, Session, TaskStatus, VirtualMachine, VmStatus};
