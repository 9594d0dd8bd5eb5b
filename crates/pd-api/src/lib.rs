//! Proxmox VE REST API gateway
//!
//! This crate is the only part of ProxDeck that talks to the cluster.
//! [`ClusterGateway`] is the contract the lifecycle coordinator consumes;
//! [`ProxmoxGateway`] is its HTTP implementation. Responses are unwrapped
//! from the API's `{ "data": ... }` envelope and failures are normalized
//! into [`GatewayError`] so nothing above this crate sees raw HTTP.

mod client;
mod error;
mod gateway;
mod wire;

pub use client::ProxmoxGateway;
pub use error::{GatewayError, GatewayResult};
pub use gateway::ClusterGateway;
