//! Domain layer for the annotask assignment engine
//!
//! This module contains the core models, the overlap policy and the port
//! traits that storage adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
