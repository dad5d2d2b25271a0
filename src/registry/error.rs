//! Registry error types
//!
//! Error types for subscriber registry operations.

use super::handle::SubscriberId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registry is at its configured subscriber limit
    AtCapacity(usize),
    /// No handle with the given id
    NotFound(SubscriberId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::AtCapacity(limit) => {
                write!(f, "Registry at capacity: {} subscribers", limit)
            }
            RegistryError::NotFound(id) => write!(f, "Subscriber not found: {}", id),
        }
    }
}

impl std::error::Error for RegistryError {}
