// src/services/mod.rs
//
// Shared services module containing infrastructure services
// used across the auth domain

pub mod sweeper;
pub mod vault;

// Re-export commonly used types for convenience
pub use sweeper::{SweeperHandle, SweeperService};
pub use vault::TokenVault;
