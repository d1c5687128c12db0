//! Routes Module

/// Main router creation
pub mod router;

pub use router::create_router;
