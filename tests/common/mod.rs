//! Common test utilities and helpers
//!
//! - `app` - in-process server driven through `tower::ServiceExt::oneshot`
//! - `fixtures` - message builders

#[cfg(feature = "ssr")]
pub mod app;
pub mod fixtures;

#[cfg(feature = "ssr")]
pub use app::*;
pub use fixtures::*;
