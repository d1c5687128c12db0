//! Integration tests
//!
//! HTTP handlers are driven through the real router; client flows run
//! against the same router via `InProcessApi` and the server's hub.

#[cfg(feature = "ssr")]
pub mod chat_test;
#[cfg(feature = "ssr")]
pub mod realtime_test;
#[cfg(feature = "ssr")]
pub mod scenario_test;
#[cfg(feature = "ssr")]
pub mod sse_test;
#[cfg(feature = "ssr")]
pub mod views_test;
