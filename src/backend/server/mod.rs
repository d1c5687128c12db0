//! Server Module
//!
//! ```text
//! server/
//! ├── mod.rs     - Module exports
//! ├── state.rs   - AppState and FromRef implementations
//! ├── config.rs  - ServerConfig (env + TOML) and database connection
//! └── init.rs    - State creation, housekeeping task, app creation
//! ```

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::{LiveEntry, ServerConfig};
pub use init::{create_app, create_state, live_directory, StartupError};
pub use state::AppState;
