// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod export;
pub mod feedback;
pub mod machine;
pub mod plan;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod ui;
pub mod wake_lock;
