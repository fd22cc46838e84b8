// Submodules
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod runtime;
pub mod state;

// Public API (what main.rs imports)
pub use runtime::{run, start_server, RunningServer};
pub use state::{AppState, UploadSource};
