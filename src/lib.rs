pub mod common;
pub mod relay;
pub mod server;
pub mod session;
pub mod ui;
