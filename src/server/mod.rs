// Process-level server plumbing
// Socket setup and shutdown signals shared by the binary and embedders

pub mod listener;
pub mod signal;

pub use listener::bind_listener;
pub use signal::shutdown_signal;
