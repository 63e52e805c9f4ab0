// Server module entry
// Listener setup, per-connection serving, and the accept loop

pub mod connection;
pub mod listener;
mod signal;

// `loop` is a keyword, so the file is mounted under another name
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_listener;
pub use server_loop::{listen_and_serve, Server};
pub use signal::shutdown_signal;
