// Server module entry point
// Listener setup, connection handling, the accept loop and the socket wrapper

pub mod connection;
pub mod listener;
pub mod signal;
pub mod stream;

// `loop` is a keyword, so the module is exposed as server_loop
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_listener;
pub use server_loop::start_server_loop;
pub use signal::shutdown_signal;
