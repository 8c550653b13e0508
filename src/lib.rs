//! Static file server for cross-origin isolated pages.
//!
//! Serves a directory over HTTP/1.1 and appends
//! `Cross-Origin-Opener-Policy`, `Cross-Origin-Embedder-Policy` and
//! `Cross-Origin-Resource-Policy` to every response, so pages loaded from it
//! can use `SharedArrayBuffer` and high-resolution timers during development.

pub mod config;
pub mod handler;
pub mod http;
pub mod isolation;
pub mod logger;
pub mod server;
