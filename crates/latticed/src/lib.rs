//! HTTP server for the lattice document store.
//!
//! The binary entry point lives in `main.rs`; this library exposes the
//! router and response envelope so the routes can be exercised in tests
//! without binding a socket.

pub mod envelope;
pub mod server;
