//! API Module
//!
//! JSON-RPC adapter over the batching engine. Clients post
//! `{"jsonrpc": "2.0", "method": ..., "params": {...}, "id": ...}` to "/".

mod server;
pub use server::{AppState, Server, router};
