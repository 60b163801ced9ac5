//! HTTP and WebSocket handlers for neurolink-server

pub mod health;
pub mod sessions;
pub mod ws;

pub use health::health_routes;
pub use sessions::session_routes;
pub use ws::{handle_client_message, serve_connection, ws_handler};
