//! HTTP surface: ingest, listen and status endpoints

pub mod handlers;
pub mod server;

pub use server::{AppState, WebServer};
