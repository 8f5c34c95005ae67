//! Surf Authority - server-authoritative character simulation
//!
//! Runs the per-tick movement pipeline for every connected character
//! and streams snapshots to clients over WebSocket.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
