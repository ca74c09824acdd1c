//! Terminal dashboard for a data-warehouse helper backend.
//!
//! Signed-in users can list recent queries, stop the ones they own, and look
//! at daily credit usage. The library holds the session store, the HTTP
//! client and its response classification, the route guard and the view
//! controllers; `main.rs` wires them to a clap CLI.

pub mod activity;
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod guard;
pub mod session;
pub mod views;
