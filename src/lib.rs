//! Terminal client for the HybridBot mental-health assistant.
//!
//! The core is the continuous capture pipeline: [`capture::MediaCapture`]
//! owns the microphone (and optional camera preview) for a whole session and
//! hands out drainable turn buffers, and [`session::SessionController`] moves
//! each turn to the backend through [`api::SessionBackend`].

pub mod api;
pub mod app;
pub mod capture;
pub mod commands;
pub mod config;
pub mod emotion;
pub mod history;
pub mod logging;
pub mod session;
pub mod setup;
pub mod ui;
