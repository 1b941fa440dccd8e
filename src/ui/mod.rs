//! Shared terminal screens.

pub mod alert;

pub use alert::{show_alert, AlertKind, AlertScreen};
