//! Shared logical session types for the Seshat persistence engine.
//!
//! The host container owns session lifecycle; Seshat only needs a value type
//! carrying the fields it persists. [`SessionValue`] is that boundary: an id,
//! creation and last-access timestamps, an inactivity window, and a set of
//! named attributes.

mod session;

pub use session::{SessionValue, now_epoch_ms};
