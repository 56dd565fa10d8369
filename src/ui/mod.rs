//! UI layer: plain-text views of the session state.

pub mod message_rendering;
pub mod view;

/// Returns the ui module name for smoke checks.
pub fn module_name() -> &'static str {
    "ui"
}
