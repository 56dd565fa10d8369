//! Domain layer: conversation entities, derived read state, and view state.

pub mod conversation;
pub mod conversation_list_state;
pub mod events;
pub mod ids;
pub mod message;
pub mod open_conversation_state;
pub mod profile;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
