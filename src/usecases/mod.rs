//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod identity;
pub mod list_conversations;
pub mod list_mentors;
pub mod message_stream;
pub mod read_state;
pub mod send_message;
pub mod session;
pub mod start_conversation;
pub mod subscription;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
