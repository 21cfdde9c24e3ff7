//! Identifier generation for messages, parts, and synthesized tool calls.

/// Generate a prefixed unique id (e.g. `msg_3f2a…`).
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}
