//! Use-case layer over the repository.
//!
//! # Responsibility
//! - Own the CODE stage policy and the cached note aggregate.
//! - Keep FFI/CLI hosts decoupled from storage details.

pub mod note_store;
pub mod stage_policy;
