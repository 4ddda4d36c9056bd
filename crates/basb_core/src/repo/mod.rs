//! Repository layer: the boundary to the remote note store.
//!
//! # Responsibility
//! - Define the request/response contract services depend on.
//! - Isolate SQLite query details from store orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   transport errors.

pub mod note_repo;
