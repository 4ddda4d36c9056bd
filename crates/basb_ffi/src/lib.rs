//! Flutter-facing bindings for the BASB core.

pub mod api;
