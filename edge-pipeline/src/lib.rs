//! Core logic for on-station cut sensing: pure image primitives, the
//! stateful sensor built on them, offline-operation leases, the append-only
//! event store, and per-event validation. `main.rs` wires these into the
//! `vision-verify` CLI; everything here is usable independently of it.

pub mod image;
pub mod lease;
pub mod sensor;
pub mod store;
pub mod validator;
pub mod verify;

pub use vision_types::{Event, EventType, Lease, VisionError};
