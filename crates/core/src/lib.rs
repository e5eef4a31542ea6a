//! `portcullis-core`: identity and error primitives shared by every layer.
//!
//! This crate has no I/O and no knowledge of roles or permissions.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{index_by_id, Entity};
pub use error::DomainError;
pub use id::{ActorId, RequestId};
