//! Domain models for IDBuilder.
//!
//! Value types shared by the generators: the 128-bit ULID and its Crockford
//! codec, segment ranges, resource types and scopes, and the rollback policy.

pub mod resource;
pub mod rollback;
pub mod segment;
pub mod ulid;

pub use resource::{IdScope, ResourceType};
pub use rollback::ClockRollbackPolicy;
pub use segment::{SegmentRange, SegmentState};
pub use ulid::Ulid128;
