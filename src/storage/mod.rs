//! Storage layer module.
//!
//! Segment repositories behind one trait, so the segment generator runs
//! unchanged against memory, files, Redis, `PostgreSQL` or `MySQL`.

pub mod factory;
pub mod file;
pub mod memory;
pub mod redis;
pub mod sql;
pub mod traits;

pub use factory::create_repository;
pub use file::FileSegmentRepository;
pub use memory::InMemorySegmentRepository;
pub use self::redis::RedisSegmentRepository;
pub use sql::{MySqlSegmentRepository, PostgresSegmentRepository};
pub use traits::{DynSegmentRepository, IdSegmentRepository};
