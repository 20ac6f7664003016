//! Service layer module.
//!
//! Id generators and the [`IdService`] facade that wires them together.

pub mod clock;
pub mod id_service;
pub mod metrics;
pub mod node;
pub mod public_id;
pub mod segment;
pub mod snowflake;
pub mod striped;
pub mod ulid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use id_service::IdService;
pub use metrics::{CountingMetrics, MetricsSink, NoopMetrics, RecorderMetrics};
pub use public_id::{PublicIdCodec, PublicIdFactory};
pub use segment::SegmentLongIdGenerator;
pub use snowflake::{SnowflakeIdGenerator, SnowflakeParts};
pub use striped::StripedUlidGenerator;
pub use ulid::{MonotonicUlidGenerator, UlidGenerator};
