//! Video streaming: byte ranges, seek throttling, per-client sessions.
//!
//! The [`engine`] ties the pieces together; the other modules are the stages it
//! drives and the policies it consults.

pub mod bitrate;
pub mod engine;
pub mod range;
pub mod resource;
pub mod sessions;
pub mod throttle;

pub use bitrate::{BitrateEstimator, ConfiguredBitrates, FallbackEstimator};
pub use engine::{Plan, StreamEngine, StreamEngineBuilder, StreamRequest};
pub use range::{parse_range_header, ByteSpan};
pub use resource::ResourceHandle;
pub use sessions::{start_cleanup_task, InMemorySessionStore, SessionStore};
pub use throttle::ThrottlePolicy;
