//! Warden common core types.

pub mod id;
pub mod timestamp;

pub use id::{IdParseError, OperationId, PrincipalId, ResourceId, SessionId};
pub use timestamp::Timestamp;
