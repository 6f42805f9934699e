//! Data Transfer Objects for REST request/response serialization.
//!
//! Timestamps on the wire are milliseconds since the epoch throughout.

pub mod app_dto;
pub mod chair_dto;
pub mod owner_dto;
pub mod system_dto;

pub use app_dto::*;
pub use chair_dto::*;
pub use owner_dto::*;
pub use system_dto::*;
