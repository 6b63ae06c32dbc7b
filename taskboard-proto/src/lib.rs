//! Shared wire data model for the `Taskboard` REST API.

pub mod auth;
pub mod codec;
pub mod datetime;
pub mod id;
pub mod list;
pub mod task;
