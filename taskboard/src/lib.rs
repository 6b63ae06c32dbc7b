//! `Taskboard` client library: session lifecycle, backend gateway, task and
//! list caches, and the drag-and-drop status board.

pub mod api;
pub mod app;
pub mod auth;
pub mod board;
pub mod cache;
pub mod config;
