//! cnholiday library
//!
//! Chinese public holiday queries over a yearly JSON feed, backed by a
//! TTL cache store with optional on-disk persistence.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod holiday;
pub mod logging;
pub mod service;
