//! LunaTrack - a small self-hosted cycle tracker.
//!
//! # Overview
//!
//! A client records calendar dates marking period starts. The server keeps them
//! in a JSON file and derives statistics on every read: average cycle length,
//! the next predicted start dates, days since/until, and (when enabled) an
//! ovulation day and fertile window per prediction.
//!
//! # Modules
//!
//! - [`dates`]: Calendar-day parsing, formatting and arithmetic
//! - [`stats`]: The pure statistics and prediction engine
//! - [`model`]: Settings, prediction results, request/response bodies
//! - [`storage`]: JSON file storage for settings and entries
//! - [`api`]: HTTP API handlers
//! - [`error`]: Error types

pub mod api;
pub mod dates;
pub mod error;
pub mod model;
pub mod stats;
pub mod storage;
