//! Top-level subcommand entry points.

pub mod map;
