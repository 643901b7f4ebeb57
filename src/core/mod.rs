//! Core: config resolution, template rendering, and graph construction.

pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod template;
