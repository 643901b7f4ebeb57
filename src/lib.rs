//! amibake — golden-AMI factory declarations.
//!
//! Compiles a small set of stack parameters into rendered build artifacts
//! and an ordered EC2 Image Builder resource graph, ready for an external
//! emitter to materialize.

pub mod cli;
pub mod core;
pub mod guard;
