//! Servers demonstrating segment tracing, and the helpers they share.

pub mod termination;
