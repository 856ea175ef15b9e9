//! The statistics pipeline: clock, retrieval, and the derived tables.

pub mod aggregate;
pub mod clock;
pub mod daily;
pub mod distribution;
pub mod indicators;
pub mod retrieval;
