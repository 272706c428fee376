//! Files written at the end of a run.
//!
//! - [`report`]: One JSON [`JobReport`](crate::pipeline::JobReport) per job run

pub mod report;
