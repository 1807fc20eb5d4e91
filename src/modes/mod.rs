//! # Mode Runners
//!
//! One pure async function per coordination policy. Each runner consumes
//! the team's agents, the task input, its round budget, the (possibly
//! trace-wrapped) hooks, its mode-specific options, and the external
//! cancellation signal, and produces a [`TeamResult`](crate::team::TeamResult).
//!
//! Failure policy is deliberately asymmetric across modes:
//!
//! | mode       | participant failure                                  |
//! |------------|------------------------------------------------------|
//! | sequential | fails the run                                        |
//! | parallel   | excluded from aggregation, siblings unaffected       |
//! | debate     | fails the run                                        |
//! | supervisor | converted to feedback text for the coordinator       |
//! | custom     | whatever the coordination function decides           |

pub mod custom;
pub(crate) mod debate;
pub(crate) mod parallel;
pub(crate) mod sequential;
pub(crate) mod supervisor;

pub use custom::{CoordinationFn, CoordinationFuture};
