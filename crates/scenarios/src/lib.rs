//! Read-mode transition scenarios.
//!
//! A [`TestScenario`] is a declarative procedure (kill, relaunch with mutated
//! flags, purge reversible blocks, snapshot status) run against one node of a
//! [`Fleet`](readmode_cluster::Fleet), plus the [`Invariant`]s its snapshots
//! must satisfy. [`ScenarioRunner`] executes scenarios in isolation and turns
//! each into a [`TestResult`]:
//!
//! - `Pass` when every invariant holds,
//! - `Fail` when one is violated or a relaunch failure matches a known fault
//!   signature,
//! - `Error` when the harness could not reach a verdict.
//!
//! [`builtin_suite`] holds the standard read-mode scenarios.
//!
//! # Running Tests
//!
//! The tests here drive the suite against `readmode-sim`, so they need no
//! node binary and run in virtual time:
//!
//! ```bash
//! cargo test -p readmode-scenarios
//! ```

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod invariant;
pub use invariant::{Invariant, Verdict, Violation};

mod report;
pub use report::{Outcome, RunReport, TestResult};

mod runner;
pub use runner::{RunnerConfig, RunnerError, ScenarioRunner};

mod scenario;
pub use scenario::{Checkpoint, Expectation, Settle, Step, Strictness, TestScenario};

pub mod suite;
pub use suite::builtin_suite;

#[cfg(test)]
mod tests;
