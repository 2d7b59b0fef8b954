//! Scenario results.

use std::{fmt, time::Duration};

use readmode_domain::{KnownBug, NodeId};
use serde::Serialize;

/// Verdict of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every invariant held.
    Pass,
    /// An invariant was violated or a known fault signature was found.
    Fail,
    /// The harness could not reach a verdict.
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Error => "ERROR",
        };
        f.pad(name)
    }
}

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    /// Scenario name.
    pub scenario: String,
    /// Node the scenario ran against.
    pub target: NodeId,
    /// Verdict.
    pub outcome: Outcome,
    /// Bug the failure was attributed to.
    pub bug: Option<KnownBug>,
    /// What happened, in a sentence.
    pub message: String,
    /// Wall time spent, including baseline relaunch and cleanup.
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl TestResult {
    /// A passing result.
    pub fn pass(scenario: impl Into<String>, target: NodeId) -> Self {
        Self::new(scenario, target, Outcome::Pass, None, "all invariants held")
    }

    /// A failing result, optionally attributed to a bug.
    pub fn fail(
        scenario: impl Into<String>,
        target: NodeId,
        bug: Option<KnownBug>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(scenario, target, Outcome::Fail, bug, message)
    }

    /// A result the harness could not decide.
    pub fn error(scenario: impl Into<String>, target: NodeId, message: impl Into<String>) -> Self {
        Self::new(scenario, target, Outcome::Error, None, message)
    }

    fn new(
        scenario: impl Into<String>,
        target: NodeId,
        outcome: Outcome,
        bug: Option<KnownBug>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            target,
            outcome,
            bug,
            message: message.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Attach the time spent.
    pub const fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<5} {} (node {})", self.outcome, self.scenario, self.target)?;
        if let Some(bug) = self.bug {
            write!(f, " [{bug}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Results of a suite run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// One result per scenario.
    pub results: Vec<TestResult>,
}

impl RunReport {
    /// Number of results with `outcome`.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Whether every scenario passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.outcome == Outcome::Pass)
    }

    /// Result of the named scenario.
    pub fn get(&self, scenario: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.scenario == scenario)
    }

    /// Bugs detected during the run, in first-seen order.
    pub fn detected_bugs(&self) -> Vec<KnownBug> {
        let mut bugs = Vec::new();
        for bug in self.results.iter().filter_map(|r| r.bug) {
            if !bugs.contains(&bug) {
                bugs.push(bug);
            }
        }
        bugs
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{result}")?;
        }
        write!(
            f,
            "{} scenarios: {} passed, {} failed, {} errors",
            self.results.len(),
            self.count(Outcome::Pass),
            self.count(Outcome::Fail),
            self.count(Outcome::Error)
        )
    }
}
