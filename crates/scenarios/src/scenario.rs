//! Declarative test scenarios.

use std::{fmt, time::Duration};

use readmode_domain::{FlagMutation, KnownBug, NodeId};
use serde::Serialize;

use crate::Invariant;

/// How to treat a relaunch that fails without a recognised fault signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strictness {
    /// Unexplained failures are harness errors; only a signature makes it a failure.
    #[default]
    KnownBugProbe,
    /// Every failed relaunch fails the scenario.
    Strict,
}

/// A labelled point at which the target's status is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// Before the transition under test.
    Before,
    /// Between two transitions.
    Intermediate,
    /// Right after the transition.
    After,
    /// After a settle window following the transition.
    Settled,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Before => "before",
            Self::Intermediate => "intermediate",
            Self::After => "after",
            Self::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// A wait, either one of the configured windows or a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Wait for LIB to stabilise after production stops.
    Pause,
    /// Wait for a replay to finish.
    Replay,
    /// Let blocks be produced.
    Production,
    /// Wait exactly this long.
    Fixed(Duration),
}

/// One action of a scenario procedure. Node actions apply to the scenario's target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Stop block production.
    PauseProduction,
    /// Restart block production.
    ResumeProduction,
    /// Terminate the target.
    Kill,
    /// Mutate the target's flags and launch it.
    Relaunch(Vec<FlagMutation>),
    /// Delete the target's reversible block database.
    PurgeReversibleBlocks,
    /// Wait.
    Settle(Settle),
    /// Capture the target's status under a label.
    Snapshot(Checkpoint),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PauseProduction => f.write_str("pause production"),
            Self::ResumeProduction => f.write_str("resume production"),
            Self::Kill => f.write_str("kill"),
            Self::Relaunch(mutations) if mutations.is_empty() => f.write_str("relaunch"),
            Self::Relaunch(mutations) => {
                f.write_str("relaunch with")?;
                for mutation in mutations {
                    write!(f, " [{mutation}]")?;
                }
                Ok(())
            }
            Self::PurgeReversibleBlocks => f.write_str("purge reversible blocks"),
            Self::Settle(Settle::Fixed(duration)) => write!(f, "settle {duration:?}"),
            Self::Settle(window) => write!(f, "settle ({window:?})"),
            Self::Snapshot(checkpoint) => write!(f, "snapshot {checkpoint}"),
        }
    }
}

/// An invariant evaluated over two checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    /// Relation to check.
    pub invariant: Invariant,
    /// Checkpoint used as `before`.
    pub before: Checkpoint,
    /// Checkpoint used as `after`.
    pub after: Checkpoint,
}

/// A named procedure run against one target node, plus what it must observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestScenario {
    /// Name used in reports.
    pub name: String,
    /// Node the procedure acts on.
    pub target: NodeId,
    /// Steps run after the target is relaunched with its baseline flags.
    pub procedure: Vec<Step>,
    /// Invariants checked after the procedure.
    pub expected: Vec<Expectation>,
    /// Bug this scenario probes for, if any.
    pub known_bug: Option<KnownBug>,
    /// Treatment of unexplained relaunch failures.
    pub strictness: Strictness,
}

impl TestScenario {
    /// Empty scenario against `target`.
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            procedure: Vec::new(),
            expected: Vec::new(),
            known_bug: None,
            strictness: Strictness::default(),
        }
    }

    /// Append a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.procedure.push(step);
        self
    }

    /// Append several steps.
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.procedure.extend(steps);
        self
    }

    /// Add an invariant over two checkpoints.
    pub fn expect(mut self, invariant: Invariant, before: Checkpoint, after: Checkpoint) -> Self {
        self.expected.push(Expectation { invariant, before, after });
        self
    }

    /// Mark the bug this scenario probes for.
    pub const fn with_known_bug(mut self, bug: KnownBug) -> Self {
        self.known_bug = Some(bug);
        self
    }

    /// Set the strictness.
    pub const fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Whether the procedure stops block production.
    pub fn pauses_production(&self) -> bool {
        self.procedure.contains(&Step::PauseProduction)
    }

    /// Checkpoints named by an expectation that the procedure never captures.
    pub fn missing_checkpoints(&self) -> Vec<Checkpoint> {
        let mut missing = Vec::new();
        for expectation in &self.expected {
            for checkpoint in [expectation.before, expectation.after] {
                if !self.procedure.contains(&Step::Snapshot(checkpoint))
                    && !missing.contains(&checkpoint)
                {
                    missing.push(checkpoint);
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use readmode_domain::ReadMode;

    use super::*;

    #[test]
    fn test_builder_and_checkpoints() {
        let scenario = TestScenario::new("switch", NodeId(3))
            .with_steps([Step::PauseProduction, Step::Snapshot(Checkpoint::Before), Step::Kill])
            .with_step(Step::Relaunch(vec![FlagMutation::read_mode(ReadMode::Irreversible)]))
            .expect(Invariant::SpeculativeToIrreversible, Checkpoint::Before, Checkpoint::After)
            .with_strictness(Strictness::Strict);

        assert!(scenario.pauses_production());
        assert_eq!(scenario.missing_checkpoints(), [Checkpoint::After]);
        assert_eq!(scenario.strictness, Strictness::Strict);
        assert_eq!(scenario.known_bug, None);

        let scenario = scenario.with_step(Step::Snapshot(Checkpoint::After));
        assert!(scenario.missing_checkpoints().is_empty());
    }

    #[test]
    fn test_step_display() {
        let relaunch = Step::Relaunch(vec![
            FlagMutation::read_mode(ReadMode::Irreversible),
            FlagMutation::replay(),
        ]);
        assert_eq!(relaunch.to_string(), "relaunch with [set --read-mode irreversible] [set --replay]");
        assert_eq!(Step::Relaunch(Vec::new()).to_string(), "relaunch");
        assert_eq!(Step::Snapshot(Checkpoint::Settled).to_string(), "snapshot settled");
        assert_eq!(Step::Settle(Settle::Replay).to_string(), "settle (Replay)");
    }
}
