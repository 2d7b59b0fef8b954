//! The built-in read-mode suite.
//!
//! Each scenario runs against its own node, so a node left in a broken state
//! never affects another scenario. Read-mode switches first relaunch their
//! node into the starting mode, so they hold for any configured baseline.

use readmode_domain::{FlagMutation, KnownBug, NodeId, ReadMode};

use crate::{Checkpoint, Invariant, Settle, Step, TestScenario};

/// Replay in irreversible mode while the reversible block database is present.
pub const REPLAY_RETAINED: &str = "replay-irreversible-retained";
/// Replay in irreversible mode after deleting the reversible block database.
pub const REPLAY_PURGED: &str = "replay-irreversible-purged";
/// Switch speculative to irreversible with production paused.
pub const SPECULATIVE_TO_IRREVERSIBLE: &str = "speculative-to-irreversible";
/// Switch irreversible to speculative with production paused.
pub const IRREVERSIBLE_TO_SPECULATIVE: &str = "irreversible-to-speculative";
/// Switch speculative to irreversible while blocks are produced.
pub const SPECULATIVE_TO_IRREVERSIBLE_LIVE: &str = "speculative-to-irreversible-under-production";
/// Switch irreversible to speculative while blocks are produced.
pub const IRREVERSIBLE_TO_SPECULATIVE_LIVE: &str = "irreversible-to-speculative-under-production";
/// Speculative to irreversible and back again.
pub const ROUND_TRIP: &str = "speculative-irreversible-round-trip";

fn switch_to(mode: ReadMode) -> Step {
    Step::Relaunch(vec![FlagMutation::read_mode(mode)])
}

/// Relaunch into `mode` before the transition under test.
fn pin(mode: ReadMode) -> [Step; 2] {
    [Step::Kill, switch_to(mode)]
}

fn replay_irreversible() -> Step {
    Step::Relaunch(vec![FlagMutation::read_mode(ReadMode::Irreversible), FlagMutation::replay()])
}

/// Every built-in scenario, in run order.
pub fn builtin_suite() -> Vec<TestScenario> {
    use Checkpoint::{After, Before, Intermediate, Settled};

    vec![
        TestScenario::new(REPLAY_RETAINED, NodeId(1))
            .with_steps([
                Step::PauseProduction,
                Step::Snapshot(Before),
                Step::Kill,
                replay_irreversible(),
                Step::Snapshot(After),
            ])
            .expect(Invariant::ReplayIrreversibleRetained, Before, After)
            .with_known_bug(KnownBug::DuplicateBlock),
        TestScenario::new(REPLAY_PURGED, NodeId(2))
            .with_steps([
                Step::PauseProduction,
                Step::Snapshot(Before),
                Step::Kill,
                Step::PurgeReversibleBlocks,
                replay_irreversible(),
                Step::Settle(Settle::Replay),
                Step::Snapshot(After),
            ])
            .expect(Invariant::ReplayIrreversiblePurged, Before, After),
        TestScenario::new(SPECULATIVE_TO_IRREVERSIBLE, NodeId(3))
            .with_step(Step::PauseProduction)
            .with_steps(pin(ReadMode::Speculative))
            .with_steps([
                Step::Snapshot(Before),
                Step::Kill,
                switch_to(ReadMode::Irreversible),
                Step::Snapshot(After),
            ])
            .expect(Invariant::SpeculativeToIrreversible, Before, After),
        TestScenario::new(IRREVERSIBLE_TO_SPECULATIVE, NodeId(4))
            .with_step(Step::PauseProduction)
            .with_steps(pin(ReadMode::Irreversible))
            .with_steps([
                Step::Snapshot(Before),
                Step::Kill,
                switch_to(ReadMode::Speculative),
                Step::Snapshot(After),
            ])
            .expect(Invariant::IrreversibleToSpeculative, Before, After),
        TestScenario::new(SPECULATIVE_TO_IRREVERSIBLE_LIVE, NodeId(5))
            .with_steps(pin(ReadMode::Speculative))
            .with_steps([
                Step::Kill,
                switch_to(ReadMode::Irreversible),
                Step::Snapshot(After),
                Step::Settle(Settle::Production),
                Step::Snapshot(Settled),
            ])
            .expect(Invariant::AdvancingUnderProduction, After, Settled),
        TestScenario::new(IRREVERSIBLE_TO_SPECULATIVE_LIVE, NodeId(6))
            .with_steps(pin(ReadMode::Irreversible))
            .with_steps([
                Step::Kill,
                switch_to(ReadMode::Speculative),
                Step::Snapshot(After),
                Step::Settle(Settle::Production),
                Step::Snapshot(Settled),
            ])
            .expect(Invariant::AdvancingUnderProduction, After, Settled),
        TestScenario::new(ROUND_TRIP, NodeId(7))
            .with_step(Step::PauseProduction)
            .with_steps(pin(ReadMode::Speculative))
            .with_steps([
                Step::Snapshot(Before),
                Step::Kill,
                switch_to(ReadMode::Irreversible),
                Step::Snapshot(Intermediate),
                Step::Kill,
                switch_to(ReadMode::Speculative),
                Step::Snapshot(After),
            ])
            .expect(Invariant::SpeculativeToIrreversible, Before, Intermediate)
            .expect(Invariant::IrreversibleToSpeculative, Intermediate, After),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_suite_is_well_formed() {
        let suite = builtin_suite();
        assert_eq!(suite.len(), 7);

        let targets: HashSet<_> = suite.iter().map(|s| s.target).collect();
        assert_eq!(targets.len(), suite.len(), "every scenario has its own node");
        assert!(suite.iter().all(|s| s.target != NodeId(0)), "node 0 produces blocks");

        let names: HashSet<_> = suite.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), suite.len());

        for scenario in &suite {
            assert!(scenario.missing_checkpoints().is_empty(), "{}", scenario.name);
            assert!(!scenario.expected.is_empty(), "{}", scenario.name);
        }
    }

    #[test]
    fn test_switches_relaunch_into_their_starting_mode_first() {
        let suite = builtin_suite();
        let starts = [
            (SPECULATIVE_TO_IRREVERSIBLE, ReadMode::Speculative),
            (IRREVERSIBLE_TO_SPECULATIVE, ReadMode::Irreversible),
            (SPECULATIVE_TO_IRREVERSIBLE_LIVE, ReadMode::Speculative),
            (IRREVERSIBLE_TO_SPECULATIVE_LIVE, ReadMode::Irreversible),
            (ROUND_TRIP, ReadMode::Speculative),
        ];
        for (name, start) in starts {
            let scenario = suite.iter().find(|s| s.name == name).unwrap();
            let first_relaunch = scenario.procedure.iter().find_map(|step| match step {
                Step::Relaunch(mutations) => Some(mutations.clone()),
                _ => None,
            });
            assert_eq!(first_relaunch, Some(vec![FlagMutation::read_mode(start)]), "{name}");
        }
    }

    #[test]
    fn test_only_replay_with_retained_blocks_probes_a_bug() {
        let probing: Vec<_> =
            builtin_suite().into_iter().filter(|s| s.known_bug.is_some()).collect();
        assert_eq!(probing.len(), 1);
        assert_eq!(probing[0].name, REPLAY_RETAINED);
        assert_eq!(probing[0].known_bug, Some(KnownBug::DuplicateBlock));
    }
}
