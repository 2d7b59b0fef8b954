//! Outcome classification and isolation.

use readmode_cluster::{Fleet, RelaunchOutcome};
use readmode_domain::{FlagMutation, KnownBug, NodeId, ReadMode};
use readmode_sim::SimFault;

use super::{Unresponsive, run, sim};
use crate::{
    Checkpoint, Invariant, Outcome, RunnerConfig, RunnerError, ScenarioRunner, Settle, Step,
    Strictness, TestScenario,
};

fn switch(target: NodeId) -> TestScenario {
    TestScenario::new("switch", target)
        .with_steps([
            Step::PauseProduction,
            Step::Snapshot(Checkpoint::Before),
            Step::Kill,
            Step::Relaunch(vec![FlagMutation::read_mode(ReadMode::Irreversible)]),
            Step::Snapshot(Checkpoint::After),
        ])
        .expect(Invariant::SpeculativeToIrreversible, Checkpoint::Before, Checkpoint::After)
}

fn unresponsive(outcome: RelaunchOutcome) -> Unresponsive<readmode_sim::SimFleet> {
    Unresponsive { inner: sim(&[]), node: NodeId(3), outcome }
}

#[tokio::test]
async fn test_unexplained_exit_is_an_error_by_default() {
    let mut fleet = unresponsive(RelaunchOutcome::Exited { code: Some(1) });
    let report = run(&mut fleet, &[switch(NodeId(3))]).await;

    let result = &report.results[0];
    assert_eq!(result.outcome, Outcome::Error);
    assert_eq!(result.bug, None);
    assert!(result.message.contains("exited with code 1"), "{}", result.message);
    assert!(result.message.contains("no known fault signature"));
}

#[tokio::test]
async fn test_unexplained_exit_fails_strict_scenario() {
    let mut fleet = unresponsive(RelaunchOutcome::TimedOut);
    let scenario = switch(NodeId(3)).with_strictness(Strictness::Strict);
    let report = run(&mut fleet, &[scenario]).await;

    let result = &report.results[0];
    assert_eq!(result.outcome, Outcome::Fail);
    assert_eq!(result.bug, None);
    assert!(result.message.contains("timed out"));
}

#[tokio::test]
async fn test_global_strict_overrides_scenario() {
    let mut fleet = unresponsive(RelaunchOutcome::Exited { code: None });
    let config = RunnerConfig { strict: true, ..RunnerConfig::default() };
    let result = ScenarioRunner::new(&mut fleet, config).run(&switch(NodeId(3))).await;
    assert_eq!(result.outcome, Outcome::Fail);
}

#[tokio::test]
async fn test_other_registered_signature_wins_over_expected_bug() {
    let mut fleet = sim(&[SimFault::DuplicateBlockOnReplay]);
    let scenario = TestScenario::new("replay", NodeId(1))
        .with_steps([
            Step::PauseProduction,
            Step::Snapshot(Checkpoint::Before),
            Step::Kill,
            Step::Relaunch(vec![
                FlagMutation::read_mode(ReadMode::Irreversible),
                FlagMutation::replay(),
            ]),
            Step::Snapshot(Checkpoint::After),
        ])
        .expect(Invariant::ReplayIrreversibleRetained, Checkpoint::Before, Checkpoint::After)
        .with_known_bug(KnownBug::BlockNotInFuture);
    let report = run(&mut fleet, &[scenario]).await;

    assert_eq!(report.results[0].outcome, Outcome::Fail);
    assert_eq!(report.results[0].bug, Some(KnownBug::DuplicateBlock));
}

#[tokio::test]
async fn test_status_of_dead_node_is_an_error() {
    let mut fleet = sim(&[]);
    let scenario = TestScenario::new("dead", NodeId(2))
        .with_steps([Step::Kill, Step::Snapshot(Checkpoint::Before), Step::Snapshot(Checkpoint::After)])
        .expect(Invariant::AdvancingUnderProduction, Checkpoint::Before, Checkpoint::After);
    let report = run(&mut fleet, &[scenario]).await;

    let result = &report.results[0];
    assert_eq!(result.outcome, Outcome::Error);
    assert!(result.message.starts_with("snapshot before:"), "{}", result.message);
    assert!(result.message.contains("not running"));
}

#[tokio::test]
async fn test_invariant_violation_fails() {
    let mut fleet = sim(&[]);
    // Nothing is produced while paused, so the head cannot advance.
    let scenario = TestScenario::new("paused", NodeId(5))
        .with_steps([
            Step::PauseProduction,
            Step::Snapshot(Checkpoint::Before),
            Step::Settle(Settle::Production),
            Step::Snapshot(Checkpoint::After),
        ])
        .expect(Invariant::AdvancingUnderProduction, Checkpoint::Before, Checkpoint::After);
    let report = run(&mut fleet, &[scenario]).await;

    let result = &report.results[0];
    assert_eq!(result.outcome, Outcome::Fail);
    assert!(result.message.starts_with("advancing-under-production (before head=1050"));
}

#[tokio::test]
async fn test_missing_checkpoint_is_reported_without_running() {
    let mut fleet = sim(&[]);
    let scenario = TestScenario::new("incomplete", NodeId(1))
        .with_step(Step::Kill)
        .expect(Invariant::SpeculativeToIrreversible, Checkpoint::Before, Checkpoint::After);
    let report = run(&mut fleet, &[scenario]).await;

    assert_eq!(report.results[0].outcome, Outcome::Error);
    assert!(report.results[0].message.contains("never captured"));
}

#[tokio::test]
async fn test_unknown_target_stops_the_suite() {
    let mut fleet = sim(&[]);
    let scenarios = [switch(NodeId(3)), switch(NodeId(12))];
    let err = ScenarioRunner::new(&mut fleet, RunnerConfig::default())
        .run_all(&scenarios)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::UnknownTarget { node: NodeId(12), total: 8, .. }));
    // Validation happens before anything runs.
    assert!(fleet.is_alive(NodeId(3)).unwrap());
}

#[tokio::test]
async fn test_failed_scenario_does_not_block_the_next() {
    let mut fleet = sim(&[]);
    let broken = TestScenario::new("broken", NodeId(1))
        .with_steps([Step::PauseProduction, Step::Kill, Step::Snapshot(Checkpoint::Before)])
        .expect(Invariant::ReplayIrreversibleRetained, Checkpoint::Before, Checkpoint::Before);
    let live = TestScenario::new("live", NodeId(5))
        .with_steps([
            Step::Snapshot(Checkpoint::After),
            Step::Settle(Settle::Production),
            Step::Snapshot(Checkpoint::Settled),
        ])
        .expect(Invariant::AdvancingUnderProduction, Checkpoint::After, Checkpoint::Settled);
    let report = run(&mut fleet, &[broken, live, switch(NodeId(3))]).await;

    let outcomes: Vec<_> = report.results.iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes, [Outcome::Error, Outcome::Pass, Outcome::Pass]);
}

#[tokio::test]
async fn test_rerunning_a_scenario_starts_from_baseline() {
    let mut fleet = sim(&[]);
    let report = run(&mut fleet, &[switch(NodeId(3)), switch(NodeId(3))]).await;
    assert!(report.all_passed(), "{report}");
    assert_eq!(fleet.read_mode(NodeId(3)).unwrap(), Some(ReadMode::Irreversible));
}
