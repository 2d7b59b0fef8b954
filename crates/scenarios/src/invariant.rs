//! Postconditions relating a node's status before and after a transition.

use std::fmt;

use readmode_domain::StatusSnapshot;
use serde::Serialize;

/// A relation between two status snapshots that a read-mode transition must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    /// Replay in irreversible mode with reversible blocks retained. The node
    /// coming up is the whole postcondition; the runner checks the relaunch
    /// outcome.
    ReplayIrreversibleRetained,
    /// Replay in irreversible mode after purging reversible blocks:
    /// `head(after) == lib(before)` and `lib(after) == lib(before)`.
    ReplayIrreversiblePurged,
    /// `head(after) == lib(before) == lib(after)` and
    /// `fork_db_head(after) == fork_db_head(before)`.
    SpeculativeToIrreversible,
    /// `head(after) == fork_db_head(after)`, `lib(after) == lib(before)` and
    /// `fork_db_head(after) == fork_db_head(before)`.
    IrreversibleToSpeculative,
    /// `head(after) > head(before)` while blocks are being produced.
    AdvancingUnderProduction,
}

impl Invariant {
    /// Evaluate the invariant. Never panics; every broken relation is reported.
    pub fn check(self, before: &StatusSnapshot, after: &StatusSnapshot) -> Verdict {
        let mut violations = Vec::new();
        let mut equal = |relation: &'static str, expected: u64, actual: u64| {
            if expected != actual {
                violations.push(Violation { relation, expected, actual });
            }
        };
        match self {
            Self::ReplayIrreversibleRetained => {}
            Self::ReplayIrreversiblePurged => {
                equal("head(after) == lib(before)", before.lib(), after.head());
                equal("lib(after) == lib(before)", before.lib(), after.lib());
            }
            Self::SpeculativeToIrreversible => {
                equal("head(after) == lib(before)", before.lib(), after.head());
                equal("lib(after) == lib(before)", before.lib(), after.lib());
                equal(
                    "fork_db_head(after) == fork_db_head(before)",
                    before.fork_db_head(),
                    after.fork_db_head(),
                );
            }
            Self::IrreversibleToSpeculative => {
                equal("head(after) == fork_db_head(after)", after.fork_db_head(), after.head());
                equal("lib(after) == lib(before)", before.lib(), after.lib());
                equal(
                    "fork_db_head(after) == fork_db_head(before)",
                    before.fork_db_head(),
                    after.fork_db_head(),
                );
            }
            Self::AdvancingUnderProduction => {
                if after.head() <= before.head() {
                    // Report the first head that would have held.
                    violations.push(Violation {
                        relation: "head(after) > head(before)",
                        expected: before.head().checked_add(1).unwrap_or(u64::MAX),
                        actual: after.head(),
                    });
                }
            }
        }
        if violations.is_empty() { Verdict::Satisfied } else { Verdict::Violated(violations) }
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReplayIrreversibleRetained => "replay-irreversible-retained",
            Self::ReplayIrreversiblePurged => "replay-irreversible-purged",
            Self::SpeculativeToIrreversible => "speculative-to-irreversible",
            Self::IrreversibleToSpeculative => "irreversible-to-speculative",
            Self::AdvancingUnderProduction => "advancing-under-production",
        };
        f.write_str(name)
    }
}

/// One broken relation.
///
/// For `>` relations `expected` is the smallest value that would have held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// The relation, e.g. `head(after) == lib(before)`.
    pub relation: &'static str,
    /// Value the relation required.
    pub expected: u64,
    /// Observed value.
    pub actual: u64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, got {}", self.relation, self.expected, self.actual)
    }
}

/// Result of checking an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every relation held.
    Satisfied,
    /// At least one relation was broken.
    Violated(Vec<Violation>),
}

impl Verdict {
    /// Whether every relation held.
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => f.write_str("satisfied"),
            Self::Violated(violations) => {
                for (i, violation) in violations.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{violation}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn snap(head: u64, lib: u64, fork_db_head: u64) -> StatusSnapshot {
        StatusSnapshot::new(head, lib, fork_db_head)
    }

    #[test]
    fn test_purged_replay_holds_lib() {
        let before = snap(1050, 1000, 1050);
        assert!(Invariant::ReplayIrreversiblePurged.check(&before, &snap(1000, 1000, 1000)).is_satisfied());

        let verdict = Invariant::ReplayIrreversiblePurged.check(&before, &snap(1000, 999, 1000));
        assert_eq!(
            verdict,
            Verdict::Violated(vec![Violation {
                relation: "lib(after) == lib(before)",
                expected: 1000,
                actual: 999,
            }])
        );
        assert_eq!(verdict.to_string(), "lib(after) == lib(before): expected 1000, got 999");
    }

    #[test]
    fn test_speculative_to_irreversible() {
        let before = snap(500, 450, 500);
        assert!(Invariant::SpeculativeToIrreversible.check(&before, &snap(450, 450, 500)).is_satisfied());

        let Verdict::Violated(violations) =
            Invariant::SpeculativeToIrreversible.check(&before, &snap(500, 450, 450))
        else {
            panic!("expected violations");
        };
        let relations: Vec<_> = violations.iter().map(|v| v.relation).collect();
        assert_eq!(
            relations,
            ["head(after) == lib(before)", "fork_db_head(after) == fork_db_head(before)"]
        );
    }

    #[test]
    fn test_irreversible_to_speculative() {
        let before = snap(450, 450, 500);
        assert!(Invariant::IrreversibleToSpeculative.check(&before, &snap(500, 450, 500)).is_satisfied());
        assert!(!Invariant::IrreversibleToSpeculative.check(&before, &snap(450, 450, 450)).is_satisfied());
    }

    #[test]
    fn test_advancing_under_production() {
        let before = snap(1000, 950, 1000);
        assert!(Invariant::AdvancingUnderProduction.check(&before, &snap(1001, 951, 1001)).is_satisfied());
        let verdict = Invariant::AdvancingUnderProduction.check(&before, &before);
        assert_eq!(verdict.to_string(), "head(after) > head(before): expected 1001, got 1000");
    }

    #[test]
    fn test_stuck_head_at_max_does_not_advance() {
        let top = snap(u64::MAX, u64::MAX - 50, u64::MAX);
        assert!(!Invariant::AdvancingUnderProduction.check(&top, &top).is_satisfied());
        assert!(
            Invariant::AdvancingUnderProduction
                .check(&snap(u64::MAX - 1, 0, 0), &top)
                .is_satisfied()
        );
    }

    proptest! {
        #[test]
        fn retained_replay_never_violates(
            a in any::<(u64, u64, u64)>(),
            b in any::<(u64, u64, u64)>(),
        ) {
            let verdict = Invariant::ReplayIrreversibleRetained
                .check(&snap(a.0, a.1, a.2), &snap(b.0, b.1, b.2));
            prop_assert!(verdict.is_satisfied());
        }

        #[test]
        fn advancing_means_strictly_greater(before in any::<u64>(), after in any::<u64>()) {
            let verdict = Invariant::AdvancingUnderProduction
                .check(&snap(before, 0, before), &snap(after, 0, after));
            prop_assert_eq!(verdict.is_satisfied(), after > before);
        }

        #[test]
        fn identical_snapshots_satisfy_equalities_when_consistent(
            lib in 0u64..1_000_000,
            reversible in 0u64..1_000,
        ) {
            let fork_db_head = lib + reversible;
            let before = snap(fork_db_head, lib, fork_db_head);
            let after = snap(fork_db_head, lib, fork_db_head);
            prop_assert!(Invariant::IrreversibleToSpeculative.check(&before, &after).is_satisfied());
            prop_assert_eq!(
                Invariant::SpeculativeToIrreversible.check(&before, &after).is_satisfied(),
                reversible == 0
            );
        }
    }
}
