//! Network-wide chain progress.

use std::time::Duration;

/// Shape of the simulated chain at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimChainConfig {
    /// Head block number every node starts at.
    pub initial_head: u64,
    /// Distance between head and LIB.
    pub lib_lag: u64,
    /// Time between produced blocks.
    pub block_interval: Duration,
}

impl Default for SimChainConfig {
    fn default() -> Self {
        Self { initial_head: 1050, lib_lag: 50, block_interval: Duration::from_millis(500) }
    }
}

/// Head and LIB as seen by the producers.
#[derive(Debug, Clone)]
pub(crate) struct SimChain {
    config: SimChainConfig,
    head: u64,
    pending: Duration,
}

impl SimChain {
    pub(crate) const fn new(config: SimChainConfig) -> Self {
        Self { head: config.initial_head, config, pending: Duration::ZERO }
    }

    pub(crate) const fn head(&self) -> u64 {
        self.head
    }

    pub(crate) const fn lib(&self) -> u64 {
        self.head.saturating_sub(self.config.lib_lag)
    }

    /// Let `elapsed` pass. Blocks are only produced while `producing`.
    /// Returns the number of new blocks.
    pub(crate) fn advance(&mut self, elapsed: Duration, producing: bool) -> u64 {
        if !producing {
            self.pending = Duration::ZERO;
            return 0;
        }
        let interval = self.config.block_interval.as_millis().max(1);
        let total = (self.pending + elapsed).as_millis();
        let blocks = u64::try_from(total / interval).unwrap_or(u64::MAX);
        let rest = u64::try_from(total % interval).unwrap_or_default();
        self.pending = Duration::from_millis(rest);
        self.head = self.head.saturating_add(blocks);
        blocks
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_production_accumulates_partial_intervals() {
        let mut chain = SimChain::new(SimChainConfig::default());
        assert_eq!((chain.head(), chain.lib()), (1050, 1000));

        assert_eq!(chain.advance(Duration::from_millis(300), true), 0);
        assert_eq!(chain.advance(Duration::from_millis(300), true), 1);
        assert_eq!(chain.advance(Duration::from_secs(2), true), 4);
        assert_eq!((chain.head(), chain.lib()), (1055, 1005));
    }

    #[test]
    fn test_paused_chain_is_frozen() {
        let mut chain = SimChain::new(SimChainConfig::default());
        chain.advance(Duration::from_millis(400), true);
        assert_eq!(chain.advance(Duration::from_secs(60), false), 0);
        // Pending time is dropped while paused.
        assert_eq!(chain.advance(Duration::from_millis(200), true), 0);
        assert_eq!(chain.head(), 1050);
    }

    #[test]
    fn test_lib_saturates_near_genesis() {
        let chain = SimChain::new(SimChainConfig { initial_head: 10, ..SimChainConfig::default() });
        assert_eq!(chain.lib(), 0);
    }

    proptest! {
        #[test]
        fn prop_production_ignores_how_time_is_split(
            steps in prop::collection::vec(0u64..3_000, 1..40),
        ) {
            let mut chain = SimChain::new(SimChainConfig::default());
            let produced: u64 =
                steps.iter().map(|ms| chain.advance(Duration::from_millis(*ms), true)).sum();
            let total: u64 = steps.iter().sum();
            prop_assert_eq!(produced, total / 500);
            prop_assert_eq!(chain.head(), 1050 + produced);
            prop_assert_eq!(chain.lib() + 50, chain.head());
        }
    }
}
