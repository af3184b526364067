use std::time::Duration;

/// Parameters of the default loot admission law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LootGeneratorConfig {
    /// Base interval over which `probability` applies.
    pub period: Duration,
    /// Chance that a missing item appears within one `period`.
    pub probability: f64,
}

impl Default for LootGeneratorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            probability: 0.5,
        }
    }
}

/// Decides how many loot items a session spawns on a tick.
pub trait LootAdmission: Send {
    fn generate(&mut self, elapsed: Duration, active_loot: usize, dogs: usize) -> usize;

    /// Time accumulated since the last admitted item, kept across snapshots.
    fn time_without_loot(&self) -> Duration {
        Duration::ZERO
    }

    fn set_time_without_loot(&mut self, _elapsed: Duration) {}
}

/// Spawns loot so that there tends towards one item per dog.
///
/// The longer a session goes without new loot the likelier a spawn becomes;
/// the accumulator resets whenever at least one item is admitted.
#[derive(Debug, Clone)]
pub struct LootGenerator {
    config: LootGeneratorConfig,
    time_without_loot: Duration,
}

impl LootGenerator {
    pub fn new(config: LootGeneratorConfig) -> Self {
        Self {
            config,
            time_without_loot: Duration::ZERO,
        }
    }
}

impl LootAdmission for LootGenerator {
    fn time_without_loot(&self) -> Duration {
        self.time_without_loot
    }

    fn set_time_without_loot(&mut self, elapsed: Duration) {
        self.time_without_loot = elapsed;
    }

    fn generate(&mut self, elapsed: Duration, active_loot: usize, dogs: usize) -> usize {
        self.time_without_loot += elapsed;
        let shortage = dogs.saturating_sub(active_loot);
        if shortage == 0 {
            return 0;
        }

        let period = self.config.period.as_secs_f64();
        let ratio = if period > 0.0 {
            self.time_without_loot.as_secs_f64() / period
        } else {
            1.0
        };
        let probability = (1.0 - (1.0 - self.config.probability).powf(ratio)).clamp(0.0, 1.0);
        let count = (shortage as f64 * probability).round() as usize;

        if count > 0 {
            self.time_without_loot = Duration::ZERO;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(period_secs: u64, probability: f64) -> LootGenerator {
        LootGenerator::new(LootGeneratorConfig {
            period: Duration::from_secs(period_secs),
            probability,
        })
    }

    #[test]
    fn no_shortage_no_loot() {
        let mut g = generator(1, 1.0);
        assert_eq!(g.generate(Duration::from_secs(10), 3, 3), 0);
        assert_eq!(g.generate(Duration::from_secs(10), 5, 3), 0);
    }

    #[test]
    fn certain_probability_fills_shortage() {
        let mut g = generator(1, 1.0);
        assert_eq!(g.generate(Duration::from_secs(1), 0, 4), 4);
        assert_eq!(g.time_without_loot(), Duration::ZERO);
    }

    #[test]
    fn zero_probability_never_spawns() {
        let mut g = generator(1, 0.0);
        for _ in 0..10 {
            assert_eq!(g.generate(Duration::from_secs(5), 0, 10), 0);
        }
    }

    #[test]
    fn time_accumulates_until_spawn() {
        // After one full period with p = 0.5 and a shortage of one, the
        // expected count rounds to one.
        let mut g = generator(1, 0.5);
        assert_eq!(g.generate(Duration::from_millis(100), 0, 1), 0);
        assert_eq!(g.time_without_loot(), Duration::from_millis(100));
        assert_eq!(g.generate(Duration::from_millis(900), 0, 1), 1);
        assert_eq!(g.time_without_loot(), Duration::ZERO);
    }

    #[test]
    fn restored_accumulator_keeps_counting() {
        let mut g = generator(1, 0.5);
        g.set_time_without_loot(Duration::from_millis(900));
        assert_eq!(g.generate(Duration::from_millis(100), 0, 1), 1);
    }

    #[test]
    fn zero_elapsed_spawns_nothing() {
        let mut g = generator(1, 0.9);
        assert_eq!(g.generate(Duration::ZERO, 0, 5), 0);
    }
}
