use dashmap::DashMap;
use std::time::Duration;

/// Wall-clock time spent in each toolchain phase, accumulated across every
/// target in a build. Phases run concurrently, so the total can exceed the
/// elapsed time of the build itself.
///
#[derive(Debug, Default)]
pub struct Statistics {
    phases: DashMap<&'static str, Duration>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, phase: &'static str, elapsed: Duration) {
        *self.phases.entry(phase).or_default() += elapsed;
    }

    pub fn phase(&self, phase: &str) -> Duration {
        self.phases
            .get(phase)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.phases.iter().map(|entry| *entry.value()).sum()
    }
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut phases: Vec<(&'static str, Duration)> = self
            .phases
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        phases.sort();
        let mut first = true;
        for (phase, elapsed) in phases {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{} {:.3?}", phase, elapsed)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_accumulate() {
        let stats = Statistics::new();
        stats.record("gc", Duration::from_millis(5));
        stats.record("gc", Duration::from_millis(7));
        stats.record("ld", Duration::from_millis(3));
        assert_eq!(stats.phase("gc"), Duration::from_millis(12));
        assert_eq!(stats.total(), Duration::from_millis(15));
    }

    #[test]
    fn unknown_phases_read_as_zero() {
        let stats = Statistics::new();
        assert_eq!(stats.phase("cgo"), Duration::ZERO);
    }
}
