/// Nanoseconds per second, the scheduler's time base.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Tracks cycles charged against one `execute_run` budget.
///
/// The budget is checked only between instructions, so `consumed` may end up
/// past `budget` by at most one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleCounter {
    budget: u64,
    consumed: u64,
}

impl CycleCounter {
    /// Starts a run with `budget` cycles.
    #[must_use]
    pub const fn new(budget: u64) -> Self {
        Self {
            budget,
            consumed: 0,
        }
    }

    /// Charges cycles.
    pub fn charge(&mut self, cycles: u64) {
        self.consumed = self.consumed.saturating_add(cycles);
    }

    /// Cycles charged so far.
    #[must_use]
    pub const fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Cycles left before the budget is reached.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.consumed)
    }

    /// Returns `true` once the budget is reached or passed.
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.consumed >= self.budget
    }
}

/// Number of whole core cycles elapsed at `time_ns` for a core clocked at
/// `clock_hz` that needs `clocks_per_cycle` input clocks per cycle.
///
/// Computed from absolute time so repeated slicing never accumulates
/// rounding drift.
#[must_use]
pub fn cycles_at(time_ns: u64, clock_hz: u64, clocks_per_cycle: u32) -> u64 {
    let clocks = u128::from(time_ns) * u128::from(clock_hz);
    let per_cycle = u128::from(NANOS_PER_SECOND) * u128::from(clocks_per_cycle.max(1));
    u64::try_from(clocks / per_cycle).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{cycles_at, CycleCounter};

    #[test]
    fn counter_allows_one_instruction_of_overshoot() {
        let mut counter = CycleCounter::new(10);
        counter.charge(8);
        assert!(!counter.exhausted());
        assert_eq!(counter.remaining(), 2);
        counter.charge(4);
        assert!(counter.exhausted());
        assert_eq!(counter.consumed(), 12);
        assert_eq!(counter.remaining(), 0);
    }

    #[test]
    fn clock_conversion_uses_whole_cycles() {
        assert_eq!(cycles_at(1_000_000_000, 4_194_304, 1), 4_194_304);
        assert_eq!(cycles_at(1_000_000, 400_000, 4), 100);
        assert_eq!(cycles_at(1, 400_000, 4), 0);
    }

    #[test]
    fn slicing_does_not_drift() {
        let quanta: u64 = (1..=1000)
            .map(|n| cycles_at(n * 333, 4_194_304, 1) - cycles_at((n - 1) * 333, 4_194_304, 1))
            .sum();
        assert_eq!(quanta, cycles_at(333_000, 4_194_304, 1));
    }
}
