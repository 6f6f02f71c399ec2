use log::trace;
use std::fmt::Debug;

/// Trait for types that can be simulated by [`Simulator`].
pub trait Simulatable: Debug {
    /// Advance the simulation one tick. This operation should be deterministic.
    ///
    /// The `tick` operation is deterministic if the state after calling `tick` only depends on the
    /// state before calling `tick`.
    fn tick(&mut self);
}

/// How a [`Simulator::run_until`] call ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RunOutcome {
    /// The predicate held after the tick with this number, counted since the simulator was
    /// created.
    Stopped(u64),
    /// The tick limit was reached without the predicate holding.
    LimitReached,
}

/// Drives a [`Simulatable`] forward and keeps count of the ticks.
#[derive(Debug)]
pub struct Simulator<S: Simulatable> {
    simulatable: S,
    ticks: u64,
}

impl<S: Simulatable> Simulator<S> {
    pub fn new(simulatable: S) -> Self {
        Self {
            simulatable,
            ticks: 0,
        }
    }

    /// Returns the number of ticks simulated so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Provides read-only access to the simulated object.
    pub fn inspect(&self) -> &S {
        &self.simulatable
    }

    /// Provides mutable access to the simulated object, e.g. to drive its inputs between ticks.
    pub fn inspect_mut(&mut self) -> &mut S {
        &mut self.simulatable
    }

    pub fn into_inner(self) -> S {
        self.simulatable
    }

    /// Advances the simulation one tick.
    pub fn step(&mut self) {
        trace!("Stepping simulator once");
        self.simulatable.tick();
        self.ticks += 1;
    }

    /// Advances the simulation `n` ticks.
    pub fn step_n(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Ticks until `predicate` holds after a tick, for at most `max_ticks` ticks.
    ///
    /// The predicate is only checked after each tick, never before the first one.
    pub fn run_until(
        &mut self,
        max_ticks: u64,
        mut predicate: impl FnMut(&S) -> bool,
    ) -> RunOutcome {
        for _ in 0..max_ticks {
            self.step();
            if predicate(&self.simulatable) {
                return RunOutcome::Stopped(self.ticks);
            }
        }
        RunOutcome::LimitReached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter(u32);

    impl Simulatable for Counter {
        fn tick(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_step() {
        let mut simulator = Simulator::new(Counter::default());
        simulator.step();
        simulator.step_n(4);
        assert_eq!(5, simulator.tick_count());
        assert_eq!(5, simulator.inspect().0);
    }

    #[test]
    fn test_run_until() {
        let mut simulator = Simulator::new(Counter::default());
        assert_eq!(
            RunOutcome::Stopped(3),
            simulator.run_until(10, |counter| counter.0 == 3)
        );
        assert_eq!(
            RunOutcome::LimitReached,
            simulator.run_until(10, |counter| counter.0 == 3)
        );
        assert_eq!(13, simulator.into_inner().0);
    }
}
