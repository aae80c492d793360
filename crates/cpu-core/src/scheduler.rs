//! Round-robin time slicing over several cores.
//!
//! Global time advances in fixed quanta. For each quantum every core runs, in
//! registration order, until its local time catches up with the global time.
//! Overshoot is carried because targets are computed from absolute time.

use tracing::{debug, warn};

use crate::timing::cycles_at;
use crate::{ConfigError, CpuCore, Fault};

/// Handle returned by [`Scheduler::add_core`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreId(usize);

impl CoreId {
    /// Registration order of the core.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

struct Slot {
    core: Box<dyn CpuCore>,
    executed: u64,
    fault: Option<Fault>,
}

/// Deterministic single-threaded multi-core scheduler.
pub struct Scheduler {
    slots: Vec<Slot>,
    quantum_ns: u64,
    now_ns: u64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("cores", &self.slots.len())
            .field("quantum_ns", &self.quantum_ns)
            .field("now_ns", &self.now_ns)
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler slicing time into `quantum_ns` nanosecond quanta.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for a zero quantum.
    pub fn new(quantum_ns: u64) -> Result<Self, ConfigError> {
        if quantum_ns == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "quantum_ns",
                reason: "quantum must be non-zero".to_owned(),
            });
        }
        Ok(Self {
            slots: Vec::new(),
            quantum_ns,
            now_ns: 0,
        })
    }

    /// Registers a core. It joins at the current global time.
    pub fn add_core(&mut self, core: Box<dyn CpuCore>) -> CoreId {
        let executed = cycles_at(self.now_ns, core.clock_hz(), core.clocks_per_cycle());
        self.slots.push(Slot {
            core,
            executed,
            fault: None,
        });
        CoreId(self.slots.len() - 1)
    }

    /// Global time in nanoseconds.
    #[must_use]
    pub const fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Number of registered cores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when no core is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrows a core.
    #[must_use]
    pub fn core(&self, id: CoreId) -> Option<&dyn CpuCore> {
        self.slots.get(id.0).map(|slot| slot.core.as_ref())
    }

    /// Mutably borrows a core, e.g. to raise a line between quanta.
    pub fn core_mut(&mut self, id: CoreId) -> Option<&mut (dyn CpuCore + 'static)> {
        self.slots.get_mut(id.0).map(|slot| slot.core.as_mut())
    }

    /// Fault that parked a core, if any.
    #[must_use]
    pub fn fault(&self, id: CoreId) -> Option<Fault> {
        self.slots.get(id.0).and_then(|slot| slot.fault)
    }

    /// Resets a core and puts it back into rotation at the current global
    /// time. Time spent parked is not replayed.
    pub fn reset_core(&mut self, id: CoreId) {
        let now_ns = self.now_ns;
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.core.reset();
            slot.fault = None;
            slot.executed = cycles_at(now_ns, slot.core.clock_hz(), slot.core.clocks_per_cycle());
        }
    }

    /// Advances global time by one quantum.
    pub fn run_quantum(&mut self) {
        self.now_ns = self.now_ns.saturating_add(self.quantum_ns);
        let now_ns = self.now_ns;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.fault.is_some() {
                continue;
            }
            let target = cycles_at(now_ns, slot.core.clock_hz(), slot.core.clocks_per_cycle());
            if target <= slot.executed {
                continue;
            }
            let before = slot.core.total_cycles();
            let result = slot.core.execute_run(target - slot.executed);
            slot.executed += slot.core.total_cycles() - before;
            match result {
                Ok(outcome) => debug!(
                    core = slot.core.name(),
                    index,
                    cycles = outcome.cycles,
                    instructions = outcome.instructions,
                    "slice complete"
                ),
                Err(fault) => {
                    warn!(core = slot.core.name(), index, %fault, "core faulted, parking it");
                    slot.fault = Some(fault);
                }
            }
        }
    }

    /// Runs whole quanta until at least `duration_ns` has elapsed.
    pub fn run_for(&mut self, duration_ns: u64) {
        let end = self.now_ns.saturating_add(duration_ns);
        while self.now_ns < end {
            self.run_quantum();
        }
    }

    /// Cycles a core has consumed while scheduled.
    #[must_use]
    pub fn executed_cycles(&self, id: CoreId) -> Option<u64> {
        self.slots.get(id.0).map(|slot| slot.executed)
    }
}

#[cfg(test)]
mod tests {
    use super::Scheduler;
    use crate::{
        AddressMap, ConfigError, CpuCore, Fault, Sm83, Sm83Config, SpaceConfig, Ucom4,
        Ucom4Config, Ucom4Variant,
    };

    fn sm83(program: &[u8]) -> Box<dyn CpuCore> {
        let mut map = AddressMap::new(SpaceConfig::new("program", 16, 8)).expect("map");
        map.map_ram(0x0000, 0xFFFE).expect("ram");
        map.load(0x0000, program);
        Box::new(Sm83::new(Sm83Config::default(), Box::new(map)).expect("sm83"))
    }

    fn upd553() -> Box<dyn CpuCore> {
        let mut rom = AddressMap::new(SpaceConfig::new("program", 11, 8)).expect("rom");
        rom.map_rom(0, &[0x00; 0x100]).expect("image");
        let mut ram = AddressMap::new(SpaceConfig::new("data", 7, 4)).expect("ram");
        ram.map_ram(0, 0x7F).expect("cells");
        let io = AddressMap::new(SpaceConfig::new("io", 4, 4)).expect("io");
        Box::new(
            Ucom4::new(
                Ucom4Config::new(Ucom4Variant::Upd553),
                Box::new(rom),
                Box::new(ram),
                Box::new(io),
            )
            .expect("upd553"),
        )
    }

    #[test]
    fn zero_quantum_is_rejected() {
        assert!(matches!(
            Scheduler::new(0),
            Err(ConfigError::InvalidParameter {
                parameter: "quantum_ns",
                ..
            })
        ));
    }

    #[test]
    fn cores_track_their_own_clocks() {
        let mut scheduler = Scheduler::new(1_000_000).expect("scheduler");
        // JR -2
        let fast = scheduler.add_core(sm83(&[0x18, 0xFE]));
        let slow = scheduler.add_core(upd553());
        scheduler.run_quantum();
        let fast_cycles = scheduler.executed_cycles(fast).expect("fast");
        assert!((4194..4194 + 12).contains(&fast_cycles));
        assert_eq!(scheduler.executed_cycles(slow), Some(100));

        scheduler.run_for(2_000_000);
        assert_eq!(scheduler.now_ns(), 3_000_000);
        let fast_cycles = scheduler.executed_cycles(fast).expect("fast");
        assert!((12_582..12_582 + 12).contains(&fast_cycles));
        assert_eq!(scheduler.executed_cycles(slow), Some(300));
    }

    #[test]
    fn faulted_core_is_parked_until_reset() {
        let mut scheduler = Scheduler::new(1_000_000).expect("scheduler");
        let broken = scheduler.add_core(sm83(&[0xD3]));
        let healthy = scheduler.add_core(upd553());
        scheduler.run_quantum();
        assert_eq!(
            scheduler.fault(broken),
            Some(Fault::IllegalOpcode { pc: 0, opcode: 0xD3 })
        );
        let parked_at = scheduler.executed_cycles(broken);
        scheduler.run_quantum();
        assert_eq!(scheduler.executed_cycles(broken), parked_at);
        assert_eq!(scheduler.executed_cycles(healthy), Some(200));

        scheduler.reset_core(broken);
        assert_eq!(scheduler.fault(broken), None);
        assert_eq!(scheduler.len(), 2);
    }
}
