//! Deterministic replay fingerprint generator used by CI cross-host comparison.
//!
//! Runs one SM83 and one uPD553 under the scheduler for a fixed span and
//! hashes every exported state entry plus the cycle totals.

use cpu_core::{
    AddressMap, CpuCore, Scheduler, Sm83, Sm83Config, SpaceConfig, Ucom4, Ucom4Config,
    Ucom4Variant,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

const QUANTUM_NS: u64 = 100_000;
const SPAN_NS: u64 = 20_000_000;

fn sm83() -> Sm83 {
    // LD HL,$C000; loop: LD A,(HL); ADD A,$07; LD (HL+),A; RES 5,H; JR loop
    let program = [
        0x21, 0x00, 0xC0, 0x7E, 0xC6, 0x07, 0x22, 0xCB, 0xAC, 0x18, 0xF8,
    ];
    let mut map = AddressMap::new(SpaceConfig::new("program", 16, 8)).expect("map");
    map.map_rom(0x0000, &program).expect("rom");
    map.map_ram(0xC000, 0xDFFF).expect("wram");
    Sm83::new(Sm83Config::default(), Box::new(map)).expect("sm83")
}

fn ucom4() -> Ucom4 {
    // loop: INM; LI 3; XMI 0; JCP loop
    let variant = Ucom4Variant::Upd553;
    let layout = variant.layout();
    let mut rom = AddressMap::new(SpaceConfig::new("program", layout.prg_width, 8)).expect("rom");
    rom.map_rom(0, &[0x1D, 0x93, 0x3C, 0xC0]).expect("image");
    let mut ram = AddressMap::new(SpaceConfig::new("data", layout.data_width, 4)).expect("ram");
    ram.map_ram(0, u32::from(layout.data_mask())).expect("cells");
    let io = AddressMap::new(SpaceConfig::new("io", 4, 4))
        .expect("io")
        .with_unmapped_fill(0);
    Ucom4::new(
        Ucom4Config::new(variant),
        Box::new(rom),
        Box::new(ram),
        Box::new(io),
    )
    .expect("ucom4")
}

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn hash_core(hash: &mut u64, core: &dyn CpuCore) {
    hash_bytes(hash, core.name().as_bytes());
    for entry in core.state_entries() {
        let value = core.state_get(entry.index).unwrap_or_default();
        hash_bytes(hash, &entry.index.0.to_le_bytes());
        hash_bytes(hash, &value.to_le_bytes());
    }
    hash_bytes(hash, &core.total_cycles().to_le_bytes());
    hash_bytes(hash, &core.diagnostics().instructions.to_le_bytes());
}

fn fingerprint() -> String {
    let mut scheduler = Scheduler::new(QUANTUM_NS).expect("scheduler");
    let ids = [
        scheduler.add_core(Box::new(sm83())),
        scheduler.add_core(Box::new(ucom4())),
    ];
    scheduler.run_for(SPAN_NS);

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &scheduler.now_ns().to_le_bytes());
    for id in ids {
        match scheduler.core(id) {
            Some(core) => hash_core(&mut hash, core),
            None => hash_bytes(&mut hash, &[0xFF]),
        }
        if let Some(fault) = scheduler.fault(id) {
            hash_bytes(&mut hash, fault.to_string().as_bytes());
        }
    }

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
