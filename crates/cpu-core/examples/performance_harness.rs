//! Performance harness for cpu-core benchmarking.
//!
//! Measures instruction throughput of each core through `execute_run`, the
//! same entry point the scheduler uses.
//!
//! ## Usage
//!
//! ```sh
//! cargo run -p cpu-core --release --example performance_harness
//! RUST_LOG=cpu_core=debug cargo run -p cpu-core --example performance_harness
//! ```
//!
//! ## Metrics
//!
//! - Instructions per second
//! - Emulated cycles per second
//! - Real-time factor (emulated cycles over the core's native cycle rate)
//!
//! Cores are not `Send`, so each worker thread builds its own.

#![allow(clippy::pedantic)]

use cpu_core::{
    AddressMap, CpuCore, Sm83, Sm83Config, SpaceConfig, Ucom4, Ucom4Config, Ucom4Variant,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const RUN_BUDGET_CYCLES: u64 = 70_224;
const NUM_THREADS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct BenchmarkResult {
    name: &'static str,
    instructions_per_second: f64,
    cycles_per_second: f64,
    realtime_factor: f64,
}

fn sm83_alu_loop() -> Box<dyn CpuCore> {
    // loop: INC A; ADD A,B; XOR C; RLCA; DEC D; JR loop
    let program = [0x3C, 0x80, 0xA9, 0x07, 0x15, 0x18, 0xF9];
    sm83_with(&program)
}

fn sm83_memory_loop() -> Box<dyn CpuCore> {
    // LD HL,$C000; loop: LD A,(HL); INC A; LD (HL+),A; RES 5,H; JR loop
    let program = [0x21, 0x00, 0xC0, 0x7E, 0x3C, 0x22, 0xCB, 0xAC, 0x18, 0xF9];
    sm83_with(&program)
}

fn sm83_with(program: &[u8]) -> Box<dyn CpuCore> {
    let mut map = AddressMap::new(SpaceConfig::new("program", 16, 8)).expect("map");
    map.map_rom(0x0000, program).expect("rom");
    map.map_ram(0xC000, 0xDFFF).expect("wram");
    Box::new(Sm83::new(Sm83Config::default(), Box::new(map)).expect("sm83"))
}

fn ucom4_ram_loop() -> Box<dyn CpuCore> {
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
    Box::new(
        Ucom4::new(
            Ucom4Config::new(variant),
            Box::new(rom),
            Box::new(ram),
            Box::new(io),
        )
        .expect("ucom4"),
    )
}

fn benchmark(
    name: &'static str,
    build: fn() -> Box<dyn CpuCore>,
    duration: Duration,
) -> BenchmarkResult {
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let tx = tx.clone();
            thread::spawn(move || {
                let mut core = build();
                let native_rate =
                    core.clock_hz() as f64 / f64::from(core.clocks_per_cycle());
                let mut total_instructions = 0u64;
                let mut total_cycles = 0u64;
                let start = Instant::now();

                while start.elapsed() < duration {
                    match core.execute_run(RUN_BUDGET_CYCLES) {
                        Ok(run) => {
                            total_instructions += run.instructions;
                            total_cycles += run.cycles;
                        }
                        Err(fault) => {
                            tracing::error!(%fault, core = core.name(), "benchmark core faulted");
                            break;
                        }
                    }
                }

                tx.send((total_instructions, total_cycles, native_rate)).ok();
            })
        })
        .collect();

    for h in handles {
        h.join().ok();
    }

    drop(tx);

    let mut total_instructions = 0u64;
    let mut total_cycles = 0u64;
    let mut native_rate = 1.0;
    for (inst, cyc, rate) in rx {
        total_instructions += inst;
        total_cycles += cyc;
        native_rate = rate;
    }

    let elapsed_secs = duration.as_secs_f64();
    let cycles_per_second = total_cycles as f64 / elapsed_secs;
    BenchmarkResult {
        name,
        instructions_per_second: total_instructions as f64 / elapsed_secs,
        cycles_per_second,
        realtime_factor: cycles_per_second / NUM_THREADS as f64 / native_rate,
    }
}

fn format_number(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{:.2}", n)
    }
}

fn print_results(results: &[BenchmarkResult]) {
    println!();
    println!("cpu-core performance harness ({NUM_THREADS} threads, {RUN_BUDGET_CYCLES} cycles/run)");
    println!(
        "{:14} {:>15} {:>15} {:>12}",
        "Benchmark", "Instr/sec", "Cycles/sec", "x realtime"
    );
    for result in results {
        println!(
            "{:14} {:>15} {:>15} {:>12.1}",
            result.name,
            format_number(result.instructions_per_second),
            format_number(result.cycles_per_second),
            result.realtime_factor
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let duration = Duration::from_secs(2);
    info!(?duration, threads = NUM_THREADS, "starting benchmarks");

    let results = [
        benchmark("sm83_alu", sm83_alu_loop, duration),
        benchmark("sm83_memory", sm83_memory_loop, duration),
        benchmark("upd553_ram", ucom4_ram_loop, duration),
    ];
    print_results(&results);
}
