//! crossroad — downtown grid demo for the traffic_sim framework.
//!
//! Drives a few hundred randomly routed vehicles through a 6 × 6 grid with a
//! priority avenue, writes trajectories and tick summaries as CSV, then
//! replays the same scenario on a thread pool and checks that both runs
//! produced identical trajectories.
//!
//! Usage: `crossroad [config.json]`.  Without an argument the constants
//! below are used; a JSON file may override any `SimConfig` field.

mod network;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use anyhow::{Result, bail};

use ts_core::{MultiThreadingConfig, Resettable, SimConfig, Tick, VehicleId};
use ts_graph::{Graph, LaneRef};
use ts_output::{CsvWriter, OutputWriter, SimOutputObserver};
use ts_sim::{
    MultiThreaded, ProgressListener, Scenario, ScenarioBuilder, SimBuilder, SimObserver,
    SingleThreaded, TickSummary,
};
use ts_vehicle::{Vehicle, VehicleState};

use network::build_grid;

// ── Constants ─────────────────────────────────────────────────────────────────

const GRID_SIZE:       usize = 6;
const VEHICLE_COUNT:   usize = 300;
const SEED:            u64   = 42;
const TOTAL_TICKS:     u64   = 1_500;
const MAX_SPAWN_DELAY: u32   = 200;
const DAWDLE_FACTOR:   f32   = 0.2;
const REPLAY_THREADS:  usize = 4;
const OUTPUT_DIR:      &str  = "output/crossroad";

// ── Observers ─────────────────────────────────────────────────────────────────

type Position = (VehicleId, VehicleState, Option<LaneRef>, u32, u32);

/// Records every vehicle's position at every snapshot and forwards all
/// callbacks to an optional output observer.
struct TrajectoryObserver<W: OutputWriter> {
    output:      Option<SimOutputObserver<W>>,
    trajectory:  Vec<(Tick, Vec<Position>)>,
    max_angry:   usize,
}

impl<W: OutputWriter> TrajectoryObserver<W> {
    fn new(output: Option<SimOutputObserver<W>>) -> Self {
        Self { output, trajectory: Vec::new(), max_angry: 0 }
    }
}

impl<W: OutputWriter> SimObserver for TrajectoryObserver<W> {
    fn on_tick_end(&mut self, summary: &TickSummary) {
        self.max_angry = self.max_angry.max(summary.angry);
        if let Some(out) = &mut self.output {
            out.on_tick_end(summary);
        }
    }

    fn on_snapshot(&mut self, tick: Tick, vehicles: &[Vehicle], graph: &Graph) {
        let positions = vehicles
            .iter()
            .map(|v| (v.id(), v.state(), v.lane(), v.cell(), v.velocity()))
            .collect();
        self.trajectory.push((tick, positions));
        if let Some(out) = &mut self.output {
            out.on_snapshot(tick, vehicles, graph);
        }
    }

    fn on_sim_end(&mut self, final_tick: Tick) {
        if let Some(out) = &mut self.output {
            out.on_sim_end(final_tick);
        }
    }
}

struct PrintProgress;

impl ProgressListener for PrintProgress {
    fn on_progress(&self, percent: u8) {
        if percent % 25 == 0 {
            println!("  routes: {percent:>3}%");
        }
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

fn load_config() -> Result<SimConfig> {
    let mut config = SimConfig {
        seed:              SEED,
        total_ticks:       TOTAL_TICKS,
        max_vehicle_count: VEHICLE_COUNT,
        ..SimConfig::default()
    };
    if let Some(path) = std::env::args().nth(1) {
        let reader = BufReader::new(File::open(&path)?);
        config = serde_json::from_reader(reader)?;
        println!("Loaded config from {path}");
    }
    config.validate()?;
    Ok(config)
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = load_config()?;
    println!("=== crossroad — traffic_sim cellular automaton ===");
    println!(
        "Vehicles: {}  |  Ticks: {}  |  Seed: {}",
        config.max_vehicle_count, config.total_ticks, config.seed
    );
    println!();

    // 1. Road network.
    let (graph, nodes) = build_grid(&config, GRID_SIZE);
    println!(
        "Grid {GRID_SIZE}×{GRID_SIZE}: {} crossings, {} directed streets",
        graph.node_count(),
        graph.edge_count()
    );
    log::debug!("corner crossings: {:?} {:?}", nodes.first(), nodes.last());

    // 2. Random scenario with routes.
    let mut scenario = Scenario::random(config.clone(), graph, MAX_SPAWN_DELAY);
    let t0 = Instant::now();
    ScenarioBuilder::default()
        .dawdle_factor(DAWDLE_FACTOR)
        .progress(PrintProgress)
        .prepare(&mut scenario)?;
    println!(
        "Prepared {} vehicles in {:.3} s",
        scenario.vehicles().len(),
        t0.elapsed().as_secs_f64()
    );
    println!();

    // 3. Single-threaded run with CSV output.
    std::fs::create_dir_all(OUTPUT_DIR)?;
    let writer = CsvWriter::new(Path::new(OUTPUT_DIR))?;
    let mut first = TrajectoryObserver::new(Some(SimOutputObserver::new(writer)));

    let mut sim = SimBuilder::new(scenario).executor(Box::new(SingleThreaded)).build()?;
    let t0 = Instant::now();
    sim.run(&mut first)?;
    let single_secs = t0.elapsed().as_secs_f64();
    if let Some(e) = first.output.as_mut().and_then(SimOutputObserver::take_error) {
        eprintln!("output error: {e}");
    }
    let single_end = sim.tick();
    let arrived = sim.container().count(VehicleState::Despawned);
    let travel: Vec<i64> = sim.vehicles().iter().map(|v| v.driver().travelling_time()).collect();

    // 4. Replay on a thread pool.
    let mut scenario = sim.into_scenario();
    scenario.reset();
    let pool = MultiThreaded::new(&MultiThreadingConfig {
        n_threads: REPLAY_THREADS,
        ..config.multi_threading
    })?;
    let mut second = TrajectoryObserver::<CsvWriter>::new(None);
    let mut sim = SimBuilder::new(scenario).executor(Box::new(pool)).build()?;
    let t0 = Instant::now();
    sim.run(&mut second)?;
    let multi_secs = t0.elapsed().as_secs_f64();

    // 5. Summary.
    println!("{:<16} {:>8} {:>10}", "Executor", "Ticks", "Seconds");
    println!("{}", "-".repeat(36));
    println!("{:<16} {:>8} {:>10.3}", "single", single_end.0, single_secs);
    println!("{:<16} {:>8} {:>10.3}", format!("{REPLAY_THREADS} threads"), sim.tick().0, multi_secs);
    println!();

    let total = travel.len().max(1) as f64;
    println!("Arrived:            {arrived} / {}", travel.len());
    println!("Mean travel time:   {:.1} ticks", travel.iter().sum::<i64>() as f64 / total);
    println!("Peak angry drivers: {}", first.max_angry);
    println!("CSV output:         {OUTPUT_DIR}/");

    if first.trajectory != second.trajectory {
        let diverged = first
            .trajectory
            .iter()
            .zip(&second.trajectory)
            .find(|(a, b)| a != b)
            .map(|(a, _)| a.0);
        bail!("single and multi-threaded runs diverged (first difference at {diverged:?})");
    }
    println!("Replay on {REPLAY_THREADS} threads matched all {} snapshots.", first.trajectory.len());
    Ok(())
}
