//! `SimOutputObserver<W>` bridges `SimObserver` to an `OutputWriter`.

use ts_core::Tick;
use ts_graph::Graph;
use ts_sim::{SimObserver, TickSummary};
use ts_vehicle::{Vehicle, VehicleState};

use crate::row::{TickSummaryRow, VehicleSnapshotRow};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`SimObserver`] that writes the positions of spawned vehicles and tick
/// summaries to any [`OutputWriter`].
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  After `sim.run()` returns, check for errors with
/// [`take_error`][Self::take_error].
pub struct SimOutputObserver<W: OutputWriter> {
    writer:     W,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> SimOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, last_error: None }
    }

    /// Take the stored write error (if any) after `sim.run()` returns.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the sim).
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Later errors are usually consequences of the first one.
    fn keep_first(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            self.last_error.get_or_insert(e);
        }
    }
}

impl<W: OutputWriter> SimObserver for SimOutputObserver<W> {
    fn on_tick_end(&mut self, summary: &TickSummary) {
        let result = self.writer.write_tick_summary(&TickSummaryRow::from(summary));
        self.keep_first(result);
    }

    fn on_snapshot(&mut self, tick: Tick, vehicles: &[Vehicle], _graph: &Graph) {
        let rows: Vec<VehicleSnapshotRow> = vehicles
            .iter()
            .filter(|v| v.state() == VehicleState::Spawned)
            .map(|v| VehicleSnapshotRow::of(tick, v))
            .collect();

        if !rows.is_empty() {
            let result = self.writer.write_snapshots(&rows);
            self.keep_first(result);
        }
    }

    fn on_sim_end(&mut self, _final_tick: Tick) {
        let result = self.writer.finish();
        self.keep_first(result);
    }
}
