//! CSV output backend.
//!
//! | File                    | One row per                     |
//! |-------------------------|---------------------------------|
//! | `vehicle_snapshots.csv` | spawned vehicle and snapshot    |
//! | `tick_summaries.csv`    | tick                            |

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{OutputResult, TickSummaryRow, VehicleSnapshotRow};

pub const SNAPSHOT_FILE: &str = "vehicle_snapshots.csv";
pub const SUMMARY_FILE: &str = "tick_summaries.csv";

const SNAPSHOT_HEADER: [&str; 7] = ["tick", "vehicle_id", "state", "edge", "lane", "cell", "velocity"];
const SUMMARY_HEADER: [&str; 5] = ["tick", "spawned", "not_spawned", "despawned", "angry"];

pub struct CsvWriter {
    snapshots: Writer<File>,
    summaries: Writer<File>,
    finished:  bool,
}

impl CsvWriter {
    /// Create both files in `dir`, which must already exist.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        Ok(Self {
            snapshots: with_header(&dir.join(SNAPSHOT_FILE), &SNAPSHOT_HEADER)?,
            summaries: with_header(&dir.join(SUMMARY_FILE), &SUMMARY_HEADER)?,
            finished:  false,
        })
    }
}

fn with_header(path: &Path, header: &[&str]) -> OutputResult<Writer<File>> {
    let mut w = Writer::from_path(path)?;
    w.write_record(header)?;
    Ok(w)
}

impl OutputWriter for CsvWriter {
    fn write_snapshots(&mut self, rows: &[VehicleSnapshotRow]) -> OutputResult<()> {
        for row in rows {
            self.snapshots.write_record(&[
                row.tick.to_string(),
                row.vehicle_id.to_string(),
                row.state.to_string(),
                row.edge.to_string(),
                row.lane.to_string(),
                row.cell.to_string(),
                row.velocity.to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()> {
        self.summaries.write_record(&[
            row.tick.to_string(),
            row.spawned.to_string(),
            row.not_spawned.to_string(),
            row.despawned.to_string(),
            row.angry.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.snapshots.flush()?;
        self.summaries.flush()?;
        Ok(())
    }
}
