use super::{RoadGraph, RoadRow, LOG_TARGET};
use crate::error::{Result, TrafficError};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Parses a road source: a header row followed by `segmentId, x1, y1, x2, y2`
/// rows. Malformed rows are logged and skipped; a read failure aborts.
pub fn read_road_rows<R: Read>(reader: R) -> Result<Vec<RoadRow>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in csv.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                log::error!(target: LOG_TARGET, "Road source became unreadable at row {}: {}",
                            line + 2, e);
                return Err(TrafficError::Csv(e));
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping unreadable road row {}: {}", line + 2, e);
                continue;
            }
        };
        match parse_road_row(&record) {
            Some(row) => rows.push(row),
            None => log::warn!(target: LOG_TARGET, "Skipping malformed road row {}: {:?}",
                               line + 2, record.as_slice()),
        }
    }
    Ok(rows)
}

fn parse_road_row(record: &StringRecord) -> Option<RoadRow> {
    let field = |i: usize| record.get(i).and_then(|f| f.parse::<i32>().ok());
    let segment_id = record.get(0)?.parse().ok()?;
    Some(RoadRow::new(segment_id, field(1)?, field(2)?, field(3)?, field(4)?))
}

impl RoadGraph {
    pub fn load_from_reader<R: Read>(&mut self, reader: R) -> Result<usize> {
        let rows = read_road_rows(reader)?;
        self.load_from_rows(rows)
    }

    pub fn load_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            log::error!(target: LOG_TARGET, "Could not open road source {}: {}", path.display(), e);
            TrafficError::Io(e)
        })?;
        self.load_from_reader(file).map_err(|e| match e {
            TrafficError::EmptySource(_) => TrafficError::EmptySource(path.display().to_string()),
            other => other,
        })
    }
}
