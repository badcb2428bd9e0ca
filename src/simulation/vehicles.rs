use super::{Vehicle, LOG_TARGET};
use crate::error::{Result, TrafficError};
use crate::network::Vec2;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Parses a vehicle source: a header row followed by
/// `id, segmentId, position, velocityX, velocityY[, type]` rows.
/// Rows with an unparsable required field are skipped; a read failure aborts.
pub fn read_vehicles<R: Read>(reader: R) -> Result<Vec<Vehicle>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut vehicles = Vec::new();
    for (line, record) in csv.records().enumerate() {
        let record = match record {
            Err(e) if e.is_io_error() => {
                log::error!(target: LOG_TARGET, "Vehicle source became unreadable at row {}: {}",
                            line + 2, e);
                return Err(TrafficError::Csv(e));
            }
            record => record.ok(),
        };
        match record.as_ref().and_then(parse_vehicle) {
            Some(vehicle) => vehicles.push(vehicle),
            None => log::warn!(target: LOG_TARGET, "Skipping malformed vehicle row {}", line + 2),
        }
    }
    Ok(vehicles)
}

fn parse_vehicle(record: &StringRecord) -> Option<Vehicle> {
    let id = record.get(0)?.parse().ok()?;
    let segment_id = record.get(1)?.parse().ok()?;
    let position = record.get(2)?.parse().ok()?;
    let vx = record.get(3)?.parse().ok()?;
    let vy = record.get(4)?.parse().ok()?;

    let vehicle = Vehicle::new(id, segment_id, position, Vec2::new(vx, vy));
    Some(match record.get(5).filter(|kind| !kind.is_empty()) {
        Some(kind) => vehicle.with_kind(kind),
        None => vehicle,
    })
}

pub fn load_vehicles_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Vehicle>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        log::error!(target: LOG_TARGET, "Could not open vehicle source {}: {}", path.display(), e);
        TrafficError::Io(e)
    })?;
    read_vehicles(file)
}
