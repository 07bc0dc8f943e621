//! Projected station demand, read from CSV.
//!
//! # CSV format
//!
//! One row per expected stock change at a station.
//!
//! ```csv
//! station,time,delta
//! gare,25300,-1
//! mairie,25900,1
//! ```
//!
//! `delta` is `-1` for a unit taken by a rider and `+1` for a unit returned.
//! Station names must match the names given to the builder.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use ms_core::Tick;

use crate::{SimError, SimResult};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DemandRecord {
    station: String,
    time:    u64,
    delta:   i64,
}

// ── DemandTable ───────────────────────────────────────────────────────────────

/// Time-sorted stock changes per station name.
#[derive(Clone, Debug, Default)]
pub struct DemandTable {
    by_station: HashMap<String, Vec<(Tick, i64)>>,
}

impl DemandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, station: impl Into<String>, time: Tick, delta: i64) {
        let rows = self.by_station.entry(station.into()).or_default();
        let at = rows.partition_point(|&(t, _)| t <= time);
        rows.insert(at, (time, delta));
    }

    /// Net stock change at `station` strictly between `after` and `before`.
    pub fn variation(&self, station: &str, after: Tick, before: Tick) -> i64 {
        self.by_station
            .get(station)
            .map(|rows| rows.iter().filter(|&&(t, _)| after < t && t < before).map(|&(_, d)| d).sum())
            .unwrap_or(0)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.by_station.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load a [`DemandTable`] from a CSV file.
pub fn load_demand_csv(path: &Path) -> SimResult<DemandTable> {
    let file = std::fs::File::open(path)?;
    load_demand_reader(file)
}

/// Like [`load_demand_csv`] but accepts any `Read` source.
pub fn load_demand_reader<R: Read>(reader: R) -> SimResult<DemandTable> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut table = DemandTable::new();
    for result in csv_reader.deserialize::<DemandRecord>() {
        let row = result.map_err(|e| SimError::Demand(e.to_string()))?;
        table.add(row.station, Tick(row.time), row.delta);
    }
    Ok(table)
}
