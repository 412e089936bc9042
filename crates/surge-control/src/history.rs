// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Operating History
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Append-only operating-point log with a running summary.
//! Optionally bounded: once full the oldest record is dropped, the
//! summary keeps counting.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use surge_types::error::{SurgeError, SurgeResult};
use surge_types::state::MachineState;

/// CSV column order.
pub const CSV_HEADER: &str = "time,flow,head,speed,power,efficiency,surge_margin,stonewall_margin,state,inlet_pressure,outlet_pressure,inlet_temperature,outlet_temperature";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingRecord {
    pub time: f64,
    pub flow: f64,
    pub head: f64,
    pub speed: f64,
    pub power: f64,
    pub efficiency: f64,
    pub surge_margin: f64,
    pub stonewall_margin: f64,
    pub state: MachineState,
    pub inlet_pressure: f64,
    pub outlet_pressure: f64,
    pub inlet_temperature: f64,
    pub outlet_temperature: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub samples: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub peak_flow: f64,
    pub peak_head: f64,
    pub peak_speed: f64,
    pub peak_power: f64,
    pub min_surge_margin: Option<f64>,
    pub min_stonewall_margin: Option<f64>,
    /// Entries into surge while operational.
    pub surge_events: u32,
    /// Operational seconds spent with a negative surge margin.
    pub time_in_surge: f64,
    /// Seconds spent in an operational state.
    pub operating_time: f64,
}

/// Negative surge margin while the machine is under load. Margins taken
/// at standstill or during sequences do not count as surge.
pub fn is_surging(state: MachineState, surge_margin: f64) -> bool {
    surge_margin < 0.0 && state.is_operational()
}

fn min_opt(current: Option<f64>, value: f64) -> Option<f64> {
    Some(current.map_or(value, |c| c.min(value)))
}

#[derive(Debug, Clone, Default)]
pub struct OperatingHistoryRecorder {
    records: VecDeque<OperatingRecord>,
    max_records: Option<usize>,
    summary: HistorySummary,
    last: Option<OperatingRecord>,
}

impl OperatingHistoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_records` records in memory.
    pub fn with_max_records(max_records: usize) -> SurgeResult<Self> {
        if max_records == 0 {
            return Err(SurgeError::ConfigError(
                "history capacity must be >= 1".to_string(),
            ));
        }
        Ok(OperatingHistoryRecorder {
            max_records: Some(max_records),
            ..Self::default()
        })
    }

    pub fn record(&mut self, record: OperatingRecord) -> SurgeResult<()> {
        if !record.time.is_finite() {
            return Err(SurgeError::Precondition(format!(
                "record time must be finite, got {}",
                record.time
            )));
        }
        let s = &mut self.summary;
        match &self.last {
            Some(prev) => {
                if record.time < prev.time {
                    return Err(SurgeError::Precondition(format!(
                        "record time {} precedes last record at {}",
                        record.time, prev.time
                    )));
                }
                let dt = record.time - prev.time;
                let prev_surging = is_surging(prev.state, prev.surge_margin);
                if prev_surging {
                    s.time_in_surge += dt;
                }
                if prev.state.is_operational() {
                    s.operating_time += dt;
                }
                if is_surging(record.state, record.surge_margin) && !prev_surging {
                    s.surge_events += 1;
                }
                s.peak_flow = s.peak_flow.max(record.flow);
                s.peak_head = s.peak_head.max(record.head);
                s.peak_speed = s.peak_speed.max(record.speed);
                s.peak_power = s.peak_power.max(record.power);
            }
            None => {
                s.start_time = record.time;
                if is_surging(record.state, record.surge_margin) {
                    s.surge_events = 1;
                }
                s.peak_flow = record.flow;
                s.peak_head = record.head;
                s.peak_speed = record.speed;
                s.peak_power = record.power;
            }
        }
        s.samples += 1;
        s.end_time = record.time;
        s.min_surge_margin = min_opt(s.min_surge_margin, record.surge_margin);
        s.min_stonewall_margin = min_opt(s.min_stonewall_margin, record.stonewall_margin);

        if let Some(cap) = self.max_records {
            while self.records.len() >= cap {
                self.records.pop_front();
            }
        }
        self.last = Some(record.clone());
        self.records.push_back(record);
        Ok(())
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &OperatingRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&OperatingRecord> {
        self.records.back()
    }

    pub fn summary(&self) -> &HistorySummary {
        &self.summary
    }

    /// Write retained records as CSV with [`CSV_HEADER`].
    pub fn write_csv<W: Write>(&self, mut out: W) -> SurgeResult<()> {
        writeln!(out, "{CSV_HEADER}")?;
        for r in &self.records {
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{},{},{},{}",
                r.time,
                r.flow,
                r.head,
                r.speed,
                r.power,
                r.efficiency,
                r.surge_margin,
                r.stonewall_margin,
                r.state,
                r.inlet_pressure,
                r.outlet_pressure,
                r.inlet_temperature,
                r.outlet_temperature
            )?;
        }
        out.flush()?;
        Ok(())
    }

    /// Retained records as a JSON array.
    pub fn to_json(&self) -> SurgeResult<String> {
        Ok(serde_json::to_string(&self.records)?)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.summary = HistorySummary::default();
        self.last = None;
    }
}
