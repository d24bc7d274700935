use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

use super::error::ProfileError;
use super::profile::{check_range, Goal, WEIGHT_RANGE_KG};
use super::store::write_atomic;

/// How far back the weight trend reaches.
pub const TREND_WEEKS: i64 = 8;

/// Default goal weight when the user has not set one: about a 7% cut for
/// weight loss, a 5% gain for weight gain.
pub fn default_target_weight(goal: Goal, start_kg: f64) -> f64 {
    match goal {
        Goal::Lose => (start_kg * 0.93).max(WEIGHT_RANGE_KG.0),
        Goal::Gain => (start_kg * 1.05).min(WEIGHT_RANGE_KG.1),
        Goal::Maintain => start_kg,
    }
}

/// Fraction (0.0..=1.0) of the way from `start_kg` to `target_kg`.
///
/// When maintaining, anything within 1 kg of the start counts as done and
/// the score falls off linearly to zero at 5 kg away.
pub fn progress_percent(start_kg: f64, current_kg: f64, target_kg: f64) -> f64 {
    if target_kg == start_kg {
        let delta = (current_kg - start_kg).abs();
        if delta <= 1.0 {
            return 1.0;
        }
        return (1.0 - (delta - 1.0) / 4.0).max(0.0);
    }

    let total = (target_kg - start_kg).abs();
    let done = total - (target_kg - current_kg).abs();
    (done / total).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub date: NaiveDate,
    pub weight_kg: f64,
}

/// Logged weigh-ins, at most one per date, sorted by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightLog {
    #[serde(default)]
    entries: Vec<WeightEntry>,
    /// Overrides the first logged weight as the starting point.
    #[serde(default)]
    pub start_weight_kg: Option<f64>,
    /// Overrides the goal-based default target.
    #[serde(default)]
    pub target_weight_kg: Option<f64>,
}

impl WeightLog {
    /// Read the log at `path`. A missing file is an empty log.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let mut log: WeightLog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        // hand-edited files may be out of order or repeat a date
        let entries = std::mem::take(&mut log.entries);
        for entry in entries {
            log.insert(entry);
        }
        Ok(log)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str =
            serde_json::to_string_pretty(self).context("Failed to serialize weight log")?;
        write_atomic(path, json_str.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    /// Log a weigh-in. A second weight for the same date replaces the first.
    pub fn record(&mut self, date: NaiveDate, weight_kg: f64) -> Result<(), ProfileError> {
        check_range("weight_kg", weight_kg, WEIGHT_RANGE_KG)?;
        self.insert(WeightEntry { date, weight_kg });
        Ok(())
    }

    fn insert(&mut self, entry: WeightEntry) {
        self.entries.retain(|e| e.date != entry.date);
        let at = self.entries.partition_point(|e| e.date < entry.date);
        self.entries.insert(at, entry);
    }

    pub fn set_start(&mut self, weight_kg: f64) -> Result<(), ProfileError> {
        check_range("start_weight_kg", weight_kg, WEIGHT_RANGE_KG)?;
        self.start_weight_kg = Some(weight_kg);
        Ok(())
    }

    pub fn set_target(&mut self, weight_kg: f64) -> Result<(), ProfileError> {
        check_range("target_weight_kg", weight_kg, WEIGHT_RANGE_KG)?;
        self.target_weight_kg = Some(weight_kg);
        Ok(())
    }

    /// The explicit start weight, else the first logged one.
    pub fn start_weight(&self) -> Option<f64> {
        self.start_weight_kg
            .or_else(|| self.entries.first().map(|e| e.weight_kg))
    }

    /// The most recently dated weigh-in.
    pub fn current_weight(&self) -> Option<f64> {
        self.entries.last().map(|e| e.weight_kg)
    }

    pub fn target_weight(&self, goal: Goal) -> Option<f64> {
        self.target_weight_kg
            .or_else(|| self.start_weight().map(|start| default_target_weight(goal, start)))
    }

    pub fn progress(&self, goal: Goal) -> Option<f64> {
        Some(progress_percent(
            self.start_weight()?,
            self.current_weight()?,
            self.target_weight(goal)?,
        ))
    }

    /// Entries from the last [`TREND_WEEKS`] weeks up to `today`.
    pub fn trend(&self, today: NaiveDate) -> &[WeightEntry] {
        let cutoff = today - Duration::weeks(TREND_WEEKS);
        let from = self.entries.partition_point(|e| e.date < cutoff);
        &self.entries[from..]
    }
}
