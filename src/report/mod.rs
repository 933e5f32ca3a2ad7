//! Cycle snapshot sinks.
//!
//! Every completed cycle produces one [`CycleSnapshot`]; sinks decide where
//! it goes. The JSON file sink feeds dashboards the way the original
//! `status.json` did, the log sink narrates the cycle for operators.

use crate::engine::{CycleSnapshot, PlannedAction};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Destination for per-cycle snapshots.
pub trait SnapshotSink {
    fn emit(&self, snapshot: &CycleSnapshot) -> Result<()>;
}

/// Writes each snapshot as pretty-printed JSON, replacing the previous one.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSink for JsonFileSink {
    fn emit(&self, snapshot: &CycleSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize cycle snapshot")?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write snapshot to {:?}", self.path))?;

        debug!(path = ?self.path, "Cycle snapshot written");
        Ok(())
    }
}

/// Narrates the snapshot through tracing.
pub struct LogSink;

impl SnapshotSink for LogSink {
    fn emit(&self, snapshot: &CycleSnapshot) -> Result<()> {
        info!(
            total_value = %snapshot.total_value,
            pairs = snapshot.pairs.len(),
            simulate = snapshot.simulate,
            "Cycle complete"
        );

        for pair in &snapshot.pairs {
            let plan = match pair.action {
                PlannedAction::Hold => "hold".to_string(),
                PlannedAction::RotateToB => format!("rotate {} -> {}", pair.coin_a, pair.coin_b),
                PlannedAction::RotateToA => format!("rotate {} -> {}", pair.coin_b, pair.coin_a),
            };
            info!(
                pair = %pair.name,
                ratio = %pair.ratio,
                holding = %pair.current_asset,
                %plan,
                "Pair status"
            );
        }

        Ok(())
    }
}
