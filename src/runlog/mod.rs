//! Durable per-run audit files.
//!
//! Each run writes one CSV under the log directory, named by timestamp
//! and trade count. Rows cover closed positions and sized adjustments.

use crate::broker::OrderSide;
use crate::rebalance::{Adjustment, ClosedPosition};
use chrono::Utc;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

const HEADER: &str = "symbol,raw_allocation,current_allocation,adjusted_allocation,side";

/// Writes one audit file per run.
pub struct RunLogger {
    dir: PathBuf,
}

impl RunLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the run's record and return its path.
    ///
    /// The log directory is created if absent. Runs landing in the same
    /// second get a numeric suffix so file names never collide.
    pub fn write(
        &self,
        closed: &[ClosedPosition],
        adjustments: &[Adjustment],
    ) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let base = format!("run-{stamp}-{}t", adjustments.len());
        let path = self.unique_path(&base);

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{HEADER}")?;
        for position in closed {
            writeln!(
                writer,
                "{},0.00,{:.2},0.00,{}",
                position.symbol, position.market_value, OrderSide::Sell
            )?;
        }
        for adjustment in adjustments {
            writeln!(
                writer,
                "{},{:.2},{:.2},{:.2},{}",
                adjustment.symbol,
                adjustment.raw_allocation,
                adjustment.current_value,
                adjustment.amount,
                adjustment.side
            )?;
        }
        writer.flush()?;

        info!(path = %path.display(), "run log written");
        Ok(path)
    }

    fn unique_path(&self, base: &str) -> PathBuf {
        let candidate = self.dir.join(format!("{base}.csv"));
        if !candidate.exists() {
            return candidate;
        }
        let mut n = 1;
        loop {
            let candidate = self.dir.join(format!("{base}-{n}.csv"));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}
