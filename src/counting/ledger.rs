//! 结算台账 (Finalized-entity ledger)
//!
//! 只追加的 CSV 文件,每次结算写一行; 本系统从不修改或删除已有行。

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::registry::FinishedDot;
use crate::error::{CounterError, Result};

pub const LEDGER_HEADER: [&str; 6] = [
    "Timestamp",
    "Number Plate",
    "Mode",
    "IN Count",
    "OUT Count",
    "Total Count",
];

/// 结算输出端
pub trait CountSink: Send {
    fn record(&mut self, dot: &FinishedDot) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    timestamp: String,
    numberplate: &'a str,
    mode: &'a str,
    in_count: u64,
    out_count: u64,
    total: u64,
}

#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在时创建并写表头,返回是否新建
    pub fn initialize(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        let file = File::create(&self.path).map_err(CounterError::persist)?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(LEDGER_HEADER)
            .map_err(CounterError::persist)?;
        writer.flush().map_err(CounterError::persist)?;
        info!("✅ CSV file created: {}", self.path.display());
        Ok(true)
    }
}

impl CountSink for CsvLedger {
    fn record(&mut self, dot: &FinishedDot) -> Result<()> {
        // 运行期间文件被删除时重建表头
        if self.initialize()? {
            warn!("⚠️ ledger {} was missing, recreated", self.path.display());
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(CounterError::persist)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .serialize(LedgerRow {
                timestamp: crate::gen_time_string(),
                numberplate: &dot.numberplate,
                mode: dot.mode.as_str(),
                in_count: dot.in_count,
                out_count: dot.out_count,
                total: dot.total(),
            })
            .map_err(CounterError::persist)?;
        writer.flush().map_err(CounterError::persist)?;

        info!(
            "✅ Saved: {} | Mode: {} | IN: {} | OUT: {}",
            dot.numberplate, dot.mode, dot.in_count, dot.out_count
        );
        Ok(())
    }
}
