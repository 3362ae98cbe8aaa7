//! 边界线配置存储 (Line configuration store)
//!
//! 内存中保存线1/线2; 两条线都定义后才写盘。
//! 文件格式: `{"line_one": [[x,y],[x,y]] | null, "line_two": ...}`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::geometry::{BoundaryLine, LinePair, LineRole};
use crate::error::{CounterError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LineFile {
    #[serde(default)]
    line_one: Option<BoundaryLine>,
    #[serde(default)]
    line_two: Option<BoundaryLine>,
}

/// 线是否已定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineStatus {
    pub line_one_drawn: bool,
    pub line_two_drawn: bool,
}

#[derive(Debug)]
pub struct LineStore {
    path: PathBuf,
    lines: LinePair,
}

impl LineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: LinePair::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 启动时恢复; 文件缺失或损坏都视为"未配置",只记日志
    pub fn load(&mut self) -> bool {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📏 no saved lines at {}", self.path.display());
                return false;
            }
            Err(e) => {
                warn!("❌ Error loading lines from {}: {}", self.path.display(), e);
                return false;
            }
        };

        match serde_json::from_str::<LineFile>(&json) {
            Ok(file) => {
                self.lines = LinePair {
                    a: file.line_one,
                    b: file.line_two,
                };
                info!(
                    "✅ Lines loaded - Line 1: {:?}, Line 2: {:?}",
                    self.lines.a.map(|l| l.points()),
                    self.lines.b.map(|l| l.points())
                );
                true
            }
            Err(e) => {
                warn!("❌ Error loading lines: {}, starting with no lines", e);
                self.lines = LinePair::default();
                false
            }
        }
    }

    /// 提交一条完整的线; 两条线都存在时写盘,返回是否已写盘
    pub fn set_line(&mut self, role: LineRole, line: BoundaryLine) -> Result<bool> {
        match role {
            LineRole::A => self.lines.a = Some(line),
            LineRole::B => self.lines.b = Some(line),
        }

        if self.lines.both_defined() {
            self.persist()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// 写临时文件再 rename,保证文件内容总是完整的
    pub fn persist(&self) -> Result<()> {
        let file = LineFile {
            line_one: self.lines.a,
            line_two: self.lines.b,
        };
        let json = serde_json::to_string(&file).map_err(CounterError::persist)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(CounterError::persist)?;
        fs::rename(&tmp, &self.path).map_err(CounterError::persist)?;

        info!("✅ Lines saved to {}", self.path.display());
        Ok(())
    }

    /// 清除内存和磁盘上的线; 重复调用不报错
    pub fn clear(&mut self) -> Result<()> {
        self.lines = LinePair::default();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("✅ Lines deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CounterError::persist(e)),
        }
    }

    pub fn get(&self) -> LinePair {
        self.lines
    }

    pub fn status(&self) -> LineStatus {
        LineStatus {
            line_one_drawn: self.lines.a.is_some(),
            line_two_drawn: self.lines.b.is_some(),
        }
    }
}
