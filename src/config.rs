//! 服务配置 - 命令行参数 + JSON 配置文件

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 双线计数服务
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "RTSP 双线越线计数服务", long_about = None)]
pub struct Args {
    /// 配置文件路径 (不存在时写入默认配置)
    #[arg(short, long, default_value = "crossline.json")]
    pub config: PathBuf,

    /// HTTP 监听地址
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    pub bind: String,

    /// 日志过滤 (覆盖 RUST_LOG)
    #[arg(long)]
    pub log_filter: Option<String>,
}

/// 方向事件作用范围
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// 所有同模式计数点都 +1
    #[default]
    Broadcast,
    /// 仅锚点离越线位置最近的同模式计数点 +1
    Nearest,
}

/// 计数参数配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    // === 持久化 ===
    pub line_config_file: PathBuf, // 边界线 JSON
    pub ledger_file: PathBuf,      // 结算台账 CSV

    // === 检测过滤 ===
    pub class_filter: String, // 类别名子串 (不区分大小写)

    // === 轨迹 ===
    pub history_len: usize,    // 每个目标保留的点数
    pub track_ttl_frames: u64, // 未出现多少帧后淘汰
    pub max_tracks: usize,     // 目标数上限

    // === 视频流 ===
    pub detector_addr: String,        // 检测/跟踪 sidecar 地址
    pub connect_settle_ms: u64,       // 连接后等待
    pub read_timeout_ms: u64,         // 单次读帧超时
    pub max_reconnect_attempts: u32,  // 最大重连次数
    pub reconnect_delay_ms: u64,      // 重连间隔

    // === 计数 ===
    pub apply_mode: ApplyMode,

    // === 画面 ===
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            line_config_file: PathBuf::from("line_config.json"),
            ledger_file: PathBuf::from("truck_counts.csv"),

            class_filter: "package".to_string(),

            history_len: 30,
            track_ttl_frames: 300,
            max_tracks: 4096,

            detector_addr: "127.0.0.1:9100".to_string(),
            connect_settle_ms: 2000,
            read_timeout_ms: 500,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 5000,

            apply_mode: ApplyMode::Broadcast,

            frame_width: 1020,
            frame_height: 600,
        }
    }
}

impl CounterConfig {
    /// 从JSON文件加载配置; 缺失时写入默认配置,解析失败时使用默认值
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {:#}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let json = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, json).with_context(|| format!("写入 {} 失败", path.display()))?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前计数配置:");
        info!("  📊 CSV: {}", self.ledger_file.display());
        info!("  📏 Lines: {}", self.line_config_file.display());
        info!("  类别过滤: {:?}", self.class_filter);
        info!("  轨迹长度: {} | 淘汰帧数: {}", self.history_len, self.track_ttl_frames);
        info!("  检测 sidecar: {}", self.detector_addr);
        info!("  计数作用范围: {:?}", self.apply_mode);
    }
}
