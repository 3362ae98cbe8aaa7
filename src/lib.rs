pub mod config; // 服务配置参数
pub mod counting; // 计数核心
pub mod detection; // 检测/跟踪数据
pub mod error; // 错误分类
pub mod input; // 检测输入系统
pub mod server; // 控制面 HTTP 服务
pub mod session; // 计数会话

pub use crate::config::{Args, CounterConfig};
pub use crate::error::{CounterError, ErrorKind, Result};
pub use crate::input::{SidecarConnector, StreamManager, StreamSettings};
pub use crate::session::Session;

/// 本地时间戳,用于台账
pub fn gen_time_string() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_string_format() {
        let ts = gen_time_string();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
