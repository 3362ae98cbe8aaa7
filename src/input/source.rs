/// 帧源抽象 (Frame source abstraction)
///
/// 检测器/跟踪器在进程外运行,这里只约定它每帧交付的结果。
use crate::detection::DetectionFrame;
use crate::error::{CounterError, Result};

/// 已连接的检测结果流; 丢弃即释放底层连接
pub trait FrameSource: Send {
    /// 读取下一帧
    /// - `Ok(Some(frame))`: 一帧检测结果
    /// - `Ok(None)`: 暂无可用帧 (读超时或跳过的坏帧)
    /// - `Err(_)`: 读失败,需要重连
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>>;
}

/// 按视频流地址建立检测结果流
pub trait Connector: Send + Sync {
    fn connect(&self, uri: &str) -> anyhow::Result<Box<dyn FrameSource>>;
}

/// 校验视频流地址,返回去除首尾空白后的地址
pub fn validate_uri(uri: &str) -> Result<String> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(CounterError::invalid("Please enter RTSP URL"));
    }
    if !uri.starts_with("rtsp://") {
        return Err(CounterError::invalid("URL must start with rtsp://"));
    }
    Ok(uri.to_string())
}
