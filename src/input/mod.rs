/// 检测输入系统 (Detection Input System)
///
/// 独立生产者线程,负责拉取检测/跟踪结果并驱动计数会话
/// - Connector/FrameSource: 检测结果流抽象
/// - SidecarConnector: 通过 TCP 连接外部检测器进程
/// - StreamManager: 流管理器 (支持热切换与断线重连)
pub mod sidecar;
pub mod source;
pub mod stream_manager;

#[cfg(test)]
pub(crate) mod scripted;

pub use sidecar::SidecarConnector;
pub use source::{validate_uri, Connector, FrameSource};
pub use stream_manager::{StreamManager, StreamSettings, StreamStatus};
