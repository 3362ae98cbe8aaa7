/// 检测 sidecar 连接器
/// Detector/tracker sidecar connector
///
/// 协议 (按行分隔的 JSON):
/// 1. 连接后发送 `{"source": "<rtsp地址>"}`
/// 2. 之后每行一帧 `{"frame_id": n, "detections": [{"track_id", "label", "box"}]}`
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{info, warn};

use super::source::{Connector, FrameSource};
use crate::detection::DetectionFrame;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Serialize)]
struct Hello<'a> {
    source: &'a str,
}

/// TCP sidecar 连接器
#[derive(Debug, Clone)]
pub struct SidecarConnector {
    addr: String,
    read_timeout: Duration,
}

impl SidecarConnector {
    pub fn new(addr: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            read_timeout,
        }
    }
}

impl Connector for SidecarConnector {
    fn connect(&self, uri: &str) -> anyhow::Result<Box<dyn FrameSource>> {
        info!("📡 Connecting to RTSP: {} (via {})", uri, self.addr);

        let addr = self
            .addr
            .to_socket_addrs()
            .with_context(|| format!("无法解析 sidecar 地址 {}", self.addr))?
            .next()
            .with_context(|| format!("sidecar 地址 {} 没有可用的解析结果", self.addr))?;

        let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .with_context(|| format!("连接 sidecar {} 失败", addr))?;
        stream.set_read_timeout(Some(self.read_timeout))?;
        stream.set_nodelay(true)?;

        let mut hello = serde_json::to_vec(&Hello { source: uri })?;
        hello.push(b'\n');
        stream.write_all(&hello).context("发送流地址失败")?;
        stream.flush()?;

        Ok(Box::new(SidecarSource {
            reader: BufReader::new(stream),
            line: String::new(),
        }))
    }
}

struct SidecarSource {
    reader: BufReader<TcpStream>,
    /// 未读完的一行 (读超时时保留)
    line: String,
}

impl FrameSource for SidecarSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
        match self.reader.read_line(&mut self.line) {
            Ok(0) if self.line.is_empty() => bail!("detector closed the stream"),
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(None)
            }
            Err(e) => return Err(e).context("读取检测结果失败"),
        }

        let line = std::mem::take(&mut self.line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        // 坏帧只跳过,不断开
        match serde_json::from_str::<DetectionFrame>(line) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                warn!("⚠️ 丢弃无法解析的帧: {}", e);
                Ok(None)
            }
        }
    }
}
