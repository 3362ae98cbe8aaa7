/// 视频流管理器 - 启动/停止/切换检测流
///
/// 同一时刻只持有一个检测流。每次启动分配新的代数ID,
/// 生产者线程发现代数过期即退出; 停止时先让代数失效、在会话锁内停用写入,
/// 再等待线程退出,确保旧连接释放后才建立新连接。
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use super::source::{validate_uri, Connector, FrameSource};
use crate::config::CounterConfig;
use crate::error::{CounterError, Result};
use crate::session::Session;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// 流参数
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub settle: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl From<&CounterConfig> for StreamSettings {
    fn from(config: &CounterConfig) -> Self {
        Self {
            settle: config.connect_settle(),
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// 流状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub running: bool,
    pub source: Option<String>,
    pub generation: Option<u64>,
    pub frames_processed: u64,
}

struct Worker {
    generation: u64,
    source: String,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

pub struct StreamManager {
    session: Arc<Session>,
    connector: Arc<dyn Connector>,
    settings: StreamSettings,
    /// 当前有效的流代数; 生产者发现不一致即退出
    generation: Arc<AtomicU64>,
    worker: Mutex<Option<Worker>>,
}

impl StreamManager {
    pub fn new(
        session: Arc<Session>,
        connector: Arc<dyn Connector>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            session,
            connector,
            settings,
            generation: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }

    /// 启动检测流; 已有流时先完整释放
    pub fn start(&self, uri: &str) -> Result<u64> {
        let uri = validate_uri(uri)?;

        let mut slot = self.worker.lock();
        self.shutdown(&mut slot);

        let source = self.connector.connect(&uri).map_err(|e| {
            error!("❌ RTSP Error: {:#}", e);
            CounterError::ConnectFailure(format!("{:#}", e))
        })?;

        if !self.settings.settle.is_zero() {
            std::thread::sleep(self.settings.settle);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.session.activate(generation);

        let running = Arc::new(AtomicBool::new(true));
        let frames = Arc::new(AtomicU64::new(0));
        let producer = Producer {
            session: self.session.clone(),
            connector: self.connector.clone(),
            uri: uri.clone(),
            generation,
            current: self.generation.clone(),
            settings: self.settings.clone(),
            running: running.clone(),
            frames: frames.clone(),
        };

        let handle = std::thread::Builder::new()
            .name(format!("producer-{}", generation))
            .spawn(move || producer.run(source))
            .map_err(|e| {
                self.session.deactivate(generation);
                CounterError::ConnectFailure(format!("spawn producer thread: {}", e))
            })?;

        *slot = Some(Worker {
            generation,
            source: uri,
            running,
            frames,
            handle: Some(handle),
        });

        info!("✅ RTSP connected (Gen: {})", generation);
        Ok(generation)
    }

    /// 停止检测流; 没有流时也返回成功
    pub fn stop(&self) {
        let mut slot = self.worker.lock();
        self.shutdown(&mut slot);
    }

    pub fn status(&self) -> StreamStatus {
        match &*self.worker.lock() {
            Some(worker) => StreamStatus {
                running: worker.running.load(Ordering::SeqCst),
                source: Some(worker.source.clone()),
                generation: Some(worker.generation),
                frames_processed: worker.frames.load(Ordering::SeqCst),
            },
            None => StreamStatus {
                running: false,
                source: None,
                generation: None,
                frames_processed: 0,
            },
        }
    }

    fn shutdown(&self, slot: &mut Option<Worker>) {
        let Some(mut worker) = slot.take() else {
            return;
        };

        // 先让代数失效,再在会话锁内停用; 返回后不会再写入任何事件
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.session.deactivate(worker.generation);

        if let Some(handle) = worker.handle.take() {
            if handle.join().is_err() {
                error!("❌ producer thread (Gen: {}) panicked", worker.generation);
            }
        }
        info!("🛑 Stream stopped (Gen: {})", worker.generation);
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.stop();
    }
}

// ========== 生产者线程 ==========

struct Producer {
    session: Arc<Session>,
    connector: Arc<dyn Connector>,
    uri: String,
    generation: u64,
    current: Arc<AtomicU64>,
    settings: StreamSettings,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
}

impl Producer {
    fn alive(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn run(self, source: Box<dyn FrameSource>) {
        info!("🎬 producer started (Gen: {})", self.generation);
        let mut source = Some(source);

        while self.alive() {
            let Some(src) = source.as_mut() else {
                break;
            };

            match src.next_frame() {
                Ok(Some(frame)) => {
                    let report = self.session.process_frame(self.generation, &frame);
                    if report.stale {
                        break;
                    }
                    self.frames.fetch_add(1, Ordering::SeqCst);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("⚠️ Failed to read frame: {:#}. Attempting to reconnect...", e);
                    // 先释放旧连接
                    drop(source.take());
                    source = self.reconnect();
                }
            }
        }

        drop(source);
        self.session.deactivate(self.generation);
        self.running.store(false, Ordering::SeqCst);
        info!("🛑 producer exited (Gen: {})", self.generation);
    }

    fn reconnect(&self) -> Option<Box<dyn FrameSource>> {
        let max = self.settings.max_reconnect_attempts;
        for attempt in 1..=max {
            info!("🔄 Reconnection attempt {}/{}", attempt, max);
            if !self.sleep_while_alive(self.settings.reconnect_delay) {
                return None;
            }
            match self.connector.connect(&self.uri) {
                Ok(source) => {
                    info!("✅ Reconnected successfully!");
                    return Some(source);
                }
                Err(e) => warn!("⚠️ reconnect failed: {:#}", e),
            }
        }
        if self.alive() {
            error!("❌ Failed to reconnect, stream marked stopped");
        }
        None
    }

    /// 分片睡眠,期间流被停止则提前返回 false
    fn sleep_while_alive(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        while self.alive() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
        false
    }
}
