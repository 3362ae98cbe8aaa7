//! 计数会话 (Counting session)
//!
//! 进程内唯一的共享状态聚合: 计数点、双线状态机、边界线、画线会话、台账。
//! 所有需要一致视图的读写都在同一把锁内完成;
//! 轨迹历史单独加锁,几何判定在锁外进行。
//!
//! 锁顺序: `history` → `state`,两把锁同时持有的只有 `reset`。

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{ApplyMode, CounterConfig};
use crate::counting::{
    evaluate, AddPoint, CountSink, Crossing, CrossingStateMachine, CsvLedger, Direction, DotId,
    DotRegistry, DotSnapshot, DrawingSession, DrawingStatus, FinishedDot, LinePair, LineRole,
    LineStatus, LineStore, Point,
};
use crate::detection::{DetectionFrame, Movement, TrackHistoryStore, TrackId, TrackSnapshot};
use crate::error::{CounterError, Result};

// ========== 返回类型 ==========

/// 添加画线点的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePointOutcome {
    /// 未在画线,没有添加
    NotDrawing,
    /// 已添加,当前点数
    Added(usize),
    /// 线已完成; `persisted` 表示是否已写盘
    Complete { role: LineRole, persisted: bool },
}

/// 线状态 + 画线会话状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineReport {
    #[serde(flatten)]
    pub status: LineStatus,
    pub drawing: DrawingStatus,
}

/// 一帧处理的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub matched: usize,
    pub movements: usize,
    pub events: usize,
    /// 流已失效,本帧被丢弃
    pub stale: bool,
}

// ========== 共享状态 ==========

struct SessionState {
    registry: DotRegistry,
    crossings: CrossingStateMachine,
    lines: LineStore,
    drawing: DrawingSession,
    ledger: Box<dyn CountSink>,
    /// 允许写入事件的视频流代数; `None` 表示没有运行中的流
    active_generation: Option<u64>,
    /// 每次 reset 加一; reset 之前算出的运动不再生效
    epoch: u64,
}

impl SessionState {
    fn accepts(&self, generation: u64) -> bool {
        self.active_generation == Some(generation)
    }
}

pub struct Session {
    state: Mutex<SessionState>,
    history: Mutex<TrackHistoryStore>,
    class_filter: String,
    apply_mode: ApplyMode,
    frame_size: (f32, f32),
}

impl Session {
    /// 按配置构建: 初始化台账,恢复已保存的边界线
    pub fn from_config(config: &CounterConfig) -> Result<Self> {
        let ledger = CsvLedger::new(&config.ledger_file);
        ledger.initialize()?;

        let mut lines = LineStore::new(&config.line_config_file);
        lines.load();

        let history = TrackHistoryStore::new(
            config.history_len,
            config.track_ttl_frames,
            config.max_tracks,
        );

        Ok(Self::new(lines, Box::new(ledger), history, config)
            .with_frame_size(config.frame_width, config.frame_height))
    }

    pub fn new(
        lines: LineStore,
        ledger: Box<dyn CountSink>,
        history: TrackHistoryStore,
        config: &CounterConfig,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState {
                registry: DotRegistry::new(),
                crossings: CrossingStateMachine::new(),
                lines,
                drawing: DrawingSession::new(),
                ledger,
                active_generation: None,
                epoch: 0,
            }),
            history: Mutex::new(history),
            class_filter: config.class_filter.trim().to_lowercase(),
            apply_mode: config.apply_mode,
            frame_size: (f32::MAX, f32::MAX),
        }
    }

    fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width as f32, height as f32);
        self
    }

    fn check_point(&self, x: f32, y: f32) -> Result<Point> {
        if !x.is_finite() || !y.is_finite() {
            return Err(CounterError::invalid(format!(
                "coordinates must be finite numbers, got ({}, {})",
                x, y
            )));
        }
        let (w, h) = self.frame_size;
        if x < 0.0 || y < 0.0 || x > w || y > h {
            debug!("📐 point ({}, {}) outside {}x{} frame", x, y, w, h);
        }
        Ok(Point::new(x, y))
    }

    // ========== 控制面操作 ==========

    pub fn create_dot(&self, x: f32, y: f32, key: &str, mode: Direction) -> Result<DotId> {
        let anchor = self.check_point(x, y)?;
        self.state.lock().registry.create(key, mode, anchor)
    }

    /// 结算: 写台账成功后才移除计数点
    pub fn finish_dot(&self, id: DotId) -> Result<FinishedDot> {
        let mut state = self.state.lock();
        let SessionState {
            registry, ledger, ..
        } = &mut *state;
        registry.finish(id, |finished| ledger.record(finished)).map_err(|e| {
            if let CounterError::PersistFailure(ref reason) = e {
                error!("❌ Error saving dot {} to ledger: {}", id, reason);
            }
            e
        })
    }

    pub fn remove_dot(&self, id: DotId) -> Result<String> {
        self.state.lock().registry.remove(id)
    }

    pub fn start_line_drawing(&self, role: LineRole) {
        self.state.lock().drawing.start(role);
        info!("✏️  Click 2 points for Line {}", role.number());
    }

    pub fn add_line_point(
        &self,
        x: f32,
        y: f32,
        role: Option<LineRole>,
    ) -> Result<LinePointOutcome> {
        let point = self.check_point(x, y)?;
        let mut state = self.state.lock();

        match state.drawing.add_point(point, role) {
            AddPoint::Ignored => Ok(LinePointOutcome::NotDrawing),
            AddPoint::Added(n) => Ok(LinePointOutcome::Added(n)),
            AddPoint::Completed(role, line) => {
                // 写盘失败不影响内存中的线
                let persisted = match state.lines.set_line(role, line) {
                    Ok(persisted) => persisted,
                    Err(e) => {
                        error!("❌ Error saving lines: {}", e);
                        false
                    }
                };
                info!("📏 Line {} set: {:?}", role.number(), line.points());
                Ok(LinePointOutcome::Complete { role, persisted })
            }
        }
    }

    pub fn clear_lines(&self) -> Result<()> {
        self.state.lock().lines.clear()
    }

    /// 软重启: 清空计数点、轨迹、武装状态、画线会话; 边界线和台账不动
    pub fn reset(&self) {
        let mut history = self.history.lock();
        let mut state = self.state.lock();
        state.registry.reset();
        state.crossings.clear();
        state.drawing.reset();
        state.epoch += 1;
        history.clear();
        info!("🔄 Reset complete");
    }

    pub fn counts(&self) -> BTreeMap<DotId, DotSnapshot> {
        self.state.lock().registry.snapshot()
    }

    pub fn line_status(&self) -> LineReport {
        let state = self.state.lock();
        LineReport {
            status: state.lines.status(),
            drawing: state.drawing.status(),
        }
    }

    pub fn lines(&self) -> LinePair {
        self.state.lock().lines.get()
    }

    pub fn tracks(&self) -> Vec<TrackSnapshot> {
        self.history.lock().snapshot()
    }

    pub fn armed(&self, track_id: TrackId) -> Option<LineRole> {
        self.state.lock().crossings.armed(track_id)
    }

    // ========== 视频流生命周期 ==========

    /// 允许指定代数的视频流写入事件
    pub fn activate(&self, generation: u64) {
        self.state.lock().active_generation = Some(generation);
    }

    /// 仅当当前活动流就是 `generation` 时停用
    pub fn deactivate(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.active_generation == Some(generation) {
            state.active_generation = None;
        }
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.state.lock().active_generation
    }

    // ========== 生产者: 每帧处理 ==========

    /// 检测帧 → 轨迹 → 越线 → 状态机 → 计数点
    pub fn process_frame(&self, generation: u64, frame: &DetectionFrame) -> FrameReport {
        let mut report = FrameReport::default();

        let (lines, epoch) = {
            let state = self.state.lock();
            if !state.accepts(generation) {
                report.stale = true;
                return report;
            }
            (state.lines.get(), state.epoch)
        };

        let (movements, evicted) = {
            let mut history = self.history.lock();
            history.advance();
            let mut movements: Vec<Movement> = Vec::new();
            for det in frame
                .detections
                .iter()
                .filter(|d| d.matches_class(&self.class_filter))
            {
                report.matched += 1;
                if let Some(m) = history.observe(det.track_id, det.bbox.center()) {
                    movements.push(m);
                }
            }
            (movements, history.evict_stale())
        };
        report.movements = movements.len();

        if !evicted.is_empty() {
            let mut state = self.state.lock();
            for id in &evicted {
                state.crossings.forget(*id);
            }
        }

        // 两条线都存在才判定越线
        if !lines.both_defined() {
            return report;
        }

        for movement in &movements {
            let crossing = evaluate(&movement.prev, &movement.curr, &lines);
            if !crossing.any() {
                continue;
            }
            match self.apply_crossing(generation, epoch, movement, crossing) {
                Some(true) => report.events += 1,
                Some(false) => {}
                None => {
                    report.stale = true;
                    return report;
                }
            }
        }

        report
    }

    /// 在锁内检查流代数后推进状态机并写计数; 流已失效返回 `None`
    fn apply_crossing(
        &self,
        generation: u64,
        epoch: u64,
        movement: &Movement,
        crossing: Crossing,
    ) -> Option<bool> {
        let mut state = self.state.lock();
        if !state.accepts(generation) {
            return None;
        }
        // 期间发生过 reset: 丢弃旧运动
        if state.epoch != epoch {
            debug!("🔄 dropping movement of track {} from before reset", movement.track_id);
            return Some(false);
        }

        let Some(direction) = state.crossings.on_crossing(movement.track_id, crossing) else {
            return Some(false);
        };

        match self.apply_mode {
            ApplyMode::Broadcast => {
                let applied = state.registry.apply(direction);
                info!("📈 {} event applied to {} dot(s)", direction, applied);
            }
            ApplyMode::Nearest => {
                if let Some(id) = state.registry.apply_nearest(direction, movement.curr) {
                    info!("📈 {} event applied to dot {}", direction, id);
                }
            }
        }
        Some(true)
    }
}
