//! 轨迹历史存储
//! Bounded per-track position history
//!
//! 每个目标保留最近 N 个中心点 (先进先出)。
//! 长时间未再出现的目标按"最后出现帧"淘汰,总数超过上限时淘汰最久未见的目标。

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::debug;

use super::types::TrackId;
use crate::counting::geometry::Point;

/// 默认轨迹长度
pub const DEFAULT_HISTORY_LEN: usize = 30;

// ========== 数据结构 ==========

/// 单个目标的历史轨迹
#[derive(Clone, Debug)]
pub struct TrackHistory {
    /// 历史中心点,最旧的在前
    pub trajectory: VecDeque<Point>,

    /// 最后出现的帧序号 (存储内部计数)
    pub last_seen: u64,
}

impl TrackHistory {
    fn new(capacity: usize, tick: u64) -> Self {
        Self {
            trajectory: VecDeque::with_capacity(capacity + 1),
            last_seen: tick,
        }
    }

    pub fn latest(&self) -> Option<Point> {
        self.trajectory.back().copied()
    }
}

/// 目标位置快照 (用于叠加显示)
#[derive(Clone, Debug, Serialize)]
pub struct TrackSnapshot {
    pub track_id: TrackId,
    pub position: Point,
    pub points: usize,
    pub color: (u8, u8, u8),
}

/// 相邻两次观测构成的运动
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Movement {
    pub track_id: TrackId,
    pub prev: Point,
    pub curr: Point,
}

/// 轨迹历史存储
#[derive(Debug)]
pub struct TrackHistoryStore {
    tracks: HashMap<TrackId, TrackHistory>,
    capacity: usize,
    ttl_frames: u64,
    max_tracks: usize,
    tick: u64,
}

impl Default for TrackHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN, 300, 4096)
    }
}

impl TrackHistoryStore {
    /// # 参数
    /// - `capacity`: 每个目标保留的点数
    /// - `ttl_frames`: 多少帧未出现后淘汰 (0 = 不按时间淘汰)
    /// - `max_tracks`: 目标总数上限 (0 = 不限制)
    pub fn new(capacity: usize, ttl_frames: u64, max_tracks: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            capacity: capacity.max(2),
            ttl_frames,
            max_tracks,
            tick: 0,
        }
    }

    /// 开始新的一帧
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// 记录目标当前位置,返回与上一位置构成的运动
    pub fn observe(&mut self, track_id: TrackId, position: Point) -> Option<Movement> {
        let tick = self.tick;
        let capacity = self.capacity;
        let history = self
            .tracks
            .entry(track_id)
            .or_insert_with(|| TrackHistory::new(capacity, tick));

        history.trajectory.push_back(position);
        history.last_seen = tick;

        // 限制轨迹长度
        while history.trajectory.len() > capacity {
            history.trajectory.pop_front();
        }

        let len = history.trajectory.len();
        if len > 1 {
            Some(Movement {
                track_id,
                prev: history.trajectory[len - 2],
                curr: position,
            })
        } else {
            None
        }
    }

    /// 淘汰过期目标,返回被淘汰的ID
    pub fn evict_stale(&mut self) -> Vec<TrackId> {
        let mut evicted = Vec::new();

        if self.ttl_frames > 0 {
            let tick = self.tick;
            let ttl = self.ttl_frames;
            self.tracks.retain(|id, history| {
                let keep = tick.saturating_sub(history.last_seen) <= ttl;
                if !keep {
                    evicted.push(*id);
                }
                keep
            });
        }

        if self.max_tracks > 0 && self.tracks.len() > self.max_tracks {
            let mut by_age: Vec<(u64, TrackId)> = self
                .tracks
                .iter()
                .map(|(id, h)| (h.last_seen, *id))
                .collect();
            by_age.sort_unstable();
            let excess = self.tracks.len() - self.max_tracks;
            for (_, id) in by_age.into_iter().take(excess) {
                self.tracks.remove(&id);
                evicted.push(id);
            }
        }

        if !evicted.is_empty() {
            debug!("🧹 evicted {} stale track(s)", evicted.len());
        }
        evicted
    }

    pub fn history(&self, track_id: TrackId) -> Option<&TrackHistory> {
        self.tracks.get(&track_id)
    }

    pub fn snapshot(&self) -> Vec<TrackSnapshot> {
        let mut tracks: Vec<TrackSnapshot> = self
            .tracks
            .iter()
            .filter_map(|(id, history)| {
                history.latest().map(|position| TrackSnapshot {
                    track_id: *id,
                    position,
                    points: history.trajectory.len(),
                    color: id_to_color(*id),
                })
            })
            .collect();
        tracks.sort_by_key(|t| t.track_id);
        tracks
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

// ========== 工具函数 ==========

/// 根据ID生成不同颜色
pub fn id_to_color(id: TrackId) -> (u8, u8, u8) {
    let hue = (id.unsigned_abs() as f32 * 137.508) % 360.0; // 黄金角度采样
    hsv_to_rgb(hue, 0.8, 0.9)
}

/// HSV转RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}
