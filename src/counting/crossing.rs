//! 双线状态机 (Two-line crossing state machine)
//!
//! 每个跟踪目标记住最近一次穿过的线 (A 或 B);
//! 再穿过另一条线时产生一次方向事件并清空状态。
//! - A → B: IN
//! - B → A: OUT

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::geometry::{Crossing, LineRole};
use crate::detection::types::TrackId;
use crate::error::CounterError;

/// 方向事件,也用作计数实体的模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CounterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            other => Err(CounterError::invalid(format!(
                "mode must be IN or OUT, got {:?}",
                other
            ))),
        }
    }
}

/// 跟踪目标 → 已武装的线
#[derive(Debug, Default)]
pub struct CrossingStateMachine {
    armed: HashMap<TrackId, LineRole>,
}

impl CrossingStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一次越线结果,最多返回一个方向事件
    ///
    /// 固定先处理 A 再处理 B,两者共享同一份状态:
    /// A 触发事件后清空,B 再从空状态开始武装。
    pub fn on_crossing(&mut self, track_id: TrackId, crossing: Crossing) -> Option<Direction> {
        let mut event = None;

        if crossing.crosses_a {
            event = event.or(self.step(track_id, LineRole::A));
        }
        if crossing.crosses_b {
            event = event.or(self.step(track_id, LineRole::B));
        }

        event
    }

    fn step(&mut self, track_id: TrackId, role: LineRole) -> Option<Direction> {
        match self.armed.get(&track_id).copied() {
            None => {
                self.armed.insert(track_id, role);
                debug!("🎯 track {} armed on line {:?}", track_id, role);
                None
            }
            // 重复穿过同一条线: 不变
            Some(armed) if armed == role => None,
            Some(_) => {
                self.armed.remove(&track_id);
                let direction = match role {
                    LineRole::B => Direction::In,
                    LineRole::A => Direction::Out,
                };
                info!("🚦 track {} completed crossing → {}", track_id, direction);
                Some(direction)
            }
        }
    }

    pub fn armed(&self, track_id: TrackId) -> Option<LineRole> {
        self.armed.get(&track_id).copied()
    }

    /// 丢弃已淘汰目标的武装状态
    pub fn forget(&mut self, track_id: TrackId) {
        self.armed.remove(&track_id);
    }

    pub fn clear(&mut self) {
        self.armed.clear();
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}
