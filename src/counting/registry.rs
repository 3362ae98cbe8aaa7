//! 计数实体登记表 (Counter registry of dots)
//!
//! 每个计数点绑定一个车牌号和一个模式 (IN / OUT)。
//! 方向事件广播给所有模式相同的计数点。

use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;
use tracing::info;

use super::crossing::Direction;
use super::geometry::Point;
use crate::error::{CounterError, Result};

pub type DotId = u64;

// ========== 数据结构 ==========

/// 计数点
#[derive(Clone, Debug)]
pub struct Dot {
    pub id: DotId,
    /// 显示锚点,不参与几何判定
    pub anchor: Point,
    pub color: [u8; 3],
    pub numberplate: String,
    pub mode: Direction,
    pub in_count: u64,
    pub out_count: u64,
}

impl Dot {
    fn bump(&mut self, direction: Direction) {
        match direction {
            Direction::In => self.in_count += 1,
            Direction::Out => self.out_count += 1,
        }
    }
}

/// 计数点快照 (GetCounts 响应的一项)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DotSnapshot {
    pub numberplate: String,
    pub mode: Direction,
    #[serde(rename = "IN")]
    pub in_count: u64,
    #[serde(rename = "OUT")]
    pub out_count: u64,
    pub color: [u8; 3],
    pub center: Point,
}

impl From<&Dot> for DotSnapshot {
    fn from(dot: &Dot) -> Self {
        Self {
            numberplate: dot.numberplate.clone(),
            mode: dot.mode,
            in_count: dot.in_count,
            out_count: dot.out_count,
            color: dot.color,
            center: dot.anchor,
        }
    }
}

/// 已结算的计数点 (写入台账的一行)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinishedDot {
    pub numberplate: String,
    pub mode: Direction,
    pub in_count: u64,
    pub out_count: u64,
}

impl FinishedDot {
    pub fn total(&self) -> u64 {
        self.in_count + self.out_count
    }
}

/// 车牌号规范化: 去空白 + 大写
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ========== 登记表 ==========

#[derive(Debug)]
pub struct DotRegistry {
    dots: BTreeMap<DotId, Dot>,
    next_id: DotId,
}

impl Default for DotRegistry {
    fn default() -> Self {
        Self {
            dots: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl DotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新建计数点; 车牌号在存活计数点之间唯一
    pub fn create(&mut self, key: &str, mode: Direction, anchor: Point) -> Result<DotId> {
        let numberplate = normalize_key(key);
        if numberplate.is_empty() {
            return Err(CounterError::EmptyKey);
        }
        if self.dots.values().any(|d| d.numberplate == numberplate) {
            return Err(CounterError::DuplicateKey(numberplate));
        }

        let mut rng = rand::thread_rng();
        let color = [rng.gen(), rng.gen(), rng.gen()];

        let id = self.next_id;
        self.next_id += 1;
        self.dots.insert(
            id,
            Dot {
                id,
                anchor,
                color,
                numberplate: numberplate.clone(),
                mode,
                in_count: 0,
                out_count: 0,
            },
        );

        info!("➕ dot {} created: {} [{}]", id, numberplate, mode);
        Ok(id)
    }

    /// 广播: 所有模式等于事件方向的计数点各 +1,返回受影响数量
    pub fn apply(&mut self, direction: Direction) -> usize {
        let mut applied = 0;
        for dot in self.dots.values_mut().filter(|d| d.mode == direction) {
            dot.bump(direction);
            applied += 1;
        }
        applied
    }

    /// 只给锚点离 `at` 最近的同模式计数点 +1
    pub fn apply_nearest(&mut self, direction: Direction, at: Point) -> Option<DotId> {
        let nearest = self
            .dots
            .values_mut()
            .filter(|d| d.mode == direction)
            .min_by(|a, b| {
                a.anchor
                    .distance_sq(&at)
                    .total_cmp(&b.anchor.distance_sq(&at))
            })?;
        nearest.bump(direction);
        Some(nearest.id)
    }

    /// 结算: 快照计数交给 `persist`,成功后移除; 失败时计数点保持存活
    pub fn finish<F>(&mut self, id: DotId, persist: F) -> Result<FinishedDot>
    where
        F: FnOnce(&FinishedDot) -> Result<()>,
    {
        let dot = self.dots.get(&id).ok_or(CounterError::NotFound(id))?;
        let finished = FinishedDot {
            numberplate: dot.numberplate.clone(),
            mode: dot.mode,
            in_count: dot.in_count,
            out_count: dot.out_count,
        };

        persist(&finished)?;

        self.dots.remove(&id);
        info!(
            "✅ dot {} finished: {} | Mode: {} | IN: {} | OUT: {}",
            id, finished.numberplate, finished.mode, finished.in_count, finished.out_count
        );
        Ok(finished)
    }

    /// 丢弃计数点,不写台账
    pub fn remove(&mut self, id: DotId) -> Result<String> {
        let dot = self.dots.remove(&id).ok_or(CounterError::NotFound(id))?;
        info!("➖ dot {} removed: {}", id, dot.numberplate);
        Ok(dot.numberplate)
    }

    /// 清空全部计数点,ID 从 1 重新开始
    pub fn reset(&mut self) {
        self.dots.clear();
        self.next_id = 1;
    }

    pub fn get(&self, id: DotId) -> Option<&Dot> {
        self.dots.get(&id)
    }

    pub fn snapshot(&self) -> BTreeMap<DotId, DotSnapshot> {
        self.dots
            .iter()
            .map(|(id, dot)| (*id, DotSnapshot::from(dot)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Point {
        Point::new(0.0, 0.0)
    }

    #[test]
    fn test_create_assigns_monotonic_ids() {
        let mut reg = DotRegistry::new();
        assert_eq!(reg.create("a1", Direction::In, origin()).unwrap(), 1);
        assert_eq!(reg.create("b2", Direction::Out, origin()).unwrap(), 2);
        reg.remove(2).unwrap();
        // 同一次运行内不复用ID
        assert_eq!(reg.create("c3", Direction::In, origin()).unwrap(), 3);
    }

    #[test]
    fn test_key_is_normalized_and_unique() {
        let mut reg = DotRegistry::new();
        let id = reg.create("ABC123", Direction::In, origin()).unwrap();
        let err = reg.create(" abc123 ", Direction::In, origin()).unwrap_err();
        assert!(matches!(err, CounterError::DuplicateKey(ref k) if k == "ABC123"));

        reg.remove(id).unwrap();
        assert!(reg.create("abc123", Direction::Out, origin()).is_ok());
    }

    #[test]
    fn test_key_free_after_finish() {
        let mut reg = DotRegistry::new();
        let id = reg.create("XYZ", Direction::In, origin()).unwrap();
        reg.finish(id, |_| Ok(())).unwrap();
        assert!(reg.create("xyz", Direction::In, origin()).is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut reg = DotRegistry::new();
        assert!(matches!(
            reg.create("   ", Direction::In, origin()),
            Err(CounterError::EmptyKey)
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_broadcast_apply() {
        let mut reg = DotRegistry::new();
        let a = reg.create("A", Direction::In, origin()).unwrap();
        let b = reg.create("B", Direction::In, origin()).unwrap();
        let c = reg.create("C", Direction::Out, origin()).unwrap();

        assert_eq!(reg.apply(Direction::In), 2);
        assert_eq!(reg.get(a).unwrap().in_count, 1);
        assert_eq!(reg.get(b).unwrap().in_count, 1);
        assert_eq!(reg.get(c).unwrap().in_count, 0);
        assert_eq!(reg.get(c).unwrap().out_count, 0);

        assert_eq!(reg.apply(Direction::Out), 1);
        assert_eq!(reg.get(c).unwrap().out_count, 1);
        assert_eq!(reg.get(a).unwrap().out_count, 0);
    }

    #[test]
    fn test_apply_nearest() {
        let mut reg = DotRegistry::new();
        let far = reg.create("FAR", Direction::In, Point::new(500.0, 500.0)).unwrap();
        let near = reg.create("NEAR", Direction::In, Point::new(10.0, 10.0)).unwrap();
        assert_eq!(
            reg.apply_nearest(Direction::In, Point::new(0.0, 0.0)),
            Some(near)
        );
        assert_eq!(reg.get(far).unwrap().in_count, 0);
        assert_eq!(reg.apply_nearest(Direction::Out, origin()), None);
    }

    #[test]
    fn test_finish_persist_failure_keeps_dot() {
        let mut reg = DotRegistry::new();
        let id = reg.create("KEEP", Direction::In, origin()).unwrap();
        reg.apply(Direction::In);

        let err = reg
            .finish(id, |_| Err(CounterError::persist("disk full")))
            .unwrap_err();
        assert!(matches!(err, CounterError::PersistFailure(_)));
        assert_eq!(reg.get(id).unwrap().in_count, 1);

        let finished = reg.finish(id, |_| Ok(())).unwrap();
        assert_eq!(finished.in_count, 1);
        assert_eq!(finished.total(), 1);
        assert!(reg.get(id).is_none());
    }

    #[test]
    fn test_finish_unknown_leaves_snapshot() {
        let mut reg = DotRegistry::new();
        reg.create("ONE", Direction::In, origin()).unwrap();
        let before = reg.snapshot();
        assert!(matches!(
            reg.finish(42, |_| Ok(())),
            Err(CounterError::NotFound(42))
        ));
        assert_eq!(reg.snapshot(), before);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut reg = DotRegistry::new();
        reg.create("A", Direction::In, origin()).unwrap();
        reg.create("B", Direction::In, origin()).unwrap();
        reg.reset();
        assert!(reg.is_empty());
        assert_eq!(reg.create("A", Direction::In, origin()).unwrap(), 1);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut reg = DotRegistry::new();
        reg.create("P1", Direction::Out, Point::new(3.0, 4.0)).unwrap();
        let json = serde_json::to_value(reg.snapshot()).unwrap();
        let entry = &json["1"];
        assert_eq!(entry["numberplate"], "P1");
        assert_eq!(entry["mode"], "OUT");
        assert_eq!(entry["IN"], 0);
        assert_eq!(entry["OUT"], 0);
        assert_eq!(entry["center"][0], 3.0);
    }
}
