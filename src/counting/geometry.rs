//! 越线几何判定 (Crossing geometry)
//!
//! 把目标在相邻两次观测之间的运动视为一条线段,
//! 与两条边界线做有限线段求交。

use serde::{Deserialize, Serialize};

// ========== 数据结构 ==========

/// 画面坐标点,序列化为 `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f32, f32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// 边界线角色: A = 线1, B = 线2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineRole {
    A,
    B,
}

impl LineRole {
    /// 控制面使用的线编号 (1 / 2)
    pub fn from_number(number: i64) -> Option<Self> {
        match number {
            1 => Some(LineRole::A),
            2 => Some(LineRole::B),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            LineRole::A => 1,
            LineRole::B => 2,
        }
    }
}

/// 有限边界线段,序列化为 `[[x, y], [x, y]]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Point; 2]", into = "[Point; 2]")]
pub struct BoundaryLine {
    pub start: Point,
    pub end: Point,
}

impl BoundaryLine {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn points(&self) -> [Point; 2] {
        [self.start, self.end]
    }
}

impl From<[Point; 2]> for BoundaryLine {
    fn from([start, end]: [Point; 2]) -> Self {
        Self { start, end }
    }
}

impl From<BoundaryLine> for [Point; 2] {
    fn from(line: BoundaryLine) -> Self {
        line.points()
    }
}

/// 两条边界线的快照 (任一条都可能未定义)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinePair {
    pub a: Option<BoundaryLine>,
    pub b: Option<BoundaryLine>,
}

impl LinePair {
    pub fn get(&self, role: LineRole) -> Option<&BoundaryLine> {
        match role {
            LineRole::A => self.a.as_ref(),
            LineRole::B => self.b.as_ref(),
        }
    }

    pub fn both_defined(&self) -> bool {
        self.a.is_some() && self.b.is_some()
    }

    pub fn any_defined(&self) -> bool {
        self.a.is_some() || self.b.is_some()
    }
}

/// 一次运动的越线结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Crossing {
    pub crosses_a: bool,
    pub crosses_b: bool,
}

impl Crossing {
    pub fn any(&self) -> bool {
        self.crosses_a || self.crosses_b
    }
}

// ========== 线段求交 ==========

#[derive(Debug, PartialEq, Eq)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

/// 有序三点 (p, q, r) 的朝向
fn orientation(p: &Point, q: &Point, r: &Point) -> Orientation {
    // f64 计算叉积,像素坐标下不会丢精度
    let value = (q.y as f64 - p.y as f64) * (r.x as f64 - q.x as f64)
        - (q.x as f64 - p.x as f64) * (r.y as f64 - q.y as f64);
    if value == 0.0 {
        Orientation::Collinear
    } else if value > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// 已知 p, q, r 共线时, q 是否落在线段 pr 上 (含端点)
fn on_segment(p: &Point, q: &Point, r: &Point) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

/// 有限线段 p1q1 与 p2q2 是否相交 (共线重叠、端点接触均视为相交)
pub fn segments_intersect(p1: &Point, q1: &Point, p2: &Point, q2: &Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(p1, p2, q1))
        || (o2 == Orientation::Collinear && on_segment(p1, q2, q1))
        || (o3 == Orientation::Collinear && on_segment(p2, p1, q2))
        || (o4 == Orientation::Collinear && on_segment(p2, q1, q2))
}

/// 运动线段 prev→curr 是否穿过边界线
pub fn crosses(prev: &Point, curr: &Point, line: &BoundaryLine) -> bool {
    segments_intersect(prev, curr, &line.start, &line.end)
}

/// 对两条边界线分别做越线判定,未定义的线永远不越
pub fn evaluate(prev: &Point, curr: &Point, lines: &LinePair) -> Crossing {
    Crossing {
        crosses_a: lines.a.as_ref().is_some_and(|line| crosses(prev, curr, line)),
        crosses_b: lines.b.as_ref().is_some_and(|line| crosses(prev, curr, line)),
    }
}
