//! 画线会话 (Line drawing session)
//!
//! 全局唯一: 开始画线 → 依次点击两个点 → 提交为一条边界线。

use serde::Serialize;

use super::geometry::{BoundaryLine, LineRole, Point};

/// 添加点的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddPoint {
    /// 未在画线,忽略
    Ignored,
    /// 已收到的点数 (尚未凑齐两点)
    Added(usize),
    /// 凑齐两点,会话结束
    Completed(LineRole, BoundaryLine),
}

/// 画线状态 (用于显示)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawingStatus {
    pub drawing: bool,
    pub line_number: u8,
    pub points: Vec<Point>,
}

#[derive(Debug)]
pub struct DrawingSession {
    active: bool,
    role: LineRole,
    points: Vec<Point>,
}

impl Default for DrawingSession {
    fn default() -> Self {
        Self {
            active: false,
            role: LineRole::A,
            points: Vec::with_capacity(2),
        }
    }
}

impl DrawingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始画线,丢弃之前未完成的点
    pub fn start(&mut self, role: LineRole) {
        self.active = true;
        self.role = role;
        self.points.clear();
    }

    /// 添加一个点; `role` 为空时使用开始画线时指定的线
    pub fn add_point(&mut self, point: Point, role: Option<LineRole>) -> AddPoint {
        if !self.active {
            return AddPoint::Ignored;
        }

        self.points.push(point);
        if self.points.len() < 2 {
            return AddPoint::Added(self.points.len());
        }

        let line = BoundaryLine::new(self.points[0], self.points[1]);
        let role = role.unwrap_or(self.role);
        self.reset();
        AddPoint::Completed(role, line)
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.points.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self) -> DrawingStatus {
        DrawingStatus {
            drawing: self.active,
            line_number: self.role.number(),
            points: self.points.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_points_complete_line() {
        let mut session = DrawingSession::new();
        session.start(LineRole::B);
        assert_eq!(
            session.add_point(Point::new(1.0, 2.0), None),
            AddPoint::Added(1)
        );
        let done = session.add_point(Point::new(3.0, 4.0), None);
        assert_eq!(
            done,
            AddPoint::Completed(
                LineRole::B,
                BoundaryLine::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0))
            )
        );
        assert!(!session.is_active());
        assert!(session.status().points.is_empty());
    }

    #[test]
    fn test_not_drawing_is_ignored() {
        let mut session = DrawingSession::new();
        assert_eq!(
            session.add_point(Point::new(1.0, 2.0), Some(LineRole::A)),
            AddPoint::Ignored
        );
        assert!(session.status().points.is_empty());
    }

    #[test]
    fn test_restart_discards_partial_points() {
        let mut session = DrawingSession::new();
        session.start(LineRole::A);
        session.add_point(Point::new(1.0, 1.0), None);
        session.start(LineRole::A);
        assert!(session.status().points.is_empty());
        assert_eq!(
            session.add_point(Point::new(5.0, 5.0), None),
            AddPoint::Added(1)
        );
    }

    #[test]
    fn test_role_from_completing_call_wins() {
        let mut session = DrawingSession::new();
        session.start(LineRole::A);
        session.add_point(Point::new(0.0, 0.0), Some(LineRole::B));
        match session.add_point(Point::new(1.0, 0.0), Some(LineRole::B)) {
            AddPoint::Completed(role, _) => assert_eq!(role, LineRole::B),
            other => panic!("unexpected {:?}", other),
        }
    }
}
