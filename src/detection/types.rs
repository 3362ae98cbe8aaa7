/// 上游检测/跟踪数据结构定义
/// Data structures produced by the upstream detector + tracker
use serde::{Deserialize, Serialize};

use crate::counting::geometry::Point;

// ========== 类型别名 ==========

/// 上游跟踪器给出的目标ID
pub type TrackId = i64;

// ========== 数据结构 ==========

/// 检测框 (轴对齐矩形),序列化为 `[x1, y1, x2, y2]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 中心点 (像素取整,与画线坐标同一网格)
    pub fn center(&self) -> Point {
        let cx = ((self.x1 + self.x2) / 2.0).floor();
        let cy = ((self.y1 + self.y2) / 2.0).floor();
        Point::new(cx, cy)
    }
}

impl From<[f32; 4]> for BBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// 单个已跟踪检测
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: TrackId,
    pub label: String,
    #[serde(rename = "box")]
    pub bbox: BBox,
}

impl Detection {
    pub fn new(track_id: TrackId, label: impl Into<String>, bbox: BBox) -> Self {
        Self {
            track_id,
            label: label.into(),
            bbox,
        }
    }

    /// 类别名包含过滤子串 (不区分大小写); 空过滤串匹配全部
    pub fn matches_class(&self, filter_lower: &str) -> bool {
        filter_lower.is_empty() || self.label.to_lowercase().contains(filter_lower)
    }
}

/// 一帧的检测结果 (检测线程 → 计数会话)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub frame_id: u64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}
