/// 检测输入 (Detection input)
///
/// 上游检测器+跟踪器的输出契约,以及本地轨迹历史
/// - Types:   每帧 (trackID, 类别, 检测框)
/// - Tracker: 每个目标的有限长度轨迹
pub mod tracker;
pub mod types;

pub use tracker::{Movement, TrackHistoryStore, TrackSnapshot};
pub use types::{BBox, Detection, DetectionFrame, TrackId};
