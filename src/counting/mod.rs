/// 计数核心 (Counting core)
///
/// 检测结果 → 轨迹 → 越线判定 → 双线状态机 → 计数点
/// - Geometry: 运动线段与边界线求交
/// - Crossing: 线A/线B 顺序判定方向 (IN / OUT)
/// - Registry: 用户创建的计数点
/// - Lines:    边界线持久化
/// - Drawing:  两点画线会话
/// - Ledger:   结算台账 (CSV)
pub mod crossing;
pub mod drawing;
pub mod geometry;
pub mod ledger;
pub mod lines;
pub mod registry;

pub use crossing::{CrossingStateMachine, Direction};
pub use drawing::{AddPoint, DrawingSession, DrawingStatus};
pub use geometry::{evaluate, BoundaryLine, Crossing, LinePair, LineRole, Point};
pub use ledger::{CountSink, CsvLedger};
pub use lines::{LineStatus, LineStore};
pub use registry::{normalize_key, DotId, DotRegistry, DotSnapshot, FinishedDot};
