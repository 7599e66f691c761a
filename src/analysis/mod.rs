/// 批处理分析模块
///
/// 服务端离线分析：
/// - 批次合并、排序、去重、过滤
/// - 楼层地图加载与房间空间索引
/// - 点 → 房间匹配
/// - 迟滞分段、短停留合并
/// - 房间切换提取与统计

pub mod bundle;
pub mod floor_map;
pub mod geometry;
pub mod points;
pub mod preprocessing;
pub mod room_index;
pub mod room_matcher;
pub mod segments;
pub mod transitions;

pub use bundle::*;
pub use floor_map::*;
pub use points::*;
pub use preprocessing::*;
pub use room_index::*;
pub use room_matcher::*;
pub use segments::*;
pub use transitions::*;
