/// 错误类型定义
///
/// 定位与分析核心大多以"无效结果"或"过滤"方式降级，
/// 只有地图完整性、配置和信标标识解析会返回错误。

use thiserror::Error;

/// 地图加载 / 房间索引构建错误（致命，损坏的地图不能用于匹配）
#[derive(Debug, Error)]
pub enum MapError {
    #[error("地图中没有房间")]
    NoRooms,

    #[error("房间 {room_id} 顶点不足 3 个（实际 {count} 个）")]
    TooFewVertices { room_id: String, count: usize },

    #[error("房间 {room_id} 多边形退化（面积为零或顶点共线）")]
    DegeneratePolygon { room_id: String },

    #[error("房间 {room_id} 缓冲后的多边形无效（边界自相交）")]
    InvalidBuffer { room_id: String },

    #[error("房间 id 重复: {0}")]
    DuplicateRoom(String),

    #[error("地图 JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置 JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 信标标识解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnchorIdError {
    #[error("无法识别的信标标识: {0}")]
    Unrecognized(String),

    #[error("iBeacon major/minor 超出范围: {0}")]
    OutOfRange(String),
}
