/// 批处理分析的点数据结构
///
/// - `RawPoint`: 上传批次中的原始轨迹点
/// - `TaggedPoint`: 匹配房间后的点
/// - `Batch`: 一次上传的点批次

use crate::algorithms::TrackPoint;
use crate::positioning::TrackBatch;
use serde::{Deserialize, Serialize};

/// 原始轨迹点（创建后不可变）
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    /// 时间戳（毫秒）
    pub time: i64,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub velocity: f64,
    #[serde(default)]
    pub accepted: bool,
    #[serde(default)]
    pub anchors_used: usize,
    #[serde(default)]
    pub rms: f64,
    #[serde(default)]
    pub dt: f64,
}

impl From<TrackPoint> for RawPoint {
    fn from(p: TrackPoint) -> Self {
        RawPoint {
            time: p.time,
            x: p.x,
            y: p.y,
            velocity: p.velocity,
            accepted: p.accepted,
            anchors_used: p.anchors_used,
            rms: p.rms,
            dt: p.dt,
        }
    }
}

/// 标注了房间的点，`room` 为 None 表示未匹配
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggedPoint {
    pub time: i64,
    pub x: f64,
    pub y: f64,
    pub room: Option<String>,
}

impl TaggedPoint {
    pub fn new(time: i64, x: f64, y: f64, room: Option<String>) -> Self {
        TaggedPoint { time, x, y, room }
    }
}

/// 上传批次
///
/// `points` 可能为 null
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Batch {
    pub batch_id: String,
    pub device_id: String,
    pub session_id: String,
    pub source: String,
    pub coord_ref: String,
    pub points: Option<Vec<RawPoint>>,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub count: usize,
    pub building_id: String,
    pub floor_id: String,
    pub map_id: String,
}

impl Batch {
    /// 批次中的点（null 视为空）
    pub fn points(&self) -> &[RawPoint] {
        self.points.as_deref().unwrap_or(&[])
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<TrackBatch> for Batch {
    fn from(b: TrackBatch) -> Self {
        Batch {
            batch_id: b.batch_id,
            device_id: b.device_id,
            session_id: b.session_id,
            source: b.source,
            coord_ref: b.coord_ref,
            points: Some(b.points.into_iter().map(RawPoint::from).collect()),
            start_time_ms: b.start_time_ms,
            end_time_ms: b.end_time_ms,
            count: b.count,
            building_id: b.building_id,
            floor_id: b.floor_id,
            map_id: b.map_id,
        }
    }
}
