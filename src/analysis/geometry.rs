/// 平面多边形工具
///
/// - 由房间顶点构造闭合多边形
/// - 向外缓冲（斜切拐角），结果须为合法多边形
/// - 点到多边形距离

use crate::analysis::Room;
use crate::error::MapError;
use geo::algorithm::buffer::{Buffer, BufferStyle, LineJoin};
use geo::algorithm::orient::{Direction, Orient};
use geo::{
    Area, Coord, Distance, Euclidean, LineString, Point, Polygon, RemoveRepeatedPoints, Validation,
};

/// 面积小于此值视为退化
pub const MIN_AREA: f64 = 1e-9;

/// 房间顶点 → 闭合多边形（外环逆时针）
///
/// 连续重复顶点被合并；少于 3 个不同顶点或面积为零时返回错误
pub fn room_polygon(room: &Room) -> Result<Polygon<f64>, MapError> {
    if room.vertices.len() < 3 {
        return Err(MapError::TooFewVertices {
            room_id: room.id.clone(),
            count: room.vertices.len(),
        });
    }

    let ring: LineString<f64> = room
        .vertices
        .iter()
        .map(|v| Coord { x: v.x, y: v.y })
        .collect::<Vec<_>>()
        .into();
    let ring = ring.remove_repeated_points();
    let distinct = if ring.is_closed() {
        ring.0.len().saturating_sub(1)
    } else {
        ring.0.len()
    };
    if distinct < 3 {
        return Err(MapError::TooFewVertices {
            room_id: room.id.clone(),
            count: distinct,
        });
    }

    let polygon = Polygon::new(ring, vec![]).orient(Direction::Default);
    if polygon.unsigned_area() < MIN_AREA {
        return Err(MapError::DegeneratePolygon {
            room_id: room.id.clone(),
        });
    }
    Ok(polygon)
}

/// 多边形向外缓冲 `distance` 米，拐角斜切
///
/// 窄于两倍缓冲距离的凹口会被填平。结果不是单个合法多边形时返回 None。
pub fn buffer_polygon(polygon: &Polygon<f64>, distance: f64) -> Option<Polygon<f64>> {
    if distance <= 0.0 {
        return Some(polygon.clone());
    }

    let style = BufferStyle::new(distance).line_join(LineJoin::Bevel);
    let mut parts = polygon.buffer_with_style(style).0;
    if parts.len() != 1 {
        log::warn!("缓冲结果包含 {} 个多边形", parts.len());
        return None;
    }
    let buffered = parts.pop()?;
    (buffered.unsigned_area() >= MIN_AREA && buffered.is_valid()).then_some(buffered)
}

/// 点到多边形的距离，多边形覆盖该点（含边界）时为 0
pub fn distance_to_polygon(polygon: &Polygon<f64>, x: f64, y: f64) -> f64 {
    Euclidean.distance(&Point::new(x, y), polygon)
}
