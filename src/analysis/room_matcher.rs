/// 点 → 房间匹配
///
/// 两阶段：
/// 1. R 树查询包围盒包含该点的房间，点被缓冲多边形覆盖或距其不超过边界容差即命中；
///    多个命中时取到原始多边形最近者，再按房间 id 升序
/// 2. 无命中时线性扫描全部房间，取缓冲多边形最近者，距离不超过回退阈值才接受

use crate::analysis::geometry::distance_to_polygon;
use crate::analysis::{RawPoint, RoomGeom, RoomIndex, TaggedPoint};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 房间匹配配置
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// 房间边界向外缓冲距离（米）
    pub room_buffer_m: f64,
    /// 边界容差（米）
    pub boundary_eps_m: f64,
    /// 最近房间回退阈值（米）
    pub fallback_max_m: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            room_buffer_m: 0.5,
            boundary_eps_m: 0.15,
            fallback_max_m: 0.3,
        }
    }
}

/// 房间匹配器
#[derive(Clone, Debug)]
pub struct RoomMatcher {
    index: Arc<RoomIndex>,
    config: MatchConfig,
}

impl RoomMatcher {
    pub fn new(index: Arc<RoomIndex>, config: MatchConfig) -> Self {
        RoomMatcher { index, config }
    }

    pub fn index(&self) -> &RoomIndex {
        &self.index
    }

    /// 匹配单个坐标，返回房间 id
    pub fn match_xy(&self, x: f64, y: f64) -> Option<&str> {
        let hit = self
            .index
            .candidates(x, y)
            .filter(|rg| distance_to_polygon(&rg.buffered, x, y) <= self.config.boundary_eps_m)
            .map(|rg| (distance_to_polygon(&rg.polygon, x, y), rg))
            .min_by(|a, b| by_distance_then_id(a, b));

        if let Some((_, rg)) = hit {
            return Some(rg.room_id.as_str());
        }

        let (dist, nearest) = self
            .index
            .rooms()
            .iter()
            .map(|rg| (distance_to_polygon(&rg.buffered, x, y), rg))
            .min_by(|a, b| by_distance_then_id(a, b))?;

        if dist <= self.config.fallback_max_m {
            log::debug!(
                "点 ({:.2}, {:.2}) 回退匹配到最近房间 {}，距离 {:.3} m",
                x,
                y,
                nearest.room_id,
                dist
            );
            Some(nearest.room_id.as_str())
        } else {
            None
        }
    }

    /// 匹配单个点
    pub fn match_point(&self, point: &RawPoint) -> TaggedPoint {
        let room = self.match_xy(point.x, point.y).map(str::to_string);
        TaggedPoint::new(point.time, point.x, point.y, room)
    }

    /// 批量匹配，保持输入顺序
    pub fn match_points(&self, points: &[RawPoint]) -> Vec<TaggedPoint> {
        let tagged: Vec<TaggedPoint> = points.iter().map(|p| self.match_point(p)).collect();
        let unmatched = tagged.iter().filter(|p| p.room.is_none()).count();
        log::info!("房间匹配完成: {} 个点，{} 个未匹配", tagged.len(), unmatched);
        tagged
    }
}

fn by_distance_then_id(a: &(f64, &RoomGeom), b: &(f64, &RoomGeom)) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.room_id.cmp(&b.1.room_id))
}
