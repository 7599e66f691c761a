/// 房间空间索引
///
/// 每张地图构建一次：房间多边形 → 向外缓冲 → 校验 → 包围盒插入 R 树。
/// 构建后只读，可通过 `Arc` 在多个匹配器之间共享。

use crate::analysis::geometry::{buffer_polygon, room_polygon};
use crate::analysis::{FloorMap, MatchConfig};
use crate::error::MapError;
use geo::{BoundingRect, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashSet;

/// 单个房间的几何信息
#[derive(Clone, Debug)]
pub struct RoomGeom {
    pub room_id: String,
    pub name: String,
    /// 原始多边形
    pub polygon: Polygon<f64>,
    /// 缓冲后的多边形
    pub buffered: Polygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RoomGeom {
    pub fn envelope_corners(&self) -> ([f64; 2], [f64; 2]) {
        (self.envelope.lower(), self.envelope.upper())
    }
}

impl RTreeObject for RoomGeom {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// 房间索引
#[derive(Debug)]
pub struct RoomIndex {
    tree: RTree<RoomGeom>,
    /// 按房间 id 升序
    rooms: Vec<RoomGeom>,
    map_id: String,
}

impl RoomIndex {
    /// 从地图构建索引，任何房间不合法都会导致整体失败
    pub fn build(map: &FloorMap, config: &MatchConfig) -> Result<Self, MapError> {
        if map.rooms.is_empty() {
            return Err(MapError::NoRooms);
        }

        let mut seen = HashSet::new();
        let mut rooms = Vec::with_capacity(map.rooms.len());
        for room in &map.rooms {
            if !seen.insert(room.id.as_str()) {
                return Err(MapError::DuplicateRoom(room.id.clone()));
            }

            let polygon = room_polygon(room)?;
            let buffered = buffer_polygon(&polygon, config.room_buffer_m).ok_or_else(|| {
                MapError::InvalidBuffer {
                    room_id: room.id.clone(),
                }
            })?;
            let rect = buffered
                .bounding_rect()
                .ok_or_else(|| MapError::DegeneratePolygon {
                    room_id: room.id.clone(),
                })?;

            rooms.push(RoomGeom {
                room_id: room.id.clone(),
                name: room.name.clone(),
                polygon,
                buffered,
                envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            });
        }
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));

        let tree = RTree::bulk_load(rooms.clone());
        log::info!(
            "地图 {} 房间索引构建完成: {} 个房间，缓冲 {} m",
            map.map_id,
            rooms.len(),
            config.room_buffer_m
        );
        Ok(RoomIndex {
            tree,
            rooms,
            map_id: map.map_id.clone(),
        })
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// 所有房间（按 id 升序）
    pub fn rooms(&self) -> &[RoomGeom] {
        &self.rooms
    }

    pub fn room(&self, room_id: &str) -> Option<&RoomGeom> {
        self.rooms
            .binary_search_by(|r| r.room_id.as_str().cmp(room_id))
            .ok()
            .map(|i| &self.rooms[i])
    }

    /// 包围盒包含该点的房间
    pub fn candidates(&self, x: f64, y: f64) -> impl Iterator<Item = &RoomGeom> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
    }
}
