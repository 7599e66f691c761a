/// 楼层地图数据模型（JSON）

use crate::error::MapError;
use serde::{Deserialize, Serialize};

/// 多边形顶点（米）
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Vertex { x, y }
    }
}

/// 房间：id + 名称 + 多边形顶点（不要求首尾闭合）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

impl Room {
    pub fn new(id: impl Into<String>, name: impl Into<String>, vertices: Vec<Vertex>) -> Self {
        Room {
            id: id.into(),
            name: name.into(),
            vertices,
        }
    }

    /// 轴对齐矩形房间
    pub fn rect(id: impl Into<String>, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let id = id.into();
        Room {
            name: id.clone(),
            id,
            vertices: vec![
                Vertex::new(min_x, min_y),
                Vertex::new(max_x, min_y),
                Vertex::new(max_x, max_y),
                Vertex::new(min_x, max_y),
            ],
        }
    }
}

/// 地图元信息
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapMeta {
    pub map_version: Option<String>,
    pub author: Option<String>,
    pub created_at: Option<String>,
}

/// 楼层地图
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorMap {
    pub map_id: String,
    pub floor_id: String,
    pub building_id: String,
    pub name: String,
    pub description: String,
    pub units: String,
    pub crs: String,
    pub rooms: Vec<Room>,
    pub meta: Option<MapMeta>,
}

impl FloorMap {
    /// 解析地图 JSON，未知字段忽略
    pub fn from_json_str(json: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }
}
