/// 蓝牙信标（锚点）定义和相关数据结构

use crate::algorithms::{AnchorMeasurement, DistanceModel, RssiSmoother};
use crate::error::AnchorIdError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Apple 厂商 ID
pub const APPLE_COMPANY_ID: u16 = 0x004C;

static IBEACON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^ibeacon:([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})-(\d{1,5})-(\d{1,5})$",
    )
    .expect("iBeacon 标识正则非法")
});

static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("MAC 地址正则非法")
});

/// 信标唯一标识
///
/// 文本形式：
/// - iBeacon: `ibeacon:<uuid>-<major>-<minor>`（uuid 小写）
/// - MAC: `AA:BB:CC:DD:EE:FF`（大写）
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnchorId {
    IBeacon { uuid: String, major: u16, minor: u16 },
    Mac(String),
}

impl AnchorId {
    pub fn ibeacon(uuid: &str, major: u16, minor: u16) -> Self {
        AnchorId::IBeacon {
            uuid: uuid.to_lowercase(),
            major,
            minor,
        }
    }

    /// MAC 地址标识，统一为大写
    pub fn mac(addr: &str) -> Self {
        AnchorId::Mac(addr.trim().to_uppercase())
    }

    /// 从 Apple 厂商数据解析 iBeacon 标识
    ///
    /// 格式: `0x02 0x15 | uuid(16) | major(2, BE) | minor(2, BE) | tx_power(1)`
    pub fn from_ibeacon_payload(payload: &[u8]) -> Option<Self> {
        if payload.len() < 23 || payload[0] != 0x02 || payload[1] != 0x15 {
            return None;
        }
        let uuid = format_uuid(&payload[2..18]);
        let major = u16::from_be_bytes([payload[18], payload[19]]);
        let minor = u16::from_be_bytes([payload[20], payload[21]]);
        Some(AnchorId::IBeacon { uuid, major, minor })
    }
}

fn format_uuid(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorId::IBeacon { uuid, major, minor } => {
                write!(f, "ibeacon:{}-{}-{}", uuid, major, minor)
            }
            AnchorId::Mac(mac) => write!(f, "{}", mac),
        }
    }
}

impl FromStr for AnchorId {
    type Err = AnchorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(caps) = IBEACON_RE.captures(s) {
            let major = caps[2]
                .parse::<u16>()
                .map_err(|_| AnchorIdError::OutOfRange(s.to_string()))?;
            let minor = caps[3]
                .parse::<u16>()
                .map_err(|_| AnchorIdError::OutOfRange(s.to_string()))?;
            return Ok(AnchorId::ibeacon(&caps[1], major, minor));
        }
        if MAC_RE.is_match(s) {
            return Ok(AnchorId::mac(s));
        }
        Err(AnchorIdError::Unrecognized(s.to_string()))
    }
}

impl TryFrom<String> for AnchorId {
    type Error = AnchorIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnchorId> for String {
    fn from(id: AnchorId) -> Self {
        id.to_string()
    }
}

/// 单个信标的静态描述（来自配置，运行时只读）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: AnchorId,
    /// 信标友好名称
    #[serde(default)]
    pub name: String,
    /// X 坐标（米）
    pub x: f64,
    /// Y 坐标（米）
    pub y: f64,
}

impl Anchor {
    pub fn new(id: AnchorId, name: impl Into<String>, x: f64, y: f64) -> Self {
        Anchor {
            id,
            name: name.into(),
            x,
            y,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 与某点的平面距离
    pub fn distance_to_point(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

/// 信标集合
#[derive(Clone, Debug, Default)]
pub struct AnchorSet {
    anchors: HashMap<AnchorId, Anchor>,
}

impl AnchorSet {
    pub fn new() -> Self {
        AnchorSet {
            anchors: HashMap::new(),
        }
    }

    /// 从信标向量创建集合
    pub fn from_vec(anchors: Vec<Anchor>) -> Self {
        let mut set = AnchorSet::new();
        for anchor in anchors {
            set.add(anchor);
        }
        set
    }

    /// 添加信标（同 id 覆盖）
    pub fn add(&mut self, anchor: Anchor) {
        self.anchors.insert(anchor.id.clone(), anchor);
    }

    pub fn get(&self, id: &AnchorId) -> Option<&Anchor> {
        self.anchors.get(id)
    }

    pub fn contains(&self, id: &AnchorId) -> bool {
        self.anchors.contains_key(id)
    }

    pub fn remove(&mut self, id: &AnchorId) -> Option<Anchor> {
        self.anchors.remove(id)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnchorId, &Anchor)> {
        self.anchors.iter()
    }
}

/// 单个信标在一次定位会话中的运行时状态
///
/// 首次被扫描到时创建，会话结束时丢弃
pub struct AnchorRuntime {
    pub anchor: Anchor,
    smoother: Box<dyn RssiSmoother + Send>,
    /// 平滑后的 RSSI
    pub smoothed_rssi: f64,
    /// 由平滑 RSSI 推出的距离（米）
    pub distance: f64,
    /// 最近一次采样时间（毫秒）
    pub last_seen_ms: i64,
    /// 累计采样数
    pub samples: u64,
}

impl AnchorRuntime {
    pub fn new(anchor: Anchor, smoother: Box<dyn RssiSmoother + Send>) -> Self {
        AnchorRuntime {
            anchor,
            smoother,
            smoothed_rssi: f64::NEG_INFINITY,
            distance: f64::INFINITY,
            last_seen_ms: i64::MIN,
            samples: 0,
        }
    }

    /// 输入一个原始采样，刷新平滑值和距离
    pub fn observe(&mut self, rssi: f64, timestamp_ms: i64, model: &dyn DistanceModel) {
        self.smoother.feed(rssi);
        if let Some(smoothed) = self.smoother.value() {
            self.smoothed_rssi = smoothed;
            self.distance = model.estimate_distance(smoothed);
        }
        self.last_seen_ms = self.last_seen_ms.max(timestamp_ms);
        self.samples += 1;
    }

    /// 转为多边定位的输入
    pub fn measurement(&self) -> AnchorMeasurement {
        AnchorMeasurement {
            x: self.anchor.x,
            y: self.anchor.y,
            distance: self.distance,
            rssi: self.smoothed_rssi,
        }
    }
}

impl fmt::Debug for AnchorRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchorRuntime")
            .field("anchor", &self.anchor.id)
            .field("smoothed_rssi", &self.smoothed_rssi)
            .field("distance", &self.distance)
            .field("last_seen_ms", &self.last_seen_ms)
            .field("samples", &self.samples)
            .finish()
    }
}
