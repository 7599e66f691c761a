/// 定位结果数据结构
///
/// - `LocationEstimate`: 单次多边定位的输出
/// - `TrackPoint`: 跟踪滤波后发出的轨迹点

use serde::{Deserialize, Serialize};
use std::fmt;

/// 单次定位估计
#[derive(Clone, Debug, PartialEq)]
pub struct LocationEstimate {
    /// X 坐标（米）
    pub x: f64,
    /// Y 坐标（米）
    pub y: f64,
    /// 精度代理（越小越好），无效时为 f64::MAX
    pub accuracy: f64,
    /// 使用的算法名称
    pub method: &'static str,
    /// 时间戳（毫秒）
    pub timestamp_ms: i64,
    /// 参与定位的信标数量
    pub anchor_count: usize,
    /// 加权 RMS 残差，供自适应量测噪声使用
    pub rms: Option<f64>,
    /// 迭代次数（质心为 0）
    pub iterations: usize,
    /// 是否有效，使用 x/y 前必须检查
    pub valid: bool,
    /// 无效原因
    pub reason: Option<String>,
}

impl LocationEstimate {
    /// 创建有效结果
    pub fn new(x: f64, y: f64, accuracy: f64, method: &'static str, anchor_count: usize) -> Self {
        LocationEstimate {
            x,
            y,
            accuracy,
            method,
            timestamp_ms: 0,
            anchor_count,
            rms: None,
            iterations: 0,
            valid: true,
            reason: None,
        }
    }

    /// 创建无效结果（输入不足等），不抛错
    pub fn invalid(method: &'static str, reason: impl Into<String>) -> Self {
        LocationEstimate {
            x: 0.0,
            y: 0.0,
            accuracy: f64::MAX,
            method,
            timestamp_ms: 0,
            anchor_count: 0,
            rms: None,
            iterations: 0,
            valid: false,
            reason: Some(reason.into()),
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 与某点的平面距离
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

impl fmt::Display for LocationEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(
                f,
                "({:.2}, {:.2}) ±{:.2} [{}，{} 个信标]",
                self.x, self.y, self.accuracy, self.method, self.anchor_count
            )
        } else {
            write!(
                f,
                "无效定位 [{}]: {}",
                self.method,
                self.reason.as_deref().unwrap_or("未知原因")
            )
        }
    }
}

/// 跟踪器输出的轨迹点
///
/// x/y 是原始量测坐标，`accepted` 表示该量测是否通过门控并被融合
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    /// 时间戳（毫秒）
    pub time: i64,
    pub x: f64,
    pub y: f64,
    /// 滤波后速度大小（米/秒）
    pub velocity: f64,
    pub accepted: bool,
    pub anchors_used: usize,
    /// 定位残差（未知时为 0）
    pub rms: f64,
    /// 与上一帧的时间间隔（秒）
    pub dt: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_estimate() {
        let e = LocationEstimate::invalid("WLS", "no input");
        assert!(!e.valid);
        assert_eq!(e.accuracy, f64::MAX);
        assert!(e.to_string().contains("no input"));
    }

    #[test]
    fn test_track_point_json_field_names() {
        let p = TrackPoint {
            time: 1,
            x: 2.0,
            y: 3.0,
            velocity: 0.5,
            accepted: true,
            anchors_used: 4,
            rms: 0.2,
            dt: 0.5,
        };
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(json["anchorsUsed"], 4);
        assert_eq!(json["time"], 1);
    }
}
