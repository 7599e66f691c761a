/// RSSI 到距离转换模型
///
/// 对数距离路径损耗模型:
///
/// `d = 10^((ref_rssi - rssi) / (10 * n))`
///
/// - `ref_rssi`: 1 米处校准的 RSSI (dBm)
/// - `n`: 路径损耗指数（开阔空间约 2.0）

use serde::{Deserialize, Serialize};
use std::fmt;

/// 默认 1 米参考功率 (dBm)
pub const DEFAULT_REF_RSSI: f64 = -59.0;
/// 默认路径损耗指数
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.0;

/// RSSI 转距离接口
pub trait DistanceModel {
    /// 根据平滑后的 RSSI 估计距离（米）
    fn estimate_distance(&self, smoothed_rssi: f64) -> f64;
}

/// 对数距离模型
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogDistanceModel {
    /// 1 米处参考功率 (dBm)
    pub ref_rssi: f64,
    /// 路径损耗指数 n
    pub path_loss_exponent: f64,
}

impl LogDistanceModel {
    pub fn new(ref_rssi: f64, path_loss_exponent: f64) -> Self {
        LogDistanceModel {
            ref_rssi,
            path_loss_exponent,
        }
    }

    /// 根据距离反推 RSSI
    pub fn distance_to_rssi(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return f64::INFINITY;
        }
        self.ref_rssi - 10.0 * self.path_loss_exponent * distance.log10()
    }

    /// 验证模型参数的合理性
    pub fn validate(&self) -> Result<(), String> {
        if !(self.path_loss_exponent > 0.0) {
            return Err("路径损耗指数 n 必须为正数".to_string());
        }
        if self.ref_rssi >= 0.0 {
            return Err("参考功率应为负数（以 dBm 表示）".to_string());
        }
        Ok(())
    }

    /// 获取模型描述
    pub fn description(&self) -> String {
        format!(
            "对数距离模型 - ref={:.2} dBm, n={:.2}",
            self.ref_rssi, self.path_loss_exponent
        )
    }
}

impl Default for LogDistanceModel {
    fn default() -> Self {
        LogDistanceModel::new(DEFAULT_REF_RSSI, DEFAULT_PATH_LOSS_EXPONENT)
    }
}

impl DistanceModel for LogDistanceModel {
    fn estimate_distance(&self, smoothed_rssi: f64) -> f64 {
        10_f64.powf((self.ref_rssi - smoothed_rssi) / (10.0 * self.path_loss_exponent))
    }
}

impl fmt::Display for LogDistanceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
