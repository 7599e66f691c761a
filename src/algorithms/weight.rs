/// 融合权重函数

use serde::{Deserialize, Serialize};

/// (距离, RSSI) → 融合权重，结果非负
pub trait WeightFunction {
    fn weight(&self, distance: f64, rssi: f64) -> f64;
}

/// 截断反距离权重: `w = A / (d^p + B)`
///
/// B 保证距离趋近 0 时权重有界，远处信标权重衰减
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClippedInverseDistance {
    pub p: f64,
    pub a: f64,
    pub b: f64,
}

impl ClippedInverseDistance {
    pub fn new(p: f64, a: f64, b: f64) -> Self {
        ClippedInverseDistance { p, a, b }
    }
}

impl Default for ClippedInverseDistance {
    fn default() -> Self {
        ClippedInverseDistance::new(2.0, 1.0, 1.0)
    }
}

impl WeightFunction for ClippedInverseDistance {
    fn weight(&self, distance: f64, _rssi: f64) -> f64 {
        (self.a / (distance.powf(self.p) + self.b)).max(0.0)
    }
}

impl<W: WeightFunction + ?Sized> WeightFunction for &W {
    fn weight(&self, distance: f64, rssi: f64) -> f64 {
        (**self).weight(distance, rssi)
    }
}
