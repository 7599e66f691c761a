/// 多边定位算法
///
/// 两阶段求解：
/// - 加权质心：快速给出初值
/// - 迭代加权最小二乘（Gauss-Newton）：在质心基础上精化
///
/// 输入不足或数值退化时返回无效结果，不抛错

use crate::algorithms::{ClippedInverseDistance, LocationEstimate, WeightFunction};
use serde::{Deserialize, Serialize};

/// 最小距离，避免除零
const MIN_DISTANCE: f64 = 1e-6;
/// 最小二乘权重下限
const MIN_WEIGHT: f64 = 1e-9;
/// 法方程行列式阈值，低于此值视为奇异
const SINGULAR_DET: f64 = 1e-9;

// ============================================================================
// 输入数据结构
// ============================================================================

/// 单个信标的定位输入：信标位置 + 量测距离 + 平滑 RSSI
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorMeasurement {
    pub x: f64,
    pub y: f64,
    /// 量测距离（米）
    pub distance: f64,
    /// 平滑后的 RSSI (dBm)
    pub rssi: f64,
}

impl AnchorMeasurement {
    pub fn new(x: f64, y: f64, distance: f64, rssi: f64) -> Self {
        AnchorMeasurement { x, y, distance, rssi }
    }
}

/// 定位估计器接口
pub trait LocationEstimator {
    fn estimate(&self, measurements: &[AnchorMeasurement], timestamp_ms: i64) -> LocationEstimate;
}

// ============================================================================
// 加权质心
// ============================================================================

/// 加权质心估计器
#[derive(Clone, Debug, Default)]
pub struct WeightedCentroid<W = ClippedInverseDistance> {
    weight: W,
}

impl<W: WeightFunction> WeightedCentroid<W> {
    pub fn new(weight: W) -> Self {
        WeightedCentroid { weight }
    }
}

impl<W: WeightFunction> LocationEstimator for WeightedCentroid<W> {
    fn estimate(&self, measurements: &[AnchorMeasurement], timestamp_ms: i64) -> LocationEstimate {
        if measurements.is_empty() {
            return LocationEstimate::invalid("WeightedCentroid", "no input");
        }

        let mut wx = 0.0;
        let mut wy = 0.0;
        let mut wsum = 0.0;
        let mut wdist = 0.0;
        for m in measurements {
            let distance = m.distance.max(MIN_DISTANCE);
            let w = self.weight.weight(distance, m.rssi);
            wx += w * m.x;
            wy += w * m.y;
            wsum += w;
            wdist += w * distance;
        }
        if wsum == 0.0 {
            return LocationEstimate::invalid("WeightedCentroid", "zero weight");
        }

        LocationEstimate::new(
            wx / wsum,
            wy / wsum,
            wdist / wsum,
            "WeightedCentroid",
            measurements.len(),
        )
        .with_timestamp(timestamp_ms)
    }
}

// ============================================================================
// 迭代加权最小二乘
// ============================================================================

/// 迭代加权最小二乘估计器（至少 3 个信标）
#[derive(Clone, Debug)]
pub struct WeightedLeastSquares<W = ClippedInverseDistance> {
    weight: W,
    max_iterations: usize,
    /// 步长平方收敛阈值
    convergence: f64,
}

impl Default for WeightedLeastSquares<ClippedInverseDistance> {
    fn default() -> Self {
        WeightedLeastSquares::new(ClippedInverseDistance::default())
    }
}

impl<W: WeightFunction> WeightedLeastSquares<W> {
    pub fn new(weight: W) -> Self {
        WeightedLeastSquares {
            weight,
            max_iterations: 5,
            convergence: 1e-6,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// 加权 RMS 残差 `sqrt(Σw·e² / Σw)`
    pub fn weighted_rms_residual(&self, x: f64, y: f64, measurements: &[AnchorMeasurement]) -> Option<f64> {
        let mut num = 0.0;
        let mut den = 0.0;
        for m in measurements {
            let e = (x - m.x).hypot(y - m.y) - m.distance;
            let w = self.weight.weight(m.distance, m.rssi).max(MIN_WEIGHT);
            num += w * e * e;
            den += w;
        }
        if den > 0.0 { Some((num / den).sqrt()) } else { None }
    }
}

impl<W: WeightFunction> LocationEstimator for WeightedLeastSquares<W> {
    fn estimate(&self, measurements: &[AnchorMeasurement], timestamp_ms: i64) -> LocationEstimate {
        if measurements.len() < 3 {
            return LocationEstimate::invalid("WLS", "fewer than 3 anchors");
        }

        let initial = WeightedCentroid::new(&self.weight).estimate(measurements, timestamp_ms);
        if !initial.valid {
            return LocationEstimate::invalid("WLS", "initial centroid failed");
        }

        let (mut x, mut y) = initial.xy();
        let mut iterations = 0;

        for _ in 0..self.max_iterations {
            let (mut axx, mut axy, mut ayy) = (0.0, 0.0, 0.0);
            let (mut bx, mut by) = (0.0, 0.0);

            for m in measurements {
                let dx = x - m.x;
                let dy = y - m.y;
                let d = dx.hypot(dy).max(MIN_DISTANCE);
                let err = d - m.distance;
                let gx = dx / d;
                let gy = dy / d;
                let w = self.weight.weight(m.distance, m.rssi).max(MIN_WEIGHT);

                // A += w·g·gᵗ, b += w·g·e
                axx += w * gx * gx;
                axy += w * gx * gy;
                ayy += w * gy * gy;
                bx += w * gx * err;
                by += w * gy * err;
            }

            let det = axx * ayy - axy * axy;
            if det.abs() < SINGULAR_DET {
                log::debug!("WLS 法方程奇异 (det={:.3e})，停止迭代", det);
                break;
            }

            let step_x = (ayy * bx - axy * by) / det;
            let step_y = (axx * by - axy * bx) / det;
            x -= step_x;
            y -= step_y;
            iterations += 1;

            if step_x * step_x + step_y * step_y < self.convergence {
                break;
            }
        }

        let err_sum: f64 = measurements
            .iter()
            .map(|m| {
                let e = (x - m.x).hypot(y - m.y) - m.distance;
                e * e
            })
            .sum();
        let accuracy = (err_sum / measurements.len() as f64).sqrt();

        let mut estimate = LocationEstimate::new(x, y, accuracy, "WLS", measurements.len())
            .with_timestamp(timestamp_ms);
        estimate.rms = self.weighted_rms_residual(x, y, measurements);
        estimate.iterations = iterations;
        estimate
    }
}

// ============================================================================
// 估计器选择
// ============================================================================

/// 定位估计器选择（构造时确定）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Centroid,
    #[default]
    Wls,
}

impl EstimatorKind {
    pub fn create(self, weight: ClippedInverseDistance) -> Box<dyn LocationEstimator + Send + Sync> {
        match self {
            EstimatorKind::Centroid => Box::new(WeightedCentroid::new(weight)),
            EstimatorKind::Wls => Box::new(WeightedLeastSquares::new(weight)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise_free(target: (f64, f64), anchors: &[(f64, f64)]) -> Vec<AnchorMeasurement> {
        anchors
            .iter()
            .map(|&(ax, ay)| {
                AnchorMeasurement::new(ax, ay, (target.0 - ax).hypot(target.1 - ay), -60.0)
            })
            .collect()
    }

    #[test]
    fn test_centroid_empty_is_invalid() {
        let e = WeightedCentroid::<ClippedInverseDistance>::default().estimate(&[], 0);
        assert!(!e.valid);
        assert_eq!(e.reason.as_deref(), Some("no input"));
    }

    #[test]
    fn test_centroid_symmetric_anchors() {
        let ms = noise_free((3.0, 3.0), &[(0.0, 0.0), (6.0, 0.0), (0.0, 6.0), (6.0, 6.0)]);
        let e = WeightedCentroid::<ClippedInverseDistance>::default().estimate(&ms, 42);
        assert!(e.valid);
        assert!((e.x - 3.0).abs() < 1e-9 && (e.y - 3.0).abs() < 1e-9);
        assert_eq!(e.timestamp_ms, 42);
        assert!((e.accuracy - 18f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_centroid_zero_weight_is_invalid() {
        let zero = ClippedInverseDistance::new(2.0, 0.0, 1.0);
        let ms = noise_free((1.0, 1.0), &[(0.0, 0.0), (2.0, 0.0)]);
        let e = WeightedCentroid::new(zero).estimate(&ms, 0);
        assert!(!e.valid);
    }

    #[test]
    fn test_wls_needs_three_anchors() {
        let ms = noise_free((1.0, 1.0), &[(0.0, 0.0), (2.0, 0.0)]);
        let e = WeightedLeastSquares::default().estimate(&ms, 0);
        assert!(!e.valid);
    }

    #[test]
    fn test_wls_converges_noise_free() {
        let cases: [((f64, f64), Vec<(f64, f64)>); 3] = [
            ((2.0, 3.0), vec![(0.0, 0.0), (6.0, 0.0), (0.0, 6.0), (6.0, 6.0)]),
            ((1.5, 1.0), vec![(0.0, 0.0), (5.0, 0.0), (2.0, 4.0)]),
            ((4.0, 2.5), vec![(0.0, 0.0), (8.0, 0.0), (8.0, 6.0), (0.0, 6.0), (4.0, 7.0)]),
        ];
        for (target, anchors) in cases {
            let ms = noise_free(target, &anchors);
            let e = WeightedLeastSquares::default().estimate(&ms, 0);
            assert!(e.valid);
            assert!(e.distance_to(target.0, target.1) < 1e-3, "{} vs {:?}", e, target);
            assert!(e.iterations <= 5);
            assert!(e.accuracy < 1e-3);
            assert!(e.rms.unwrap() < 1e-3);
            assert_eq!(e.anchor_count, anchors.len());
        }
    }

    #[test]
    fn test_wls_collinear_anchors_degrade() {
        // 共线信标在质心处梯度全部平行，法方程奇异
        let ms = vec![
            AnchorMeasurement::new(0.0, 0.0, 1.0, -60.0),
            AnchorMeasurement::new(1.0, 0.0, 1.0, -60.0),
            AnchorMeasurement::new(2.0, 0.0, 1.0, -60.0),
        ];
        let e = WeightedLeastSquares::default().estimate(&ms, 0);
        assert!(e.valid);
        assert!(e.x.is_finite() && e.y.is_finite());
    }

    #[test]
    fn test_estimator_kind_factory() {
        let ms = noise_free((2.0, 3.0), &[(0.0, 0.0), (6.0, 0.0), (0.0, 6.0), (6.0, 6.0)]);
        let wls = EstimatorKind::Wls.create(ClippedInverseDistance::default());
        let centroid = EstimatorKind::Centroid.create(ClippedInverseDistance::default());
        assert_eq!(wls.estimate(&ms, 0).method, "WLS");
        assert_eq!(centroid.estimate(&ms, 0).method, "WeightedCentroid");
    }
}
