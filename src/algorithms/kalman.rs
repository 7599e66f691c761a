/// 2D 匀速模型自适应卡尔曼跟踪器
///
/// - 状态: [x, y, vx, vy]
/// - 量测: 多边定位输出的 (x, y)
/// - 支持可变 dt、自适应 R（按信标数 / 残差缩放）、马氏距离门控
///
/// 每个跟踪对象持有一个实例，只由 `step` 修改

use crate::algorithms::TrackPoint;
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

/// 跟踪器参数
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 基础量测标准差（米）
    pub meas_std_base: f64,
    /// 过程噪声：加速度标准差（米/秒²）
    pub accel_std: f64,
    /// 初始位置标准差（米）
    pub init_pos_std: f64,
    /// 初始速度标准差（米/秒）
    pub init_vel_std: f64,
    /// 门控阈值（马氏距离平方，2 自由度 99%）
    pub gate_chi2: f64,
    /// 残差参考值（米），用于自适应 R
    pub residual_ref: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            meas_std_base: 2.0,
            accel_std: 2.0,
            init_pos_std: 3.0,
            init_vel_std: 1.0,
            gate_chi2: 9.21,
            residual_ref: 10.0,
        }
    }
}

/// 滤波状态
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterState {
    /// [x, y, vx, vy]
    pub x: Vector4<f64>,
    /// 4x4 协方差
    pub p: Matrix4<f64>,
    /// 上一帧时间戳（毫秒）
    pub last_ms: i64,
}

impl FilterState {
    pub fn position(&self) -> (f64, f64) {
        (self.x[0], self.x[1])
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.x[2], self.x[3])
    }

    pub fn speed(&self) -> f64 {
        self.x[2].hypot(self.x[3])
    }
}

/// 自适应卡尔曼跟踪器
#[derive(Clone, Debug, Default)]
pub struct AdaptiveTracker {
    config: TrackerConfig,
    state: Option<FilterState>,
}

impl AdaptiveTracker {
    pub fn new(config: TrackerConfig) -> Self {
        AdaptiveTracker { config, state: None }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// 当前滤波状态，首帧之前为 None
    pub fn state(&self) -> Option<&FilterState> {
        self.state.as_ref()
    }

    /// 回到未初始化状态
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// 处理一帧量测
    ///
    /// `residual` 为 None、非正或 NaN 时视为未知。
    /// 输出的 x/y 是原始量测坐标，不是滤波后的状态。
    pub fn step(
        &mut self,
        meas_x: f64,
        meas_y: f64,
        timestamp_ms: i64,
        anchors: usize,
        residual: Option<f64>,
    ) -> TrackPoint {
        let rms = residual.unwrap_or(0.0);
        let z = Vector2::new(meas_x, meas_y);

        let Some(prev) = self.state else {
            self.state = Some(self.seed(z, timestamp_ms));
            return TrackPoint {
                time: timestamp_ms,
                x: meas_x,
                y: meas_y,
                velocity: 0.0,
                accepted: true,
                anchors_used: anchors,
                rms,
                dt: 0.0,
            };
        };

        // 1) dt
        let dt = ((timestamp_ms - prev.last_ms) as f64 / 1000.0).max(1e-3);

        // 2) A / Q / R
        let a = transition(dt);
        let q = process_noise(dt, self.config.accel_std);
        let r = Matrix2::identity() * self.adaptive_variance(anchors, residual);

        // 3) 预测
        let x_pred = a * prev.x;
        let p_pred = a * prev.p * a.transpose() + q;

        // 4) 门控
        let h = observation();
        let innovation = z - h * x_pred;
        let s = h * p_pred * h.transpose() + r;
        let s_inv = s.try_inverse();
        let m2 = s_inv
            .map(|s_inv| (innovation.transpose() * s_inv * innovation)[(0, 0)])
            .unwrap_or(f64::INFINITY);

        let (state, accepted) = match s_inv {
            Some(s_inv) if m2.is_finite() && m2 <= self.config.gate_chi2 => {
                // 5) 校正
                let k = p_pred * h.transpose() * s_inv;
                let x_post = x_pred + k * innovation;
                let p_post = (Matrix4::identity() - k * h) * p_pred;
                (
                    FilterState {
                        x: x_post,
                        p: p_post,
                        last_ms: timestamp_ms,
                    },
                    true,
                )
            }
            _ => {
                log::debug!(
                    "量测被门控拒绝: t={} m²={:.2} 阈值={:.2}",
                    timestamp_ms,
                    m2,
                    self.config.gate_chi2
                );
                (
                    FilterState {
                        x: x_pred,
                        p: p_pred,
                        last_ms: timestamp_ms,
                    },
                    false,
                )
            }
        };

        let speed = state.speed();
        self.state = Some(state);

        TrackPoint {
            time: timestamp_ms,
            x: meas_x,
            y: meas_y,
            velocity: speed,
            accepted,
            anchors_used: anchors,
            rms,
            dt,
        }
    }

    /// 首帧：以量测初始化状态，并用基础 R 立即校正一次
    fn seed(&self, z: Vector2<f64>, timestamp_ms: i64) -> FilterState {
        let c = &self.config;
        let x = Vector4::new(z[0], z[1], 0.0, 0.0);
        let p = Matrix4::from_diagonal(&Vector4::new(
            c.init_pos_std.powi(2),
            c.init_pos_std.powi(2),
            c.init_vel_std.powi(2),
            c.init_vel_std.powi(2),
        ));
        let r = Matrix2::identity() * c.meas_std_base.powi(2);

        let h = observation();
        let s = h * p * h.transpose() + r;
        let (x, p) = match s.try_inverse() {
            Some(s_inv) => {
                let k = p * h.transpose() * s_inv;
                (x + k * (z - h * x), (Matrix4::identity() - k * h) * p)
            }
            None => (x, p),
        };

        FilterState {
            x,
            p,
            last_ms: timestamp_ms,
        }
    }

    /// 自适应量测方差：信标少或残差大 → R 变大
    pub fn adaptive_variance(&self, anchors: usize, residual: Option<f64>) -> f64 {
        let fa = match anchors {
            n if n >= 5 => 0.8,
            4 => 1.0,
            3 => 1.6,
            2 => 3.0,
            _ => 6.0,
        };
        let fr = match residual {
            Some(r) if r > 0.0 => (r / self.config.residual_ref).clamp(0.5, 5.0),
            _ => 1.0,
        };
        self.config.meas_std_base.powi(2) * fa * fr
    }
}

/// A(dt)：匀速运动状态转移
fn transition(dt: f64) -> Matrix4<f64> {
    Matrix4::new(
        1.0, 0.0, dt, 0.0, //
        0.0, 1.0, 0.0, dt, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Q(dt, accel_std)：加速度白噪声离散化
fn process_noise(dt: f64, accel_std: f64) -> Matrix4<f64> {
    let a2 = accel_std * accel_std;
    let q_pos = dt.powi(4) * a2 / 4.0;
    let q_cross = dt.powi(3) * a2 / 2.0;
    let q_vel = dt.powi(2) * a2;
    Matrix4::new(
        q_pos, 0.0, q_cross, 0.0, //
        0.0, q_pos, 0.0, q_cross, //
        q_cross, 0.0, q_vel, 0.0, //
        0.0, q_cross, 0.0, q_vel,
    )
}

/// H：只观测位置
fn observation() -> Matrix2x4<f64> {
    Matrix2x4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0,
    )
}
