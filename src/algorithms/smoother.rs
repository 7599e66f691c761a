/// RSSI 平滑器
///
/// 三种策略：
/// - 滑动窗口中值：抑制尖峰
/// - 指数移动平均（EMA）：跟随趋势
/// - 组合：先中值后 EMA，兼顾抗尖峰与响应速度

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 默认中值窗口大小
pub const DEFAULT_MEDIAN_WINDOW: usize = 5;
/// 默认 EMA 平滑系数
pub const DEFAULT_EMA_ALPHA: f64 = 0.4;

/// RSSI 平滑器接口
pub trait RssiSmoother {
    /// 输入一个原始 RSSI 采样
    fn feed(&mut self, rssi: f64);

    /// 当前平滑值，尚无采样时为 None
    fn value(&self) -> Option<f64>;
}

/// 滑动窗口中值平滑器
#[derive(Clone, Debug)]
pub struct MedianSmoother {
    window: VecDeque<f64>,
    size: usize,
}

impl MedianSmoother {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        MedianSmoother {
            window: VecDeque::with_capacity(size),
            size,
        }
    }

    /// 当前窗口内的采样数
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for MedianSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_MEDIAN_WINDOW)
    }
}

impl RssiSmoother for MedianSmoother {
    fn feed(&mut self, rssi: f64) {
        if self.window.len() >= self.size {
            self.window.pop_front();
        }
        self.window.push_back(rssi);
    }

    fn value(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        // 偶数个时取偏下的中间元素
        Some(sorted[(sorted.len() - 1) / 2])
    }
}

/// 指数移动平均平滑器
///
/// `ema = α·x + (1-α)·ema`，以第一个采样作为初值
#[derive(Clone, Debug)]
pub struct EmaSmoother {
    alpha: f64,
    ema: Option<f64>,
}

impl EmaSmoother {
    pub fn new(alpha: f64) -> Self {
        EmaSmoother {
            alpha: alpha.clamp(0.0, 1.0),
            ema: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for EmaSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_EMA_ALPHA)
    }
}

impl RssiSmoother for EmaSmoother {
    fn feed(&mut self, rssi: f64) {
        self.ema = Some(match self.ema {
            Some(prev) => self.alpha * rssi + (1.0 - self.alpha) * prev,
            None => rssi,
        });
    }

    fn value(&self) -> Option<f64> {
        self.ema
    }
}

/// 组合平滑器：原始值 → 中值 → EMA
#[derive(Clone, Debug, Default)]
pub struct CombinedSmoother {
    median: MedianSmoother,
    ema: EmaSmoother,
}

impl CombinedSmoother {
    pub fn new(window: usize, alpha: f64) -> Self {
        CombinedSmoother {
            median: MedianSmoother::new(window),
            ema: EmaSmoother::new(alpha),
        }
    }
}

impl RssiSmoother for CombinedSmoother {
    fn feed(&mut self, rssi: f64) {
        self.median.feed(rssi);
        if let Some(median) = self.median.value() {
            self.ema.feed(median);
        }
    }

    fn value(&self) -> Option<f64> {
        self.ema.value()
    }
}

/// 平滑策略选择（构造时确定）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmootherKind {
    Median,
    Ema,
    #[default]
    Combined,
}

impl SmootherKind {
    /// 创建一个新的平滑器实例，每个信标各持有一个
    pub fn create(self, window: usize, alpha: f64) -> Box<dyn RssiSmoother + Send> {
        match self {
            SmootherKind::Median => Box::new(MedianSmoother::new(window)),
            SmootherKind::Ema => Box::new(EmaSmoother::new(alpha)),
            SmootherKind::Combined => Box::new(CombinedSmoother::new(window, alpha)),
        }
    }
}
