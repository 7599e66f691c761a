/// 批次预处理：合并 → 排序 → 去重 → 过滤

use crate::analysis::{Batch, RawPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 地图矩形范围（闭区间）
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for MapBounds {
    fn default() -> Self {
        MapBounds {
            min_x: -160.0,
            max_x: 240.0,
            min_y: 0.0,
            max_y: 280.0,
        }
    }
}

impl MapBounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// 预处理配置
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub bounds: MapBounds,
    /// 残差上限，超过即丢弃
    pub max_rms: f64,
    /// 速度上限（米/秒），超过即丢弃
    pub max_velocity: f64,
    /// 同一时刻坐标视为重复的容差
    pub dedup_epsilon: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            bounds: MapBounds::default(),
            max_rms: 5.0,
            max_velocity: 3.0,
            dedup_epsilon: 1e-6,
        }
    }
}

/// 批次预处理器
#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Preprocessor { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// 按批次顺序拼接所有点
    pub fn merge(&self, batches: &[Batch]) -> Vec<RawPoint> {
        batches
            .iter()
            .flat_map(|b| b.points().iter().copied())
            .collect()
    }

    /// 按时间稳定升序排序
    pub fn sort(&self, points: &mut [RawPoint]) {
        points.sort_by_key(|p| p.time);
    }

    /// 去重
    ///
    /// 第一遍：同一时间戳只保留残差最小的点（相同时保留先出现者）；
    /// 第二遍：与前一个保留点时间相同且坐标差都在容差内的点丢弃
    pub fn deduplicate(&self, points: Vec<RawPoint>) -> Vec<RawPoint> {
        let mut by_time: HashMap<i64, usize> = HashMap::new();
        let mut best: Vec<RawPoint> = Vec::with_capacity(points.len());
        for p in points {
            match by_time.get(&p.time) {
                Some(&idx) => {
                    if p.rms < best[idx].rms {
                        best[idx] = p;
                    }
                }
                None => {
                    by_time.insert(p.time, best.len());
                    best.push(p);
                }
            }
        }

        let eps = self.config.dedup_epsilon;
        let mut kept: Vec<RawPoint> = Vec::with_capacity(best.len());
        for p in best {
            if let Some(last) = kept.last() {
                if last.time == p.time && (last.x - p.x).abs() <= eps && (last.y - p.y).abs() <= eps {
                    continue;
                }
            }
            kept.push(p);
        }
        kept
    }

    /// 丢弃越界、残差过大、速度过大的点
    pub fn filter(&self, points: Vec<RawPoint>) -> Vec<RawPoint> {
        let c = &self.config;
        points
            .into_iter()
            .filter(|p| c.bounds.contains(p.x, p.y))
            .filter(|p| p.rms <= c.max_rms)
            .filter(|p| p.velocity <= c.max_velocity)
            .collect()
    }

    /// 依次执行合并、排序、去重、过滤
    pub fn preprocess(&self, batches: &[Batch]) -> Vec<RawPoint> {
        let mut points = self.merge(batches);
        let merged = points.len();
        self.sort(&mut points);

        let points = self.deduplicate(points);
        let deduped = points.len();
        log::debug!("去重丢弃 {} 个点", merged - deduped);

        let points = self.filter(points);
        log::debug!("过滤丢弃 {} 个点", deduped - points.len());
        log::info!(
            "预处理完成: {} 个批次，{} → {} 个点",
            batches.len(),
            merged,
            points.len()
        );
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(time: i64, x: f64, y: f64, rms: f64) -> RawPoint {
        RawPoint {
            time,
            x,
            y,
            velocity: 0.5,
            accepted: true,
            anchors_used: 4,
            rms,
            dt: 0.5,
        }
    }

    fn batch(points: Option<Vec<RawPoint>>) -> Batch {
        Batch {
            points,
            ..Batch::default()
        }
    }

    #[test]
    fn test_merge_skips_null_points() {
        let pre = Preprocessor::default();
        let batches = vec![
            batch(Some(vec![pt(2, 1.0, 1.0, 0.1)])),
            batch(None),
            batch(Some(vec![])),
            batch(Some(vec![pt(1, 1.0, 1.0, 0.1)])),
        ];
        let merged = pre.merge(&batches);
        assert_eq!(merged.iter().map(|p| p.time).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_sort_is_stable() {
        let pre = Preprocessor::default();
        let mut pts = vec![pt(5, 1.0, 0.0, 0.1), pt(3, 0.0, 0.0, 0.1), pt(5, 2.0, 0.0, 0.1)];
        pre.sort(&mut pts);
        assert_eq!(pts[0].time, 3);
        assert_eq!(pts[1].x, 1.0);
        assert_eq!(pts[2].x, 2.0);
    }

    #[test]
    fn test_dedup_keeps_lowest_rms() {
        let pre = Preprocessor::default();
        let out = pre.deduplicate(vec![pt(100, 1.0, 1.0, 0.9), pt(100, 2.0, 2.0, 0.5)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rms, 0.5);
        assert_eq!(out[0].x, 2.0);
    }

    #[test]
    fn test_dedup_first_wins_on_tie() {
        let pre = Preprocessor::default();
        let out = pre.deduplicate(vec![pt(100, 1.0, 1.0, 0.5), pt(100, 2.0, 2.0, 0.5)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].x, 1.0);
    }

    #[test]
    fn test_filter_thresholds() {
        let pre = Preprocessor::default();
        let mut fast = pt(4, 1.0, 1.0, 0.1);
        fast.velocity = 3.5;
        let out = pre.filter(vec![
            pt(1, 1.0, 1.0, 0.1),
            pt(2, -200.0, 1.0, 0.1),
            pt(3, 1.0, 1.0, 5.5),
            fast,
            pt(5, 240.0, 280.0, 5.0),
        ]);
        assert_eq!(out.iter().map(|p| p.time).collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn test_preprocess_pipeline() {
        let pre = Preprocessor::default();
        let batches = vec![
            batch(Some(vec![pt(300, 1.0, 1.0, 0.1), pt(100, 1.0, 1.0, 0.9)])),
            batch(Some(vec![pt(100, 1.1, 1.0, 0.5), pt(200, 1.0, -5.0, 0.1)])),
        ];
        let out = pre.preprocess(&batches);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].time, 100);
        assert_eq!(out[0].rms, 0.5);
        assert_eq!(out[1].time, 300);
    }
}
