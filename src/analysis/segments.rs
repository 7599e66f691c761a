/// 停留段构建与短停留合并
///
/// - `SegmentBuilder`: 带迟滞的房间序列 → 停留段
/// - `SegmentMerger`: 把短于最小停留时长的段并入相邻段

use crate::analysis::TaggedPoint;
use serde::{Deserialize, Serialize};

/// 分段配置
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// 连续命中新房间的次数阈值 L
    pub hysteresis_count: usize,
    /// 连续命中新房间的时长阈值 τ（毫秒）
    pub hysteresis_ms: i64,
    /// 最小停留时长（毫秒）
    pub min_dwell_ms: i64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig {
            hysteresis_count: 3,
            hysteresis_ms: 1_500,
            min_dwell_ms: 10_000,
        }
    }
}

/// 房间停留段
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaySegment {
    /// 房间 id，None 表示未知区域
    pub room_id: Option<String>,
    pub start_t: i64,
    pub end_t: i64,
    pub duration_s: f64,
}

impl StaySegment {
    pub fn new(room_id: Option<String>, start_t: i64, end_t: i64) -> Self {
        StaySegment {
            room_id,
            start_t,
            end_t,
            duration_s: seconds_between(start_t, end_t),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_t - self.start_t
    }

    pub fn room(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    fn set_start(&mut self, start_t: i64) {
        self.start_t = start_t;
        self.duration_s = seconds_between(self.start_t, self.end_t);
    }

    fn set_end(&mut self, end_t: i64) {
        self.end_t = end_t;
        self.duration_s = seconds_between(self.start_t, self.end_t);
    }
}

fn seconds_between(start_t: i64, end_t: i64) -> f64 {
    ((end_t - start_t) as f64 / 1000.0).max(0.0)
}

// ============================================================================
// 迟滞分段
// ============================================================================

/// 带迟滞的分段器
///
/// 新房间需连续命中 L 次，或从首次命中起持续 τ 毫秒，才切换当前房间
#[derive(Clone, Copy, Debug)]
pub struct SegmentBuilder {
    hysteresis_count: usize,
    hysteresis_ms: i64,
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        SegmentBuilder::from_config(&SegmentationConfig::default())
    }
}

impl SegmentBuilder {
    pub fn new(hysteresis_count: usize, hysteresis_ms: i64) -> Self {
        SegmentBuilder {
            hysteresis_count: hysteresis_count.max(1),
            hysteresis_ms: hysteresis_ms.max(0),
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        SegmentBuilder::new(config.hysteresis_count, config.hysteresis_ms)
    }

    /// 按时间排好序的标注点 → 停留段
    pub fn build(&self, points: &[TaggedPoint]) -> Vec<StaySegment> {
        let mut segments = Vec::new();
        if points.is_empty() {
            return segments;
        }

        let mut current: Option<&str> = points.iter().find_map(|p| p.room.as_deref());
        let mut current_start = 0;

        // 候选房间：None 既表示"没有候选"也表示"候选是未知区域"，
        // 因此未知区域的候选计数每次都从 1 重新开始
        let mut candidate: Option<&str> = None;
        let mut count = 0;
        let mut first_seen = 0;

        for (i, p) in points.iter().enumerate() {
            let room = p.room.as_deref();
            if room == current {
                candidate = None;
                count = 0;
                first_seen = 0;
                continue;
            }

            if candidate.is_none() || candidate != room {
                candidate = room;
                count = 1;
                first_seen = p.time;
            } else {
                count += 1;
            }

            if count >= self.hysteresis_count || p.time - first_seen >= self.hysteresis_ms {
                let end = i.saturating_sub(1).max(current_start);
                segments.push(make_segment(points, current, current_start, end));

                current = candidate;
                current_start = i;
                candidate = None;
                count = 0;
                first_seen = 0;
            }
        }

        segments.push(make_segment(points, current, current_start, points.len() - 1));
        log::debug!("迟滞分段: {} 个点 → {} 段", points.len(), segments.len());
        segments
    }
}

fn make_segment(points: &[TaggedPoint], room: Option<&str>, start: usize, end: usize) -> StaySegment {
    StaySegment::new(room.map(str::to_string), points[start].time, points[end].time)
}

// ============================================================================
// 短停留合并
// ============================================================================

/// 短停留合并器
#[derive(Clone, Copy, Debug)]
pub struct SegmentMerger {
    min_dwell_ms: i64,
}

impl Default for SegmentMerger {
    fn default() -> Self {
        SegmentMerger::new(SegmentationConfig::default().min_dwell_ms)
    }
}

impl SegmentMerger {
    pub fn new(min_dwell_ms: i64) -> Self {
        SegmentMerger {
            min_dwell_ms: min_dwell_ms.max(0),
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        SegmentMerger::new(config.min_dwell_ms)
    }

    /// 反复消除短停留段，直到没有短段
    ///
    /// 处理顺序：
    /// 1. 前后段同一房间：前段延伸到后段结束，当前段和后段删除
    /// 2. 有前段：并入前段
    /// 3. 有后段：后段向前延伸
    /// 4. 孤立段：删除
    pub fn merge(&self, segments: Vec<StaySegment>) -> Vec<StaySegment> {
        if segments.len() <= 1 || self.min_dwell_ms == 0 {
            return segments;
        }

        let input = segments.len();
        let mut s = segments;
        let mut i = 0;
        while i < s.len() {
            if s[i].duration_ms() >= self.min_dwell_ms {
                i += 1;
                continue;
            }

            let has_prev = i > 0;
            let has_next = i + 1 < s.len();

            if has_prev && has_next && s[i - 1].room_id == s[i + 1].room_id {
                let end = s[i + 1].end_t;
                s[i - 1].set_end(end);
                s.remove(i + 1);
                s.remove(i);
                i -= 1;
            } else if has_prev {
                let end = s[i].end_t;
                s[i - 1].set_end(end);
                s.remove(i);
                i -= 1;
            } else if has_next {
                let start = s[i].start_t;
                s[i + 1].set_start(start);
                s.remove(i);
            } else {
                s.remove(i);
            }
        }

        log::debug!("短停留合并: {} → {} 段", input, s.len());
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(rooms: &[Option<&str>], step_ms: i64) -> Vec<TaggedPoint> {
        rooms
            .iter()
            .enumerate()
            .map(|(i, r)| TaggedPoint::new(i as i64 * step_ms, 0.0, 0.0, r.map(str::to_string)))
            .collect()
    }

    fn seg(room: &str, start: i64, end: i64) -> StaySegment {
        StaySegment::new(Some(room.to_string()), start, end)
    }

    #[test]
    fn test_empty_input() {
        assert!(SegmentBuilder::default().build(&[]).is_empty());
    }

    #[test]
    fn test_single_room_one_segment() {
        let pts = tagged(&[Some("A"); 6], 500);
        let segs = SegmentBuilder::default().build(&pts);
        assert_eq!(segs, vec![seg("A", 0, 2_500)]);
        assert_eq!(segs[0].duration_s, 2.5);
    }

    #[test]
    fn test_stray_tag_ignored() {
        let pts = tagged(&[Some("A"), Some("A"), Some("B"), Some("A"), Some("A")], 500);
        let segs = SegmentBuilder::new(3, 1_500).build(&pts);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].room(), Some("A"));
    }

    #[test]
    fn test_switch_by_count() {
        let pts = tagged(
            &[Some("A"), Some("A"), Some("B"), Some("B"), Some("B"), Some("B")],
            100,
        );
        let segs = SegmentBuilder::new(3, 10_000).build(&pts);
        // 第 3 次命中 B（下标 4）时切换
        assert_eq!(segs, vec![seg("A", 0, 300), seg("B", 400, 500)]);
    }

    #[test]
    fn test_switch_by_time() {
        let pts = tagged(&[Some("A"), Some("B"), Some("B")], 1_000);
        let segs = SegmentBuilder::new(10, 1_000).build(&pts);
        assert_eq!(segs, vec![seg("A", 0, 1_000), seg("B", 2_000, 2_000)]);
    }

    #[test]
    fn test_leading_unknown_points() {
        let pts = tagged(&[None, None, Some("A"), Some("A")], 500);
        let segs = SegmentBuilder::default().build(&pts);
        assert_eq!(segs, vec![seg("A", 0, 1_500)]);
    }

    #[test]
    fn test_all_unknown() {
        let pts = tagged(&[None, None, None], 500);
        let segs = SegmentBuilder::default().build(&pts);
        assert_eq!(segs, vec![StaySegment::new(None, 0, 1_000)]);
    }

    #[test]
    fn test_merge_aba_collapses() {
        let segs = vec![seg("A", 0, 5_000), seg("B", 5_000, 7_000), seg("A", 7_000, 12_000)];
        let merged = SegmentMerger::new(10_000).merge(segs);
        assert_eq!(merged, vec![seg("A", 0, 12_000)]);
    }

    #[test]
    fn test_merge_sandwich() {
        let segs = vec![
            seg("A", 0, 20_000),
            seg("B", 20_000, 22_000),
            seg("A", 22_000, 40_000),
            seg("C", 40_000, 60_000),
        ];
        let merged = SegmentMerger::new(10_000).merge(segs);
        assert_eq!(merged, vec![seg("A", 0, 40_000), seg("C", 40_000, 60_000)]);
    }

    #[test]
    fn test_merge_into_prev() {
        let segs = vec![seg("A", 0, 20_000), seg("B", 20_000, 22_000), seg("C", 22_000, 40_000)];
        let merged = SegmentMerger::new(10_000).merge(segs);
        assert_eq!(merged, vec![seg("A", 0, 22_000), seg("C", 22_000, 40_000)]);
    }

    #[test]
    fn test_merge_passthrough() {
        let one = vec![seg("A", 0, 10)];
        assert_eq!(SegmentMerger::new(10_000).merge(one.clone()), one);

        let two = vec![seg("A", 0, 10), seg("B", 10, 20)];
        assert_eq!(SegmentMerger::new(0).merge(two.clone()), two);
    }

    #[test]
    fn test_merge_all_short_removed() {
        let segs = vec![seg("A", 0, 1_000), seg("B", 1_000, 2_000)];
        assert!(SegmentMerger::new(10_000).merge(segs).is_empty());
    }
}
