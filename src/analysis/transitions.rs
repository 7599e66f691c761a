/// 房间切换事件与切换统计

use crate::analysis::StaySegment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 房间切换事件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomTransition {
    pub from: Option<String>,
    pub to: Option<String>,
    /// 切换时刻（后一段的开始时间，毫秒）
    pub at: i64,
}

/// 同一 (from, to) 的切换统计
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTransition {
    pub from: Option<String>,
    pub to: Option<String>,
    pub count_trips: usize,
    /// 累计途中时间（秒）
    pub total_travel_s: f64,
    /// 平均途中时间（秒）
    pub avg_travel_s: f64,
}

/// 相邻两段房间不同即产生一次切换
pub fn extract_transitions(segments: &[StaySegment]) -> Vec<RoomTransition> {
    segments
        .windows(2)
        .filter(|w| w[0].room_id != w[1].room_id)
        .map(|w| RoomTransition {
            from: w[0].room_id.clone(),
            to: w[1].room_id.clone(),
            at: w[1].start_t,
        })
        .collect()
}

/// 按 (from, to) 聚合切换，保持首次出现顺序
///
/// 途中时间为 `max(0, 后段开始 - 前段结束)`
pub fn aggregate_transitions(segments: &[StaySegment]) -> Vec<AggregatedTransition> {
    let mut order: Vec<AggregatedTransition> = Vec::new();
    let mut slots: HashMap<(Option<&str>, Option<&str>), usize> = HashMap::new();

    for w in segments.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        if a.room_id == b.room_id {
            continue;
        }
        let travel_s = ((b.start_t - a.end_t) as f64 / 1000.0).max(0.0);

        let slot = *slots.entry((a.room(), b.room())).or_insert_with(|| {
            order.push(AggregatedTransition {
                from: a.room_id.clone(),
                to: b.room_id.clone(),
                count_trips: 0,
                total_travel_s: 0.0,
                avg_travel_s: 0.0,
            });
            order.len() - 1
        });

        let agg = &mut order[slot];
        agg.count_trips += 1;
        agg.total_travel_s += travel_s;
        agg.avg_travel_s = agg.total_travel_s / agg.count_trips as f64;
    }
    order
}
