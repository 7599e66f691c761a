/// 批处理分析综合测试
///
/// 地图 JSON → 房间索引 → 批次预处理 → 房间匹配 → 分段 → 切换统计

use flowtrack::analysis::*;
use flowtrack::FlowTrackConfig;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

const MAP_JSON: &str = r#"{
    "map_id": "test_map_001",
    "floor_id": "F3",
    "building_id": "HQ",
    "name": "三楼",
    "units": "m",
    "crs": "local",
    "rooms": [
        {"id": "office", "name": "办公室",
         "vertices": [{"x": 0, "y": 0}, {"x": 8, "y": 0}, {"x": 8, "y": 6}, {"x": 0, "y": 6}]},
        {"id": "meeting", "name": "会议室",
         "vertices": [{"x": 10, "y": 0}, {"x": 16, "y": 0}, {"x": 16, "y": 6}, {"x": 10, "y": 6}]},
        {"id": "pantry", "name": "茶水间",
         "vertices": [{"x": 0, "y": 10}, {"x": 6, "y": 10}, {"x": 6, "y": 14}, {"x": 3, "y": 16}, {"x": 0, "y": 14}]}
    ],
    "doorways": [],
    "meta": {"map_version": "1", "author": "facilities"}
}"#;

fn raw(time: i64, x: f64, y: f64, rms: f64) -> RawPoint {
    RawPoint {
        time,
        x,
        y,
        velocity: 0.4,
        accepted: true,
        anchors_used: 5,
        rms,
        dt: 0.5,
    }
}

fn matcher() -> RoomMatcher {
    let map = FloorMap::from_json_str(MAP_JSON).unwrap();
    let config = MatchConfig::default();
    RoomMatcher::new(Arc::new(RoomIndex::build(&map, &config).unwrap()), config)
}

/// 在 (x, y) 停留 [start, end) 毫秒，每 500 ms 一个点
fn dwell(x: f64, y: f64, start: i64, end: i64) -> Vec<RawPoint> {
    (start..end).step_by(500).map(|t| raw(t, x, y, 0.3)).collect()
}

#[test]
fn test_points_inside_rooms_hit() {
    let m = matcher();
    assert_eq!(m.match_xy(4.0, 3.0), Some("office"));
    assert_eq!(m.match_xy(13.0, 3.0), Some("meeting"));
    assert_eq!(m.match_xy(3.0, 15.0), Some("pantry"));
}

#[test]
fn test_far_points_unmatched() {
    let m = matcher();
    // 走廊正中，离所有房间都超过 0.3 m
    assert_eq!(m.match_xy(9.0, 3.0), None);
    assert_eq!(m.match_xy(12.0, 12.0), None);
}

#[test]
fn test_index_shared_across_threads() {
    let m = matcher();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let m = m.clone();
            thread::spawn(move || {
                let x = 1.0 + i as f64;
                m.match_xy(x, 3.0).map(str::to_string)
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().as_deref(), Some("office"));
    }
}

#[test]
fn test_invalid_maps_rejected() {
    let config = MatchConfig::default();
    let no_rooms = FloorMap::from_json_str(r#"{"map_id": "empty", "rooms": []}"#).unwrap();
    assert!(matches!(
        RoomIndex::build(&no_rooms, &config),
        Err(flowtrack::MapError::NoRooms)
    ));

    let flat = FloorMap::from_json_str(
        r#"{"rooms": [{"id": "r", "vertices": [{"x": 0, "y": 0}, {"x": 1, "y": 1}, {"x": 2, "y": 2}]}]}"#,
    )
    .unwrap();
    assert!(matches!(
        RoomIndex::build(&flat, &config),
        Err(flowtrack::MapError::DegeneratePolygon { .. })
    ));
}

#[test]
fn test_dedup_keeps_best_sample() {
    let pre = Preprocessor::default();
    let batches = vec![
        Batch {
            points: Some(vec![raw(1_000, 1.0, 1.0, 0.9)]),
            ..Batch::default()
        },
        Batch {
            points: Some(vec![raw(1_000, 1.2, 1.0, 0.5)]),
            ..Batch::default()
        },
    ];
    let out = pre.preprocess(&batches);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].rms, 0.5);
}

#[test]
fn test_pipeline_office_to_meeting_and_back() {
    let map = FloorMap::from_json_str(MAP_JSON).unwrap();
    let pipeline = AnalysisPipeline::from_config(&map, &FlowTrackConfig::default()).unwrap();

    let mut first = dwell(4.0, 3.0, 0, 20_000);
    first.extend(dwell(9.0, 3.0, 20_000, 22_000));
    let mut second = dwell(13.0, 3.0, 22_000, 40_000);
    second.extend(dwell(9.0, 3.0, 40_000, 44_000));
    second.extend(dwell(4.0, 3.0, 44_000, 60_000));
    // 一个残差过大的离群点，会被过滤
    second.push(raw(30_250, 4.0, 3.0, 9.0));

    let batches: Vec<Batch> = serde_json::from_value(serde_json::json!([
        {"batchId": "s-0002", "points": second},
        {"batchId": "s-0001", "points": first},
        {"batchId": "s-0003", "points": null}
    ]))
    .unwrap();

    let bundle = pipeline.run(&batches);
    assert_eq!(bundle.meta.map_id, "test_map_001");
    assert_eq!(bundle.meta.building_id, "HQ");
    assert_eq!(bundle.meta.point_count, 120);

    let rooms: Vec<Option<&str>> = bundle.stay_segments.iter().map(|s| s.room()).collect();
    assert_eq!(rooms, vec![Some("office"), Some("meeting"), Some("office")]);
    assert_eq!(bundle.stay_segments[0].start_t, 0);
    assert_eq!(bundle.stay_segments[2].end_t, 59_500);

    let pairs: Vec<(Option<&str>, Option<&str>)> = bundle
        .r_transitions
        .iter()
        .map(|t| (t.from.as_deref(), t.to.as_deref()))
        .collect();
    assert_eq!(pairs, vec![(Some("office"), Some("meeting")), (Some("meeting"), Some("office"))]);
    assert_eq!(bundle.rs_aggregated.len(), 2);
    assert!(bundle.rs_aggregated.iter().all(|a| a.count_trips == 1));
}

#[test]
fn test_merge_short_visit_between_same_room() {
    let segments = vec![
        StaySegment::new(Some("A".into()), 0, 5_000),
        StaySegment::new(Some("B".into()), 5_000, 7_000),
        StaySegment::new(Some("A".into()), 7_000, 12_000),
    ];
    let merged = SegmentMerger::new(10_000).merge(segments);
    assert_eq!(merged, vec![StaySegment::new(Some("A".into()), 0, 12_000)]);
}

#[test]
fn test_aggregate_two_trips() {
    let segments = vec![
        StaySegment::new(Some("A".into()), 0, 10_000),
        StaySegment::new(Some("B".into()), 12_000, 25_000),
        StaySegment::new(Some("A".into()), 25_000, 40_000),
        StaySegment::new(Some("B".into()), 44_000, 60_000),
    ];
    let agg = aggregate_transitions(&segments);
    let ab = agg
        .iter()
        .find(|a| a.from.as_deref() == Some("A") && a.to.as_deref() == Some("B"))
        .unwrap();
    assert_eq!(ab.count_trips, 2);
    assert_eq!(ab.total_travel_s, 6.0);
    assert_eq!(ab.avg_travel_s, 3.0);
}

fn room_stream() -> impl Strategy<Value = Vec<(i64, Option<u8>)>> {
    proptest::collection::vec((1i64..2_000, proptest::option::weighted(0.8, 0u8..3)), 1..80)
}

fn to_tagged(stream: &[(i64, Option<u8>)]) -> Vec<TaggedPoint> {
    let mut t = 0;
    stream
        .iter()
        .map(|&(gap, room)| {
            t += gap;
            TaggedPoint::new(t, 0.0, 0.0, room.map(|r| format!("R{}", r)))
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_segments_partition_points(
        stream in room_stream(),
        count in 2usize..5,
        tau in 1i64..3_000,
    ) {
        let points = to_tagged(&stream);
        let segments = SegmentBuilder::new(count, tau).build(&points);
        let times: Vec<i64> = points.iter().map(|p| p.time).collect();

        prop_assert!(!segments.is_empty());
        prop_assert_eq!(segments[0].start_t, times[0]);
        prop_assert_eq!(segments.last().unwrap().end_t, *times.last().unwrap());
        for s in &segments {
            prop_assert!(s.end_t >= s.start_t);
        }
        for w in segments.windows(2) {
            let end_idx = times.iter().position(|&t| t == w[0].end_t).unwrap();
            prop_assert_eq!(times[end_idx + 1], w[1].start_t);
        }
    }

    #[test]
    fn prop_merged_segments_meet_min_dwell(
        stream in room_stream(),
        min_dwell in 1i64..20_000,
    ) {
        let points = to_tagged(&stream);
        let draft = SegmentBuilder::default().build(&points);
        let input_len = draft.len();
        let merged = SegmentMerger::new(min_dwell).merge(draft);
        if input_len > 1 {
            for s in &merged {
                prop_assert!(s.duration_ms() >= min_dwell);
            }
        }
        prop_assert!(merged.len() <= input_len);
    }

    #[test]
    fn prop_aggregate_average_consistent(stream in room_stream()) {
        let points = to_tagged(&stream);
        let segments = SegmentBuilder::new(1, 0).build(&points);
        let transitions = extract_transitions(&segments);
        let agg = aggregate_transitions(&segments);

        let total: usize = agg.iter().map(|a| a.count_trips).sum();
        prop_assert_eq!(total, transitions.len());
        for a in &agg {
            prop_assert!(a.count_trips > 0);
            prop_assert!(a.total_travel_s >= 0.0);
            prop_assert!((a.avg_travel_s - a.total_travel_s / a.count_trips as f64).abs() < 1e-9);
        }
    }
}
