/// 批处理分析流水线与输出包
///
/// 批次 → 预处理 → 房间匹配 → 迟滞分段 → 短停留合并 → 切换提取 → 切换统计

use crate::analysis::{
    aggregate_transitions, extract_transitions, AggregatedTransition, Batch, FloorMap,
    Preprocessor, RoomIndex, RoomMatcher, RoomTransition, SegmentBuilder, SegmentMerger,
    StaySegment, TaggedPoint,
};
use crate::config::FlowTrackConfig;
use crate::error::MapError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 输出包元信息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    pub map_id: String,
    pub building_id: String,
    pub floor_id: String,
    pub units: String,
    pub generated_at: DateTime<Utc>,
    /// 参与分析的点数（预处理后）
    pub point_count: usize,
}

impl BundleMeta {
    pub fn for_map(map: &FloorMap) -> Self {
        BundleMeta {
            map_id: map.map_id.clone(),
            building_id: map.building_id.clone(),
            floor_id: map.floor_id.clone(),
            units: map.units.clone(),
            generated_at: Utc::now(),
            point_count: 0,
        }
    }
}

/// 分析输出包（交给报表协作方）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub meta: BundleMeta,
    pub stay_segments: Vec<StaySegment>,
    pub r_transitions: Vec<RoomTransition>,
    pub rs_aggregated: Vec<AggregatedTransition>,
}

impl AnalysisBundle {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 批处理分析流水线
#[derive(Clone, Debug)]
pub struct AnalysisPipeline {
    preprocessor: Preprocessor,
    matcher: RoomMatcher,
    builder: SegmentBuilder,
    merger: SegmentMerger,
    meta: BundleMeta,
}

impl AnalysisPipeline {
    pub fn new(
        preprocessor: Preprocessor,
        matcher: RoomMatcher,
        builder: SegmentBuilder,
        merger: SegmentMerger,
        meta: BundleMeta,
    ) -> Self {
        AnalysisPipeline {
            preprocessor,
            matcher,
            builder,
            merger,
            meta,
        }
    }

    /// 为一张地图构建流水线（房间索引在此构建）
    pub fn from_config(map: &FloorMap, config: &FlowTrackConfig) -> Result<Self, MapError> {
        let index = RoomIndex::build(map, &config.matching)?;
        Ok(AnalysisPipeline::new(
            Preprocessor::new(config.preprocess),
            RoomMatcher::new(Arc::new(index), config.matching),
            SegmentBuilder::from_config(&config.segmentation),
            SegmentMerger::from_config(&config.segmentation),
            BundleMeta::for_map(map),
        ))
    }

    pub fn matcher(&self) -> &RoomMatcher {
        &self.matcher
    }

    /// 对一组批次做完整分析
    pub fn run(&self, batches: &[Batch]) -> AnalysisBundle {
        let points = self.preprocessor.preprocess(batches);
        let tagged = self.matcher.match_points(&points);
        self.run_tagged(&tagged)
    }

    /// 对已标注房间的点做分段与统计
    pub fn run_tagged(&self, tagged: &[TaggedPoint]) -> AnalysisBundle {
        let draft = self.builder.build(tagged);
        let stay_segments = self.merger.merge(draft);
        let r_transitions = extract_transitions(&stay_segments);
        let rs_aggregated = aggregate_transitions(&stay_segments);

        log::info!(
            "分析完成: {} 个点，{} 个停留段，{} 次切换",
            tagged.len(),
            stay_segments.len(),
            r_transitions.len()
        );

        AnalysisBundle {
            meta: BundleMeta {
                generated_at: Utc::now(),
                point_count: tagged.len(),
                ..self.meta.clone()
            },
            stay_segments,
            r_transitions,
            rs_aggregated,
        }
    }
}
