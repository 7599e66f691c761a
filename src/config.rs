/// 全局配置
///
/// 各阶段配置都有缺省值并支持部分 JSON（缺省字段取默认值）

use crate::analysis::{MatchConfig, PreprocessConfig, SegmentationConfig};
use crate::algorithms::TrackerConfig;
use crate::error::ConfigError;
use crate::positioning::PositioningConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowTrackConfig {
    pub positioning: PositioningConfig,
    pub tracker: TrackerConfig,
    pub preprocess: PreprocessConfig,
    pub matching: MatchConfig,
    pub segmentation: SegmentationConfig,
}

impl FlowTrackConfig {
    /// 解析并校验
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: FlowTrackConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.positioning;
        if p.update_interval_ms == 0 {
            return Err(invalid("positioning.update_interval_ms 必须大于 0"));
        }
        if p.min_anchors == 0 || p.max_anchors < p.min_anchors {
            return Err(invalid("positioning.min_anchors 必须大于 0 且不超过 max_anchors"));
        }
        if p.batch_size == 0 {
            return Err(invalid("positioning.batch_size 必须大于 0"));
        }
        if p.median_window == 0 {
            return Err(invalid("positioning.median_window 必须大于 0"));
        }
        if !(p.ema_alpha > 0.0 && p.ema_alpha <= 1.0) {
            return Err(invalid("positioning.ema_alpha 必须在 (0, 1] 内"));
        }
        if matches!(p.max_anchor_age_ms, Some(age) if age <= 0) {
            return Err(invalid("positioning.max_anchor_age_ms 必须大于 0"));
        }
        p.distance_model
            .validate()
            .map_err(|e| invalid(&format!("positioning.distance_model: {}", e)))?;
        if p.weight.p < 0.0 || p.weight.a < 0.0 || p.weight.b <= 0.0 {
            return Err(invalid("positioning.weight 参数必须非负且 b > 0"));
        }

        let t = &self.tracker;
        if t.meas_std_base <= 0.0 || t.init_pos_std <= 0.0 {
            return Err(invalid("tracker 量测/初始位置标准差必须大于 0"));
        }
        if t.accel_std < 0.0 || t.init_vel_std < 0.0 || t.gate_chi2 <= 0.0 || t.residual_ref <= 0.0 {
            return Err(invalid("tracker 参数不能为负，门限和残差参考值必须大于 0"));
        }

        let b = &self.preprocess.bounds;
        if b.min_x > b.max_x || b.min_y > b.max_y {
            return Err(invalid("preprocess.bounds 上下界颠倒"));
        }
        let pre = &self.preprocess;
        if pre.max_rms < 0.0 || pre.max_velocity < 0.0 || pre.dedup_epsilon < 0.0 {
            return Err(invalid("preprocess 阈值不能为负"));
        }

        let m = &self.matching;
        if m.room_buffer_m < 0.0 || m.boundary_eps_m < 0.0 || m.fallback_max_m < 0.0 {
            return Err(invalid("matching 距离参数不能为负"));
        }

        let s = &self.segmentation;
        if s.hysteresis_count == 0 || s.hysteresis_ms < 0 || s.min_dwell_ms < 0 {
            return Err(invalid("segmentation 参数无效"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FlowTrackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.positioning.min_anchors, 4);
        assert_eq!(config.positioning.max_anchors, 10);
        assert_eq!(config.positioning.min_rssi, -90.0);
        assert_eq!(config.matching.room_buffer_m, 0.5);
        assert_eq!(config.segmentation.min_dwell_ms, 10_000);
        assert_eq!(config.tracker.gate_chi2, 9.21);
    }

    #[test]
    fn test_partial_json() {
        let config = FlowTrackConfig::from_json_str(
            r#"{
                "positioning": {"update_interval_ms": 250, "smoother": "median"},
                "segmentation": {"hysteresis_count": 5}
            }"#,
        )
        .unwrap();
        assert_eq!(config.positioning.update_interval_ms, 250);
        assert_eq!(config.positioning.batch_size, 100);
        assert_eq!(config.segmentation.hysteresis_count, 5);
        assert_eq!(config.segmentation.hysteresis_ms, 1_500);
    }

    #[test]
    fn test_round_trip_json() {
        let config = FlowTrackConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert_eq!(FlowTrackConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let inverted = r#"{"preprocess": {"bounds": {"min_x": 10, "max_x": 0}}}"#;
        assert!(matches!(
            FlowTrackConfig::from_json_str(inverted),
            Err(ConfigError::Invalid(_))
        ));

        let bad_exponent = r#"{"positioning": {"distance_model": {"path_loss_exponent": 0}}}"#;
        assert!(matches!(
            FlowTrackConfig::from_json_str(bad_exponent),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            FlowTrackConfig::from_json_str("{\"positioning\": 1}"),
            Err(ConfigError::Json(_))
        ));
    }
}
