/// 蓝牙室内定位会话
///
/// 支持的功能：
/// - 信标运行时状态管理（首次扫描到时创建，会话结束时丢弃）
/// - RSSI 平滑 → 距离 → 多边定位 → 自适应卡尔曼跟踪
/// - 轨迹点分批输出
/// - 基于通道的异步定位循环（停止拉取即取消）

use crate::algorithms::{
    AdaptiveTracker, Anchor, AnchorId, AnchorMeasurement, AnchorRuntime, AnchorSet,
    ClippedInverseDistance, EstimatorKind, LocationEstimator, LogDistanceModel, SmootherKind,
    TrackPoint, TrackerConfig, DEFAULT_EMA_ALPHA, DEFAULT_MEDIAN_WINDOW,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};

// ============================================================================
// 配置与输入输出数据结构
// ============================================================================

/// 批次元数据（随每个 TrackBatch 输出）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchInfo {
    pub device_id: String,
    pub session_id: String,
    pub source: String,
    pub coord_ref: String,
    pub building_id: String,
    pub floor_id: String,
    pub map_id: String,
}

impl Default for BatchInfo {
    fn default() -> Self {
        BatchInfo {
            device_id: "unknown-device".to_string(),
            session_id: "session".to_string(),
            source: "BLT+Kalman".to_string(),
            coord_ref: "local_map".to_string(),
            building_id: String::new(),
            floor_id: String::new(),
            map_id: String::new(),
        }
    }
}

/// 定位会话配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    /// 定位周期（毫秒），作为定位循环周期的缺省值
    pub update_interval_ms: u64,
    /// 有效信标的最低平滑 RSSI (dBm)
    pub min_rssi: f64,
    /// 参与定位的最少信标数
    pub min_anchors: usize,
    /// 参与定位的最多信标数（取最强的若干个）
    pub max_anchors: usize,
    /// 信标超过该时长未被扫描到则不参与定位（毫秒），None 表示不限
    pub max_anchor_age_ms: Option<i64>,
    /// 每批轨迹点数
    pub batch_size: usize,
    pub smoother: SmootherKind,
    pub median_window: usize,
    pub ema_alpha: f64,
    pub distance_model: LogDistanceModel,
    pub weight: ClippedInverseDistance,
    pub estimator: EstimatorKind,
    pub batch: BatchInfo,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        PositioningConfig {
            update_interval_ms: 500,
            min_rssi: -90.0,
            min_anchors: 4,
            max_anchors: 10,
            max_anchor_age_ms: None,
            batch_size: 100,
            smoother: SmootherKind::Combined,
            median_window: DEFAULT_MEDIAN_WINDOW,
            ema_alpha: DEFAULT_EMA_ALPHA,
            distance_model: LogDistanceModel::default(),
            weight: ClippedInverseDistance::default(),
            estimator: EstimatorKind::Wls,
            batch: BatchInfo::default(),
        }
    }
}

/// 扫描协作方推送的一条原始信号
#[derive(Clone, Debug, PartialEq)]
pub struct RadioSample {
    pub anchor_id: AnchorId,
    pub rssi: f64,
    pub timestamp_ms: i64,
}

impl RadioSample {
    pub fn new(anchor_id: AnchorId, rssi: f64, timestamp_ms: i64) -> Self {
        RadioSample {
            anchor_id,
            rssi,
            timestamp_ms,
        }
    }
}

/// 一批轨迹点（交给传输 / 持久化协作方）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackBatch {
    pub batch_id: String,
    pub device_id: String,
    pub session_id: String,
    pub source: String,
    pub coord_ref: String,
    pub points: Vec<TrackPoint>,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub count: usize,
    pub building_id: String,
    pub floor_id: String,
    pub map_id: String,
}

// ============================================================================
// 定位会话
// ============================================================================

/// 单设备定位会话
///
/// 持有所有信标运行时状态和滤波状态，由调用方创建和销毁，
/// 同一时刻只允许一个线程修改
pub struct PositioningSession {
    config: PositioningConfig,
    anchors: AnchorSet,
    runtimes: HashMap<AnchorId, AnchorRuntime>,
    estimator: Box<dyn LocationEstimator + Send + Sync>,
    tracker: AdaptiveTracker,
    buffer: Vec<TrackPoint>,
    batches_emitted: usize,
    points_emitted: usize,
}

impl PositioningSession {
    pub fn new(anchors: AnchorSet, config: PositioningConfig, tracker: TrackerConfig) -> Self {
        let estimator = config.estimator.create(config.weight);
        let tracker = AdaptiveTracker::new(tracker);
        PositioningSession {
            config,
            anchors,
            runtimes: HashMap::new(),
            estimator,
            tracker,
            buffer: Vec::new(),
            batches_emitted: 0,
            points_emitted: 0,
        }
    }

    pub fn config(&self) -> &PositioningConfig {
        &self.config
    }

    /// 配置中的定位周期
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.config.update_interval_ms)
    }

    pub fn tracker(&self) -> &AdaptiveTracker {
        &self.tracker
    }

    pub fn runtime(&self, id: &AnchorId) -> Option<&AnchorRuntime> {
        self.runtimes.get(id)
    }

    /// 已激活（至少被扫描到一次）的信标数
    pub fn active_anchor_count(&self) -> usize {
        self.runtimes.len()
    }

    pub fn points_emitted(&self) -> usize {
        self.points_emitted
    }

    pub fn buffered_points(&self) -> usize {
        self.buffer.len()
    }

    /// 输入一条原始信号，未注册的信标被忽略
    pub fn ingest(&mut self, sample: &RadioSample) -> bool {
        let Some(anchor) = self.anchors.get(&sample.anchor_id) else {
            log::debug!("忽略未注册信标: {}", sample.anchor_id);
            return false;
        };

        let config = &self.config;
        let runtime = self
            .runtimes
            .entry(sample.anchor_id.clone())
            .or_insert_with(|| {
                log::debug!("信标首次出现: {}", anchor.id);
                AnchorRuntime::new(
                    anchor.clone(),
                    config.smoother.create(config.median_window, config.ema_alpha),
                )
            });
        runtime.observe(sample.rssi, sample.timestamp_ms, &config.distance_model);
        true
    }

    /// 当前可参与定位的信标量测：按平滑 RSSI 从强到弱，截取前 max_anchors 个
    pub fn effective_measurements(&self, now_ms: i64) -> Vec<AnchorMeasurement> {
        let mut effective: Vec<&AnchorRuntime> = self
            .runtimes
            .values()
            .filter(|rt| rt.smoothed_rssi >= self.config.min_rssi)
            .filter(|rt| match self.config.max_anchor_age_ms {
                Some(max_age) => now_ms - rt.last_seen_ms <= max_age,
                None => true,
            })
            .collect();

        effective.sort_by(|a, b| {
            b.smoothed_rssi
                .total_cmp(&a.smoothed_rssi)
                .then_with(|| a.anchor.id.cmp(&b.anchor.id))
        });
        effective.truncate(self.config.max_anchors);
        effective.iter().map(|rt| rt.measurement()).collect()
    }

    /// 执行一个定位周期
    ///
    /// 有效信标不足或定位无效时不产出轨迹点
    pub fn tick(&mut self, now_ms: i64) -> Option<TrackPoint> {
        let measurements = self.effective_measurements(now_ms);
        if measurements.len() < self.config.min_anchors {
            log::debug!(
                "有效信标不足: {} < {}，跳过本周期",
                measurements.len(),
                self.config.min_anchors
            );
            return None;
        }

        let estimate = self.estimator.estimate(&measurements, now_ms);
        if !estimate.valid {
            log::debug!("定位无效，跳过本周期: {}", estimate);
            return None;
        }

        let point = self.tracker.step(
            estimate.x,
            estimate.y,
            estimate.timestamp_ms,
            estimate.anchor_count,
            estimate.rms,
        );
        self.buffer.push(point);
        self.points_emitted += 1;
        Some(point)
    }

    /// 缓冲区满一批时取出
    pub fn take_full_batch(&mut self) -> Option<TrackBatch> {
        if self.buffer.len() >= self.config.batch_size.max(1) {
            Some(self.make_batch())
        } else {
            None
        }
    }

    /// 会话结束：取出剩余的不完整批次
    pub fn finish(&mut self) -> Option<TrackBatch> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.make_batch())
        }
    }

    fn make_batch(&mut self) -> TrackBatch {
        let points = std::mem::take(&mut self.buffer);
        self.batches_emitted += 1;
        let info = &self.config.batch;
        let batch = TrackBatch {
            batch_id: format!("{}-{:04}", info.session_id, self.batches_emitted),
            device_id: info.device_id.clone(),
            session_id: info.session_id.clone(),
            source: info.source.clone(),
            coord_ref: info.coord_ref.clone(),
            start_time_ms: points.first().map(|p| p.time).unwrap_or(0),
            end_time_ms: points.last().map(|p| p.time).unwrap_or(0),
            count: points.len(),
            points,
            building_id: info.building_id.clone(),
            floor_id: info.floor_id.clone(),
            map_id: info.map_id.clone(),
        };
        log::info!("批次 {} 完成，共 {} 个轨迹点", batch.batch_id, batch.count);
        batch
    }
}

impl fmt::Debug for PositioningSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositioningSession")
            .field("anchors", &self.anchors.len())
            .field("runtimes", &self.runtimes)
            .field("tracker", &self.tracker)
            .field("buffered", &self.buffer.len())
            .field("batches_emitted", &self.batches_emitted)
            .finish()
    }
}

/// 便捷构造：从信标列表创建会话
impl From<Vec<Anchor>> for PositioningSession {
    fn from(anchors: Vec<Anchor>) -> Self {
        PositioningSession::new(
            AnchorSet::from_vec(anchors),
            PositioningConfig::default(),
            TrackerConfig::default(),
        )
    }
}

// ============================================================================
// 异步定位循环
// ============================================================================

/// 定位循环输出事件
#[derive(Clone, Debug, PartialEq)]
pub enum PositioningEvent {
    Point(TrackPoint),
    Batch(TrackBatch),
}

/// 当前墙钟时间（毫秒）
pub fn wall_clock_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// 以墙钟驱动的定位循环
pub async fn run_positioning_loop(
    session: PositioningSession,
    samples: mpsc::Receiver<RadioSample>,
    events: mpsc::Sender<PositioningEvent>,
    interval: Duration,
) -> PositioningSession {
    run_positioning_loop_with_clock(session, samples, events, interval, wall_clock_ms).await
}

/// 定位循环
///
/// 从 `samples` 拉取信号，每个周期执行一次定位并把结果推入 `events`。
/// 信号通道关闭时刷出剩余批次并返回会话；事件接收端关闭时直接返回。
pub async fn run_positioning_loop_with_clock<C>(
    mut session: PositioningSession,
    mut samples: mpsc::Receiver<RadioSample>,
    events: mpsc::Sender<PositioningEvent>,
    interval: Duration,
    clock: C,
) -> PositioningSession
where
    C: Fn() -> i64,
{
    let period = interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("定位循环启动，周期 {} ms", period.as_millis());

    loop {
        tokio::select! {
            received = samples.recv() => match received {
                Some(sample) => {
                    session.ingest(&sample);
                }
                None => {
                    log::info!("信号通道关闭，停止定位");
                    break;
                }
            },
            _ = ticker.tick() => {
                if let Some(point) = session.tick(clock()) {
                    if events.send(PositioningEvent::Point(point)).await.is_err() {
                        log::warn!("事件接收端已关闭，停止定位");
                        return session;
                    }
                }
                if let Some(batch) = session.take_full_batch() {
                    if events.send(PositioningEvent::Batch(batch)).await.is_err() {
                        log::warn!("事件接收端已关闭，停止定位");
                        return session;
                    }
                }
            }
        }
    }

    if let Some(batch) = session.finish() {
        if events.send(PositioningEvent::Batch(batch)).await.is_err() {
            log::warn!("事件接收端已关闭，最后一批丢弃");
        }
    }
    log::info!("定位循环结束，共输出 {} 个轨迹点", session.points_emitted());
    session
}
