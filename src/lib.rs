/// FlowTrack 室内定位与动线分析库
///
/// - `algorithms`: 信号平滑、距离模型、多边定位、自适应卡尔曼跟踪
/// - `positioning`: 单设备定位会话与异步定位循环
/// - `analysis`: 批量轨迹预处理、房间匹配、停留分段与迁移统计
/// - `config`: 各阶段配置
/// - `error`: 错误类型

pub mod algorithms;
pub mod analysis;
pub mod config;
pub mod error;
pub mod positioning;

pub use config::FlowTrackConfig;
pub use error::{AnchorIdError, ConfigError, MapError};
