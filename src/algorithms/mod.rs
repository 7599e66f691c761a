/// 定位算法模块
///
/// 该模块提供设备端定位流水线的各个组件：
/// - 信标标识与运行时状态
/// - RSSI 平滑（中值、EMA、组合）
/// - RSSI 转距离模型与融合权重
/// - 多边定位（加权质心、迭代加权最小二乘）
/// - 自适应卡尔曼跟踪（马氏距离门控）

pub mod beacon;
pub mod kalman;
pub mod location_algorithms;
pub mod results;
pub mod rssi_model;
pub mod smoother;
pub mod weight;

pub use beacon::*;
pub use kalman::*;
pub use location_algorithms::*;
pub use results::*;
pub use rssi_model::*;
pub use smoother::*;
pub use weight::*;
