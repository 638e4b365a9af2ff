//! 运动学系统
//!
//! 建立在 XformTree 变换原语之上：
//! - orient: point_at / point_at_local / rotate / orbit
//! - IkSolver: CCD 迭代 IK
//! - boid: 限制转向速率的目标追踪 / 回避

mod boid;
mod config;
mod ik_solver;
mod orient;

pub use boid::{BoidParams, Flock};
pub use config::{get_config, reset_config, set_config, KinematicsConfig};
pub use ik_solver::{IkConfig, IkSolver};

/// 退化判定阈值（向量长度）
pub(crate) const EPSILON: f32 = 1.0e-6;

/// 小于该角度（度）的旋转直接跳过
pub(crate) const MIN_ANGLE: f32 = 1.0e-3;
