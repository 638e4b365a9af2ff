//! 运动学配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 核心运算都显式接收参数，这里只提供默认值与调试开关。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 运动学配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicsConfig {
    // ========== IK ==========
    /// CCD 迭代次数，默认 16
    pub ik_iterations: u32,
    /// 末端到目标的可接受距离，默认 0.01
    pub ik_accept_distance: f32,
    /// 单个关节单步最大旋转角（度），默认不限制
    pub ik_limit_angle: Option<f32>,

    // ========== Boid ==========
    /// 每次更新前进距离，默认 0.025
    pub boid_forward_speed: f32,
    /// 每次更新最大转向角（度），默认 2.5
    pub boid_angle_delta: f32,
    /// 回避半径，默认 1.0
    pub boid_avoid_radius: f32,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            // ====== IK ======
            // 两到三节的链 16 次迭代足够收敛
            ik_iterations: 16,
            ik_accept_distance: 0.01,
            ik_limit_angle: None,

            // ====== Boid ======
            // 与 boids 演示一致
            boid_forward_speed: 0.025,
            boid_angle_delta: 2.5,
            boid_avoid_radius: 1.0,

            debug_log: false,
        }
    }
}

/// 全局配置实例
static KINEMATICS_CONFIG: Lazy<RwLock<KinematicsConfig>> = Lazy::new(|| {
    RwLock::new(KinematicsConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> KinematicsConfig {
    KINEMATICS_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: KinematicsConfig) {
    *KINEMATICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *KINEMATICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = KinematicsConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = KinematicsConfig::default();
        assert_eq!(config.ik_iterations, 16);
        assert!((config.boid_angle_delta - 2.5).abs() < f32::EPSILON);
        assert!(!config.debug_log);
    }
}
