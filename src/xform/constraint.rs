//! 朝向约束
//!
//! 每个轴可独立启用：|wrap(orient - center)| <= max_deviation

use glam::Vec3;

use super::{wrap_degrees, AxisMask};

/// 按轴朝向约束（角度制）
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrientConstraint {
    /// 启用的轴
    pub enabled: AxisMask,
    /// 约束中心
    pub center: Vec3,
    /// 最大偏离
    pub max_deviation: Vec3,
}

impl OrientConstraint {
    pub fn new(enabled: AxisMask, center: Vec3, max_deviation: Vec3) -> Self {
        Self {
            enabled,
            center,
            max_deviation,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        !self.enabled.is_empty()
    }

    /// 是否有任一启用轴越界
    pub fn is_violated(&self, orient: Vec3) -> bool {
        (0..3).any(|axis| self.axis_violation(orient, axis).is_some())
    }

    /// 把越界轴夹到最近的边界，未越界或未启用的轴保持不变
    pub fn clamp(&self, orient: Vec3) -> Vec3 {
        let mut clamped = orient;
        for axis in 0..3 {
            if let Some(deviation) = self.axis_violation(orient, axis) {
                let max = self.max_deviation[axis].abs();
                clamped[axis] = self.center[axis] + deviation.clamp(-max, max);
            }
        }
        clamped
    }

    /// 越界时返回归一化后的偏离量
    fn axis_violation(&self, orient: Vec3, axis: usize) -> Option<f32> {
        if !self.enabled.contains(AxisMask::from_index(axis)) {
            return None;
        }
        let deviation = wrap_degrees(orient[axis] - self.center[axis]);
        if deviation.abs() > self.max_deviation[axis].abs() {
            Some(deviation)
        } else {
            None
        }
    }
}
