//! Boid 转向控制
//!
//! 每次更新：先把 heading 朝期望方向转动（不超过 angle_delta），
//! 再沿新的 heading 前进 forward_speed。
//! 与目标距离小于 avoid_radius 时期望方向取反（回避）。

use glam::Vec3;

use super::config::get_config;
use super::{EPSILON, MIN_ANGLE};
use crate::xform::{NodeId, XformTree};
use crate::Result;

/// Boid 参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoidParams {
    /// 每次更新前进距离（父空间单位）
    pub forward_speed: f32,
    /// 每次更新最大转向角（度）
    pub angle_delta: f32,
    /// 回避半径
    pub avoid_radius: f32,
}

impl Default for BoidParams {
    fn default() -> Self {
        let config = get_config();
        Self {
            forward_speed: config.boid_forward_speed,
            angle_delta: config.boid_angle_delta,
            avoid_radius: config.boid_avoid_radius,
        }
    }
}

impl XformTree {
    /// 单步转向 + 前进
    pub fn update_boid(
        &mut self,
        id: NodeId,
        target: Vec3,
        forward_speed: f32,
        angle_delta: f32,
        avoid_radius: f32,
    ) -> Result<()> {
        let position = self.abs_position(id)?;
        let to_target = target - position;
        let desired = if to_target.length() < avoid_radius {
            -to_target
        } else {
            to_target
        };

        if desired.length_squared() > EPSILON * EPSILON {
            let desired = desired.normalize();
            let heading = self.get_abs_heading(id)?;
            self.node_mut(id)?.debug.target_dir = desired;

            let error = heading.dot(desired).clamp(-1.0, 1.0).acos().to_degrees();
            let turn = error.min(angle_delta.max(0.0));
            if turn > MIN_ANGLE {
                let mut axis = heading.cross(desired);
                if axis.length_squared() < EPSILON * EPSILON {
                    // 正后方：绕自身 up 轴掉头
                    axis = self.get_abs_up_direction(id)?;
                }
                self.rotate(id, turn, position + axis.normalize_or_zero())?;
                if self.node(id)?.orient_constraints().is_enabled() {
                    self.apply_constraints(id)?;
                }
            }
        }

        // 沿更新后的 heading（父空间）前进
        let placement = *self.node(id)?.placement();
        let heading = placement.rotation() * Vec3::Z;
        self.set_origin(id, placement.origin + heading * forward_speed)
    }

    /// 使用 BoidParams 的便捷版本
    #[inline]
    pub fn update_boid_with(&mut self, id: NodeId, target: Vec3, params: &BoidParams) -> Result<()> {
        self.update_boid(id, target, params.forward_speed, params.angle_delta, params.avoid_radius)
    }
}

// ============================================================================
// 群体
// ============================================================================

/// 一组共享目标与参数的 boid
#[derive(Clone, Debug, Default)]
pub struct Flock {
    members: Vec<NodeId>,
    /// 转向参数
    pub params: BoidParams,
}

impl Flock {
    pub fn new(params: BoidParams) -> Self {
        Self {
            members: Vec::new(),
            params,
        }
    }

    pub fn add(&mut self, id: NodeId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    pub fn remove(&mut self, id: NodeId) {
        self.members.retain(|&member| member != id);
    }

    #[inline]
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// 更新所有成员，返回处于回避状态的成员数量
    pub fn step(&self, tree: &mut XformTree, target: Vec3) -> Result<usize> {
        let mut avoiding = 0;
        for &id in &self.members {
            if tree.abs_position(id)?.distance(target) < self.params.avoid_radius {
                avoiding += 1;
            }
            tree.update_boid_with(id, target, &self.params)?;
        }
        if get_config().debug_log {
            log::debug!("[Boid] {} 个成员中 {} 个在回避目标 {:?}", self.members.len(), avoiding, target);
        }
        Ok(avoiding)
    }
}
