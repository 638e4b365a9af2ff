//! IK 求解器 - CCD（循环坐标下降）
//!
//! 设计原则：
//! - 从末端节点开始沿祖先链走向根节点，逐个关节贪心旋转
//! - 每调整一个关节后立即重新测量末端位置
//! - 支持单步角度限制与关节朝向约束
//! - 不收敛时保留部分结果，不回滚

use glam::Vec3;

use super::config::get_config;
use super::{EPSILON, MIN_ANGLE};
use crate::xform::{NodeId, XformTree};
use crate::{Result, XformError};

// ============================================================================
// IK 配置
// ============================================================================

/// IK 配置
#[derive(Clone, Debug, PartialEq)]
pub struct IkConfig {
    /// 迭代次数
    pub iterations: u32,
    /// 末端到目标的可接受距离
    pub accept_distance: f32,
    /// 单个关节单步最大旋转角（度）
    pub limit_angle: Option<f32>,
}

impl Default for IkConfig {
    fn default() -> Self {
        let config = get_config();
        Self {
            iterations: config.ik_iterations,
            accept_distance: config.ik_accept_distance,
            limit_angle: config.ik_limit_angle,
        }
    }
}

// ============================================================================
// IK 求解器
// ============================================================================

/// IK 求解器
#[derive(Clone, Debug)]
pub struct IkSolver {
    /// 末端节点
    pub end_effector: NodeId,
    /// 链的根节点（包含）
    pub root: NodeId,
    /// 末端节点本地空间中的末端点
    pub local_tip: Vec3,
    /// IK 配置
    pub config: IkConfig,
    /// 是否启用
    pub enabled: bool,
}

impl IkSolver {
    /// 创建新的 IK 求解器
    pub fn new(end_effector: NodeId, root: NodeId, local_tip: Vec3, config: IkConfig) -> Self {
        Self {
            end_effector,
            root,
            local_tip,
            config,
            enabled: true,
        }
    }

    /// 关节链：末端节点 .. 根节点（含两端）
    pub fn chain(&self, tree: &XformTree) -> Result<Vec<NodeId>> {
        let mut chain = vec![self.end_effector];
        if self.root == self.end_effector {
            return Ok(chain);
        }
        for ancestor in tree.ancestors(self.end_effector)? {
            chain.push(ancestor);
            if ancestor == self.root {
                return Ok(chain);
            }
        }
        Err(XformError::NotAnAncestor {
            root: self.root,
            node: self.end_effector,
        })
    }

    /// 求解 IK，返回末端是否到达可接受距离内
    pub fn solve(&self, tree: &mut XformTree, target: Vec3) -> Result<bool> {
        let chain = self.chain(tree)?;
        let mut effector = tree.map_to_abs_coord(self.end_effector, self.local_tip)?;

        if !self.enabled {
            return Ok(effector.distance(target) <= self.config.accept_distance);
        }

        // 迭代求解
        for iteration in 0..self.config.iterations {
            if effector.distance(target) <= self.config.accept_distance {
                self.log_result(iteration, effector.distance(target), true);
                return Ok(true);
            }
            for &joint in &chain {
                self.solve_joint(tree, joint, effector, target)?;
                effector = tree.map_to_abs_coord(self.end_effector, self.local_tip)?;
            }
        }

        let distance = effector.distance(target);
        let converged = distance <= self.config.accept_distance;
        self.log_result(self.config.iterations, distance, converged);
        Ok(converged)
    }

    /// 单个关节：把末端方向转向目标方向
    fn solve_joint(&self, tree: &mut XformTree, joint: NodeId, effector: Vec3, target: Vec3) -> Result<()> {
        let joint_pos = tree.abs_position(joint)?;

        let effector_vec = (effector - joint_pos).normalize_or_zero();
        let target_vec = (target - joint_pos).normalize_or_zero();

        {
            let debug = &mut tree.node_mut(joint)?.debug;
            debug.end_effector_tip_dir = effector_vec;
            debug.target_dir = target_vec;
        }

        if effector_vec == Vec3::ZERO || target_vec == Vec3::ZERO {
            return Ok(());
        }

        let dot = effector_vec.dot(target_vec).clamp(-1.0, 1.0);
        let mut angle = dot.acos().to_degrees();
        if angle < MIN_ANGLE {
            return Ok(());
        }

        let axis = effector_vec.cross(target_vec);
        if axis.length_squared() < EPSILON * EPSILON {
            // 反向共线，旋转轴不确定
            return Ok(());
        }

        if let Some(limit) = self.config.limit_angle {
            angle = angle.min(limit);
        }

        tree.rotate(joint, angle, joint_pos + axis.normalize())?;

        if tree.node(joint)?.orient_constraints().is_enabled() {
            tree.apply_constraints(joint)?;
        }
        Ok(())
    }

    fn log_result(&self, iterations: u32, distance: f32, converged: bool) {
        if get_config().debug_log {
            log::info!(
                "[IK] 末端 {} 根 {}: 迭代 {} 次, 距离 {:.4}, 收敛={}",
                self.end_effector, self.root, iterations, distance, converged
            );
        }
    }
}

impl XformTree {
    /// CCD IK：旋转 `id` 到 `root` 之间的关节，使末端点逼近 `target`
    pub fn solve_ik_ccd(
        &mut self,
        id: NodeId,
        root: NodeId,
        local_end_effector_tip: Vec3,
        target: Vec3,
        iters: u32,
        accept_distance: f32,
    ) -> Result<bool> {
        let config = IkConfig {
            iterations: iters,
            accept_distance,
            limit_angle: None,
        };
        IkSolver::new(id, root, local_end_effector_tip, config).solve(self, target)
    }
}
