//! 朝向与旋转
//!
//! 所有角度为角度制。本地基约定：heading = +Z，up = +Y，left = +X。
//! 退化几何（零长度方向、前向与 up 平行、零长度旋转轴、奇异父矩阵）一律跳过，不写入 NaN。

use glam::{Mat3, Mat4, Vec3};

use super::EPSILON;
use crate::xform::{orient_from_rotation, NodeId, XformTree};
use crate::Result;

impl XformTree {
    /// 令节点朝向父空间中的点 `local_target`
    ///
    /// `up_direction` 同样位于父空间，默认 +Y。返回是否实际修改了朝向。
    pub fn point_at_local(&mut self, id: NodeId, local_target: Vec3, up_direction: Option<Vec3>) -> Result<bool> {
        let origin = self.node(id)?.origin();
        self.node_mut(id)?.debug.local_target = local_target;

        let forward = local_target - origin;
        if forward.length_squared() < EPSILON * EPSILON {
            log::debug!("[Xform] {} point_at: 目标与原点重合，跳过", id);
            return Ok(false);
        }
        let forward = forward.normalize();

        let up = up_direction.unwrap_or(Vec3::Y);
        let left = up.cross(forward);
        if left.length_squared() < EPSILON * EPSILON {
            log::debug!("[Xform] {} point_at: 前向与 up 平行，跳过", id);
            return Ok(false);
        }
        let left = left.normalize();
        let up = forward.cross(left);

        let basis = Mat3::from_cols(left, up, forward);
        self.set_orient(id, orient_from_rotation(basis))?;
        Ok(true)
    }

    /// 令节点朝向世界空间中的点 `target`（`up_direction` 为世界方向）
    pub fn point_at(&mut self, id: NodeId, target: Vec3, up_direction: Option<Vec3>) -> Result<bool> {
        let Some(to_parent) = self.parent_inverse(id)? else {
            log::debug!("[Xform] {} point_at: 父节点矩阵奇异，跳过", id);
            return Ok(false);
        };
        let local_target = to_parent.transform_point3(target);
        let up = match up_direction {
            Some(up) => Some(self.map_dir_to_parent_coord(id, up)?),
            None => None,
        };
        self.point_at_local(id, local_target, up)
    }

    /// 绕过节点原点的轴旋转 `angle_delta` 度
    ///
    /// 旋转轴为世界空间中从节点原点指向 `pivot` 的方向；原点保持不动。
    pub fn rotate(&mut self, id: NodeId, angle_delta: f32, pivot: Vec3) -> Result<bool> {
        let position = self.abs_position(id)?;
        let axis = self.map_dir_to_parent_coord(id, pivot - position)?;
        if (pivot - position).length_squared() < EPSILON * EPSILON || axis == Vec3::ZERO {
            log::debug!("[Xform] {} rotate: 旋转轴退化，跳过", id);
            return Ok(false);
        }

        let origin = self.node(id)?.origin();
        let local_pivot = self.map_to_parent_coord(id, pivot)?;
        self.apply_pivot_rotation(id, angle_delta, axis, origin)?;
        self.node_mut(id)?.debug.local_pivot = local_pivot;
        Ok(true)
    }

    /// 绕任意世界空间点 `center` 与世界方向 `axis` 旋转，原点随之移动
    pub fn orbit(&mut self, id: NodeId, angle_delta: f32, axis: Vec3, center: Vec3) -> Result<bool> {
        let axis = self.map_dir_to_parent_coord(id, axis)?;
        if axis == Vec3::ZERO {
            log::debug!("[Xform] {} orbit: 旋转轴为零，跳过", id);
            return Ok(false);
        }
        let center = self.map_to_parent_coord(id, center)?;
        self.apply_pivot_rotation(id, angle_delta, axis, center)?;
        self.node_mut(id)?.debug.local_pivot = center;
        Ok(true)
    }

    /// 父空间中的枢轴旋转：T(center) * R * T(-center) 左乘到 T(origin) * R(orient)
    fn apply_pivot_rotation(&mut self, id: NodeId, angle_delta: f32, axis: Vec3, center: Vec3) -> Result<()> {
        let placement = *self.node(id)?.placement();
        let turn = Mat3::from_axis_angle(axis, angle_delta.to_radians());

        let pivot_xform = Mat4::from_translation(center) * Mat4::from_mat3(turn) * Mat4::from_translation(-center);
        let rigid = pivot_xform * Mat4::from_translation(placement.origin) * Mat4::from_mat3(placement.rotation());

        let mut next = placement;
        next.origin = rigid.w_axis.truncate();
        next.orient = orient_from_rotation(Mat3::from_mat4(rigid));
        self.set_placement(id, next)
    }
}
