//! 本地矩阵提供者
//!
//! 每种实体类型决定如何由 Placement 计算本地矩阵 (local_to_parent)。
//! NodeKind 以枚举分发代替继承。

use glam::{Mat4, Vec3};

use super::Placement;

/// 本地变换能力接口
pub trait LocalTransformProvider {
    /// 计算本地矩阵
    fn update_xform(&self, placement: &Placement) -> Mat4;

    /// update_xform 的逆：给定期望的本地矩阵，求出对应摆放
    fn placement_from_xform(&self, xform: Mat4, current: &Placement) -> Placement;

    /// 把基矩阵烘焙进几何体（默认无操作）
    fn rebase(&mut self, _basis: Mat4) {}

    /// 设置旋转轴心（默认无操作）
    fn set_axis(&mut self, _axis: Vec3) {}
}

// ============================================================================
// 网格
// ============================================================================

/// 网格变换状态
///
/// `pivot` 位于模型空间，旋转与缩放都围绕它进行；
/// `geometry_basis` 由外部几何模块应用到顶点上。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshXform {
    pub pivot: Vec3,
    pub geometry_basis: Mat4,
}

impl Default for MeshXform {
    fn default() -> Self {
        Self {
            pivot: Vec3::ZERO,
            geometry_basis: Mat4::IDENTITY,
        }
    }
}

impl LocalTransformProvider for MeshXform {
    fn update_xform(&self, placement: &Placement) -> Mat4 {
        placement.to_matrix() * Mat4::from_translation(-self.pivot)
    }

    fn placement_from_xform(&self, xform: Mat4, _current: &Placement) -> Placement {
        Placement::from_matrix(xform * Mat4::from_translation(self.pivot))
    }

    fn rebase(&mut self, basis: Mat4) {
        // basis 已包含 T(-pivot)，烘焙后轴心回到模型原点
        self.geometry_basis = basis * self.geometry_basis;
        self.pivot = Vec3::ZERO;
    }

    fn set_axis(&mut self, axis: Vec3) {
        self.pivot = axis;
    }
}

// ============================================================================
// 相机 / 灯光
// ============================================================================

/// 相机变换：忽略缩放
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraXform;

impl LocalTransformProvider for CameraXform {
    fn update_xform(&self, placement: &Placement) -> Mat4 {
        Mat4::from_translation(placement.origin) * Mat4::from_mat3(placement.rotation())
    }

    fn placement_from_xform(&self, xform: Mat4, current: &Placement) -> Placement {
        Placement::from_rigid_matrix(xform, current.scale)
    }
}

/// 灯光变换：只需位置与方向，忽略缩放
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LightXform;

impl LocalTransformProvider for LightXform {
    fn update_xform(&self, placement: &Placement) -> Mat4 {
        Mat4::from_translation(placement.origin) * Mat4::from_mat3(placement.rotation())
    }

    fn placement_from_xform(&self, xform: Mat4, current: &Placement) -> Placement {
        Placement::from_rigid_matrix(xform, current.scale)
    }
}

// ============================================================================
// 分发
// ============================================================================

/// 节点实体类型
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    Mesh(MeshXform),
    Camera(CameraXform),
    Light(LightXform),
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Mesh(MeshXform::default())
    }
}

impl NodeKind {
    #[inline]
    pub fn is_mesh(&self) -> bool {
        matches!(self, NodeKind::Mesh(_))
    }

    #[inline]
    pub fn as_mesh(&self) -> Option<&MeshXform> {
        match self {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

impl LocalTransformProvider for NodeKind {
    fn update_xform(&self, placement: &Placement) -> Mat4 {
        match self {
            NodeKind::Mesh(p) => p.update_xform(placement),
            NodeKind::Camera(p) => p.update_xform(placement),
            NodeKind::Light(p) => p.update_xform(placement),
        }
    }

    fn placement_from_xform(&self, xform: Mat4, current: &Placement) -> Placement {
        match self {
            NodeKind::Mesh(p) => p.placement_from_xform(xform, current),
            NodeKind::Camera(p) => p.placement_from_xform(xform, current),
            NodeKind::Light(p) => p.placement_from_xform(xform, current),
        }
    }

    fn rebase(&mut self, basis: Mat4) {
        match self {
            NodeKind::Mesh(p) => p.rebase(basis),
            NodeKind::Camera(p) => p.rebase(basis),
            NodeKind::Light(p) => p.rebase(basis),
        }
    }

    fn set_axis(&mut self, axis: Vec3) {
        match self {
            NodeKind::Mesh(p) => p.set_axis(axis),
            NodeKind::Camera(p) => p.set_axis(axis),
            NodeKind::Light(p) => p.set_axis(axis),
        }
    }
}
