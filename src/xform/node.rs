//! 变换节点
//!
//! XformNode 是场景图的核心单元，每个网格 / 相机 / 灯光对应一个节点。
//! 节点本身不拥有子节点，只记录句柄；所有会影响缓存的修改都经由 XformTree。

use std::collections::HashSet;

use glam::{Mat4, Vec3};

use super::provider::{LocalTransformProvider, NodeKind};
use super::{AxisMask, DirtyFlags, NodeId, OrientConstraint, Placement};

/// 调试辅助线（仅供外部线框渲染器读取）
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DebugGuides {
    /// 关节 / boid 指向目标的世界方向
    pub target_dir: Vec3,
    /// 关节指向末端点的世界方向
    pub end_effector_tip_dir: Vec3,
    /// 最近一次 rotate / orbit 的轴心点（父空间）
    pub local_pivot: Vec3,
    /// 最近一次 point_at 的目标点（父空间）
    pub local_target: Vec3,
}

/// 变换节点
///
/// 设计原则：
/// - 静态数据：名称、实体类型
/// - 动态数据：本地摆放、约束、层级关系
/// - 缓存：世界矩阵与法线矩阵，各自带脏标记
#[derive(Clone, Debug)]
pub struct XformNode {
    /// 节点名称
    pub name: String,

    /// 实体类型（决定本地矩阵的计算方式）
    pub(crate) kind: NodeKind,

    /// 本地摆放
    pub(crate) placement: Placement,

    /// 世界矩阵缓存
    pub(crate) xform: Mat4,

    /// 法线矩阵缓存
    pub(crate) normal_xform: Mat4,

    /// 缓存脏标记
    pub(crate) dirty: DirtyFlags,

    /// 朝向约束
    pub(crate) orient_constraints: OrientConstraint,

    /// 父节点（非拥有）
    pub(crate) parent: Option<NodeId>,

    /// 子节点集合
    pub(crate) children: HashSet<NodeId>,

    /// 调试辅助线
    pub debug: DebugGuides,
}

impl XformNode {
    /// 创建新节点，初始为脏
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            placement: Placement::default(),
            xform: Mat4::IDENTITY,
            normal_xform: Mat4::IDENTITY,
            dirty: DirtyFlags::all(),
            orient_constraints: OrientConstraint::default(),
            parent: None,
            children: HashSet::new(),
            debug: DebugGuides::default(),
        }
    }

    pub fn mesh(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Mesh(Default::default()))
    }

    pub fn camera(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Camera(Default::default()))
    }

    pub fn light(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Light(Default::default()))
    }

    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.placement.origin = origin;
        self
    }

    pub fn with_orient(mut self, orient: Vec3) -> Self {
        self.placement.orient = orient;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.placement.scale = scale;
        self
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.placement.origin
    }

    #[inline]
    pub fn orient(&self) -> Vec3 {
        self.placement.orient
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.placement.scale
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &HashSet<NodeId> {
        &self.children
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_dirty_xform(&self) -> bool {
        self.dirty.contains(DirtyFlags::XFORM)
    }

    #[inline]
    pub fn is_dirty_normal_xform(&self) -> bool {
        self.dirty.contains(DirtyFlags::NORMAL_XFORM)
    }

    // ========================================
    // 约束配置（不影响缓存）
    // ========================================

    #[inline]
    pub fn orient_constraints(&self) -> &OrientConstraint {
        &self.orient_constraints
    }

    pub fn set_orient_constraints(&mut self, constraints: OrientConstraint) {
        self.orient_constraints = constraints;
    }

    pub fn set_enable_orient_constraints(&mut self, enabled: AxisMask) {
        self.orient_constraints.enabled = enabled;
    }

    pub fn set_orient_constraints_center(&mut self, center: Vec3) {
        self.orient_constraints.center = center;
    }

    pub fn set_orient_constraints_max_deviation(&mut self, max_deviation: Vec3) {
        self.orient_constraints.max_deviation = max_deviation;
    }

    /// 当前朝向是否越界
    #[inline]
    pub fn is_violate_constraints(&self) -> bool {
        self.orient_constraints.is_violated(self.placement.orient)
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 本地矩阵 (local_to_parent)
    #[inline]
    pub fn local_xform(&self) -> Mat4 {
        self.kind.update_xform(&self.placement)
    }

    /// 仅由 orient 得到的旋转矩阵
    #[inline]
    pub fn local_rotate_xform(&self) -> Mat4 {
        Mat4::from_mat3(self.placement.rotation())
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = DirtyFlags::all();
    }
}
