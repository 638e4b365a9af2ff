//! 变换系统
//!
//! 核心设计思想：
//! - XformNode: 单个可定位对象（网格、相机、灯光）的本地变换与缓存
//! - XformTree: 节点 arena，管理父子关系与脏标记传播
//! - LocalTransformProvider: 不同实体类型各自计算本地矩阵
//! - 世界矩阵惰性计算：world = parent.world * local，只在读取时重算

mod constraint;
mod coords;
mod euler;
mod node;
mod provider;
mod tree;

pub use constraint::OrientConstraint;
pub use euler::{orient_from_rotation, rotation_from_orient, wrap_degrees};
pub use node::{DebugGuides, XformNode};
pub use provider::{CameraXform, LightXform, LocalTransformProvider, MeshXform, NodeKind};
pub use tree::XformTree;

use std::fmt;

use bitflags::bitflags;
use glam::{Mat3, Mat4, Vec3};

// ============================================================================
// 节点句柄
// ============================================================================

/// 节点句柄（带代数，槽位复用后旧句柄失效）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// 槽位索引
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

// ============================================================================
// 标志位
// ============================================================================

bitflags! {
    /// 缓存脏标记
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        /// 世界矩阵过期
        const XFORM = 1 << 0;
        /// 法线矩阵过期
        const NORMAL_XFORM = 1 << 1;
    }
}

bitflags! {
    /// 按轴启用的开关（朝向约束用）
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AxisMask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
    }
}

impl AxisMask {
    /// 分量索引 -> 轴标志
    #[inline]
    pub fn from_index(axis: usize) -> Self {
        match axis {
            0 => Self::X,
            1 => Self::Y,
            2 => Self::Z,
            _ => Self::empty(),
        }
    }
}

/// 行列式绝对值低于该值的矩阵视为奇异（例如零缩放）
pub(crate) const SINGULAR_DETERMINANT: f32 = 1.0e-12;

/// 矩阵不可逆（零缩放或已含 NaN）
#[inline]
pub(crate) fn is_singular(m: &Mat4) -> bool {
    let det = m.determinant();
    !det.is_finite() || det.abs() < SINGULAR_DETERMINANT
}

// ============================================================================
// 本地摆放
// ============================================================================

/// 节点本地摆放：位置 / 欧拉角（度）/ 缩放
///
/// 欧拉角分量：x = pitch（绕 X），y = yaw（绕 Y），z = roll（绕 Z）。
/// 旋转组合顺序固定为 R = Ry(yaw) * Rx(pitch) * Rz(roll)。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub origin: Vec3,
    pub orient: Vec3,
    pub scale: Vec3,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            orient: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Placement {
    /// 仅旋转部分
    #[inline]
    pub fn rotation(&self) -> Mat3 {
        rotation_from_orient(self.orient)
    }

    /// 转换为 4x4 矩阵：T * R * S
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.origin)
            * Mat4::from_mat3(self.rotation())
            * Mat4::from_scale(self.scale)
    }

    /// 从矩阵分解（剪切会被丢弃）
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            origin: translation,
            orient: orient_from_rotation(Mat3::from_quat(rotation)),
            scale,
        }
    }

    /// 从矩阵分解，但保留原有缩放（忽略缩放的实体用）
    pub(crate) fn from_rigid_matrix(m: Mat4, scale: Vec3) -> Self {
        let (_, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            origin: translation,
            orient: orient_from_rotation(Mat3::from_quat(rotation)),
            scale,
        }
    }
}
