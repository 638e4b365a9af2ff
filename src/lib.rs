//! Xform Engine - 场景图变换与运动学层
//!
//! 模块划分：
//! - xform: 变换节点、层级管理、坐标系转换、朝向约束
//! - kinematics: 朝向 / 旋转、CCD IK 求解器、Boid 转向控制

pub mod xform;
pub mod kinematics;

pub use xform::{
    AxisMask, CameraXform, DebugGuides, DirtyFlags, LightXform, LocalTransformProvider,
    MeshXform, NodeId, NodeKind, OrientConstraint, Placement, XformNode, XformTree,
};
pub use kinematics::{BoidParams, Flock, IkConfig, IkSolver, KinematicsConfig};

use thiserror::Error;

/// 引擎错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XformError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {0} cannot be its own parent")]
    SelfParent(NodeId),

    #[error("Linking {child} under {parent} would create a cycle")]
    CycleDetected { child: NodeId, parent: NodeId },

    #[error("IK root {root} is not an ancestor of {node}")]
    NotAnAncestor { root: NodeId, node: NodeId },

    #[error("Parent of {0} has a singular world matrix")]
    SingularParent(NodeId),
}

pub type Result<T> = std::result::Result<T, XformError>;
