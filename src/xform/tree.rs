//! 节点 arena 与层级管理
//!
//! XformTree 持有所有节点，父子关系以 NodeId 表示：
//! - 子节点 -> 父节点：非拥有句柄
//! - 父节点 -> 子节点：句柄集合
//!
//! 脏标记不变式：若某节点为脏，则其所有后代均为脏。
//! 因此传播时遇到已脏的后代即可停止，重算时只需向上走到第一个干净的祖先。

use std::collections::HashSet;

use glam::{Mat3, Mat4, Vec3};

use super::provider::LocalTransformProvider;
use super::{is_singular, DirtyFlags, NodeId, Placement, XformNode};
use crate::{Result, XformError};

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    node: Option<XformNode>,
}

/// 场景变换树（显式传递的场景上下文，不使用全局单例）
#[derive(Clone, Debug, Default)]
pub struct XformTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl XformTree {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    // ========================================
    // 节点存取
    // ========================================

    /// 插入节点（作为根节点），返回句柄
    pub fn insert(&mut self, mut node: XformNode) -> NodeId {
        node.parent = None;
        node.children.clear();
        node.mark_dirty();
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    /// 移除节点：先与父节点、子节点断开，保持父子对称
    pub fn remove(&mut self, id: NodeId) -> Result<XformNode> {
        self.link_parent(id, None, false)?;
        self.unlink_children(id)?;

        let slot = &mut self.slots[id.index()];
        let node = slot.node.take().ok_or(XformError::NodeNotFound(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Ok(node)
    }

    #[inline]
    fn get(&self, id: NodeId) -> Option<&XformNode> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> Option<&mut XformNode> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn node(&self, id: NodeId) -> Result<&XformNode> {
        self.get(id).ok_or(XformError::NodeNotFound(id))
    }

    /// 可变访问（只开放不影响缓存的字段：名称、约束、调试线）
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut XformNode> {
        self.get_mut(id).ok_or(XformError::NodeNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &XformNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (NodeId { index: index as u32, generation: slot.generation }, node)
            })
        })
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|(_, node)| node.name == name).map(|(id, _)| id)
    }

    // ========================================
    // 层级查询
    // ========================================

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&HashSet<NodeId>> {
        Ok(&self.node(id)?.children)
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.iter().filter(|(_, node)| node.is_root()).map(|(id, _)| id).collect()
    }

    /// 祖先列表，由近及远（不含自身）
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut cursor = self.node(id)?.parent;
        while let Some(p) = cursor {
            result.push(p);
            cursor = self.node(p)?.parent;
        }
        Ok(result)
    }

    /// `ancestor` 是否是 `node` 的（严格）祖先
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.get(node).and_then(|n| n.parent);
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.get(p).and_then(|n| n.parent);
        }
        false
    }

    // ========================================
    // 层级修改
    // ========================================

    /// 链接到新父节点（`None` 表示断开父节点）
    ///
    /// `keep_xform` 为 true 时重算本地摆放，使世界空间摆放保持不变：
    /// local = inverse(new_parent_world) * old_world
    /// 新父节点或自身世界矩阵奇异时无法求解，保留原本地摆放。
    pub fn link_parent(&mut self, child: NodeId, parent: Option<NodeId>, keep_xform: bool) -> Result<()> {
        self.node(child)?;
        if let Some(p) = parent {
            self.node(p)?;
            if p == child {
                log::warn!("[Xform] 节点 {} 不能作为自己的父节点", child);
                return Err(XformError::SelfParent(child));
            }
            if self.is_ancestor_of(child, p) {
                log::warn!("[Xform] 链接 {} -> {} 会形成环，已拒绝", child, p);
                return Err(XformError::CycleDetected { child, parent: p });
            }
        }

        if keep_xform {
            let world = self.get_xform(child)?;
            let parent_world = match parent {
                Some(p) => self.get_xform(p)?,
                None => Mat4::IDENTITY,
            };
            if is_singular(&parent_world) || is_singular(&world) {
                log::warn!("[Xform] {} 重新链接时世界矩阵奇异，保留原本地摆放", child);
            } else {
                let local = parent_world.inverse() * world;
                let node = self.node_mut(child)?;
                node.placement = node.kind.placement_from_xform(local, &node.placement);
            }
        }

        let old = self.node(child)?.parent;
        if let Some(old) = old {
            if let Some(old_parent) = self.get_mut(old) {
                old_parent.children.remove(&child);
            }
        }
        if let Some(p) = parent {
            self.node_mut(p)?.children.insert(child);
        }
        self.node_mut(child)?.parent = parent;

        self.propagate_dirty(child);
        Ok(())
    }

    /// 断开所有子节点；子节点本地摆放不变，因此其世界摆放会变化
    pub fn unlink_children(&mut self, id: NodeId) -> Result<()> {
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in children {
            if let Some(node) = self.get_mut(child) {
                node.parent = None;
            }
            self.propagate_dirty(child);
        }
        Ok(())
    }

    // ========================================
    // 摆放修改
    // ========================================

    pub fn set_origin(&mut self, id: NodeId, origin: Vec3) -> Result<()> {
        self.node_mut(id)?.placement.origin = origin;
        self.propagate_dirty(id);
        Ok(())
    }

    pub fn set_orient(&mut self, id: NodeId, orient: Vec3) -> Result<()> {
        self.node_mut(id)?.placement.orient = orient;
        self.propagate_dirty(id);
        Ok(())
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) -> Result<()> {
        self.node_mut(id)?.placement.scale = scale;
        self.propagate_dirty(id);
        Ok(())
    }

    pub fn set_placement(&mut self, id: NodeId, placement: Placement) -> Result<()> {
        self.node_mut(id)?.placement = placement;
        self.propagate_dirty(id);
        Ok(())
    }

    /// 恢复 origin = 0, orient = 0, scale = 1
    pub fn reset_xform(&mut self, id: NodeId) -> Result<()> {
        self.set_placement(id, Placement::default())
    }

    /// 标记自身及所有后代为脏
    pub fn mark_dirty_xform(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        self.propagate_dirty(id);
        Ok(())
    }

    fn propagate_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get_mut(current) else {
                continue;
            };
            // 已脏的后代，其子树必然也已脏
            if current != id && node.is_dirty_xform() {
                continue;
            }
            node.mark_dirty();
            stack.extend(node.children.iter().copied());
        }
    }

    // ========================================
    // 约束
    // ========================================

    pub fn is_violate_constraints(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.is_violate_constraints())
    }

    /// 把越界轴夹回范围内；返回是否有修改
    pub fn apply_constraints(&mut self, id: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        let orient = node.placement.orient;
        let clamped = node.orient_constraints.clamp(orient);
        if clamped == orient {
            return Ok(false);
        }
        self.set_orient(id, clamped)?;
        Ok(true)
    }

    // ========================================
    // 实体钩子
    // ========================================

    /// 把基矩阵烘焙进几何体；`None` 表示使用节点自身的本地矩阵
    pub fn rebase(&mut self, id: NodeId, basis: Option<Mat4>) -> Result<()> {
        let node = self.node_mut(id)?;
        let basis = basis.unwrap_or_else(|| node.local_xform());
        node.kind.rebase(basis);
        self.propagate_dirty(id);
        Ok(())
    }

    pub fn set_axis(&mut self, id: NodeId, axis: Vec3) -> Result<()> {
        self.node_mut(id)?.kind.set_axis(axis);
        self.propagate_dirty(id);
        Ok(())
    }

    /// 烘焙当前摆放并重置
    pub fn flatten(&mut self, id: NodeId) -> Result<()> {
        self.rebase(id, None)?;
        self.reset_xform(id)
    }

    /// 移动轴心到 `axis`（模型空间），同时平移 origin 使几何体的世界摆放不变
    pub fn center_axis(&mut self, id: NodeId, axis: Vec3) -> Result<()> {
        let node = self.node(id)?;
        if !node.kind.is_mesh() {
            return Ok(());
        }
        let new_origin = node.local_xform().transform_point3(axis);
        self.set_axis(id, axis)?;
        self.set_origin(id, new_origin)
    }

    // ========================================
    // 缓存读取
    // ========================================

    /// 世界矩阵，脏时重算
    pub fn get_xform(&mut self, id: NodeId) -> Result<Mat4> {
        let node = self.node(id)?;
        if !node.is_dirty_xform() {
            return Ok(node.xform);
        }

        // 向上收集脏节点，直到第一个干净的祖先
        let mut chain = vec![id];
        let mut base = Mat4::IDENTITY;
        let mut cursor = node.parent;
        while let Some(p) = cursor {
            let parent = self.node(p)?;
            if !parent.is_dirty_xform() {
                base = parent.xform;
                break;
            }
            chain.push(p);
            cursor = parent.parent;
        }

        // 自上而下重算
        for &current in chain.iter().rev() {
            let node = self.node_mut(current)?;
            base *= node.local_xform();
            node.xform = base;
            node.dirty.remove(DirtyFlags::XFORM);
        }
        Ok(base)
    }

    /// `trace_down = false` 时视为根节点，返回本地矩阵且不触碰缓存
    pub fn get_xform_traced(&mut self, id: NodeId, trace_down: bool) -> Result<Mat4> {
        if trace_down {
            self.get_xform(id)
        } else {
            Ok(self.node(id)?.local_xform())
        }
    }

    /// 法线矩阵：世界矩阵 3x3 部分的逆转置
    pub fn get_normal_xform(&mut self, id: NodeId) -> Result<Mat4> {
        let node = self.node(id)?;
        if !node.is_dirty_normal_xform() {
            return Ok(node.normal_xform);
        }

        let world = self.get_xform(id)?;
        let normal_xform = Mat4::from_mat3(Mat3::from_mat4(world).inverse().transpose());
        let node = self.node_mut(id)?;
        node.normal_xform = normal_xform;
        node.dirty.remove(DirtyFlags::NORMAL_XFORM);
        Ok(normal_xform)
    }

    pub fn get_local_rotate_xform(&self, id: NodeId) -> Result<Mat4> {
        Ok(self.node(id)?.local_rotate_xform())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xform::{AxisMask, OrientConstraint};

    fn abs_pos(tree: &mut XformTree, id: NodeId) -> Vec3 {
        tree.get_xform(id).unwrap().transform_point3(Vec3::ZERO)
    }

    #[test]
    fn test_two_level_composition() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::mesh("p").with_origin(Vec3::new(1.0, 0.0, 0.0)));
        let child = tree.insert(XformNode::mesh("c").with_origin(Vec3::new(0.0, 2.0, 0.0)));
        tree.link_parent(child, Some(parent), false).unwrap();

        assert!(abs_pos(&mut tree, child).abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
        assert!(!tree.node(parent).unwrap().is_dirty_xform());
    }

    #[test]
    fn test_cache_coherence_through_parent() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::mesh("p"));
        let child = tree.insert(XformNode::mesh("c").with_origin(Vec3::X));
        let grandchild = tree.insert(XformNode::mesh("g").with_origin(Vec3::Y));
        tree.link_parent(child, Some(parent), false).unwrap();
        tree.link_parent(grandchild, Some(child), false).unwrap();

        let before = tree.get_xform(grandchild).unwrap();
        tree.set_origin(parent, Vec3::new(0.0, 0.0, 5.0)).unwrap();
        assert!(tree.node(grandchild).unwrap().is_dirty_xform());

        let after = tree.get_xform(grandchild).unwrap();
        assert_ne!(before, after);
        assert!(after.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(1.0, 1.0, 5.0), 1e-6));

        tree.set_orient(child, Vec3::new(0.0, 0.0, 90.0)).unwrap();
        tree.set_scale(child, Vec3::splat(2.0)).unwrap();
        let rotated = abs_pos(&mut tree, grandchild);
        assert!(rotated.abs_diff_eq(Vec3::new(-1.0, 0.0, 5.0), 1e-5));
    }

    #[test]
    fn test_reading_parent_keeps_child_dirty() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::mesh("p"));
        let child = tree.insert(XformNode::mesh("c"));
        tree.link_parent(child, Some(parent), false).unwrap();

        tree.get_xform(parent).unwrap();
        assert!(tree.node(child).unwrap().is_dirty_xform());
        tree.get_xform(child).unwrap();
        assert!(!tree.node(child).unwrap().is_dirty_xform());
        assert!(tree.node(child).unwrap().is_dirty_normal_xform());
    }

    #[test]
    fn test_keep_xform_preserves_abs_position() {
        let mut tree = XformTree::new();
        let p1 = tree.insert(XformNode::mesh("p1").with_origin(Vec3::new(2.0, 3.0, 4.0)));
        let child = tree.insert(XformNode::mesh("c").with_origin(Vec3::new(3.0, 2.0, 1.0)));
        tree.link_parent(child, Some(p1), false).unwrap();
        assert!(abs_pos(&mut tree, child).abs_diff_eq(Vec3::splat(5.0), 1e-5));

        let p2 = tree.insert(
            XformNode::mesh("p2")
                .with_origin(Vec3::new(-1.0, 7.0, 0.5))
                .with_orient(Vec3::new(25.0, -40.0, 10.0))
                .with_scale(Vec3::splat(1.5)),
        );
        tree.link_parent(child, Some(p2), true).unwrap();

        assert!(abs_pos(&mut tree, child).abs_diff_eq(Vec3::splat(5.0), 1e-4));
        assert!(tree.children(p1).unwrap().is_empty());
        assert!(tree.children(p2).unwrap().contains(&child));
    }

    #[test]
    fn test_keep_xform_under_zero_scale_parent() {
        let mut tree = XformTree::new();
        let flat = tree.insert(XformNode::mesh("flat").with_scale(Vec3::new(0.0, 1.0, 1.0)));
        let child = tree.insert(
            XformNode::mesh("c")
                .with_origin(Vec3::new(1.0, 2.0, 3.0))
                .with_orient(Vec3::new(0.0, 30.0, 0.0)),
        );
        let before = *tree.node(child).unwrap().placement();

        tree.link_parent(child, Some(flat), true).unwrap();
        assert_eq!(*tree.node(child).unwrap().placement(), before);
        assert_eq!(tree.parent(child).unwrap(), Some(flat));
        assert!(tree.get_xform(child).unwrap().is_finite());

        // 自身零缩放时同样保留本地摆放
        let parent = tree.insert(XformNode::mesh("p").with_origin(Vec3::X));
        tree.set_scale(child, Vec3::ZERO).unwrap();
        tree.link_parent(child, Some(parent), true).unwrap();
        assert_eq!(tree.node(child).unwrap().origin(), Vec3::new(1.0, 2.0, 3.0));
        assert!(tree.node(child).unwrap().placement().orient.is_finite());
    }

    #[test]
    fn test_link_without_keep_moves_child() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::mesh("p").with_origin(Vec3::new(10.0, 0.0, 0.0)));
        let child = tree.insert(XformNode::mesh("c").with_origin(Vec3::Y));
        abs_pos(&mut tree, child);

        tree.link_parent(child, Some(parent), false).unwrap();
        assert_eq!(tree.node(child).unwrap().origin(), Vec3::Y);
        assert!(abs_pos(&mut tree, child).abs_diff_eq(Vec3::new(10.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_unlink_children_symmetry() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::mesh("p").with_origin(Vec3::X));
        let a = tree.insert(XformNode::mesh("a").with_origin(Vec3::Y));
        let b = tree.insert(XformNode::mesh("b"));
        tree.link_parent(a, Some(parent), false).unwrap();
        tree.link_parent(b, Some(parent), false).unwrap();
        assert!(abs_pos(&mut tree, a).abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));

        tree.unlink_children(parent).unwrap();
        assert!(tree.children(parent).unwrap().is_empty());
        assert_eq!(tree.parent(a).unwrap(), None);
        assert_eq!(tree.parent(b).unwrap(), None);
        // 本地摆放不变，父空间即世界空间
        assert!(abs_pos(&mut tree, a).abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_reject_self_parent_and_cycle() {
        let mut tree = XformTree::new();
        let a = tree.insert(XformNode::mesh("a"));
        let b = tree.insert(XformNode::mesh("b"));
        let c = tree.insert(XformNode::mesh("c"));
        tree.link_parent(b, Some(a), false).unwrap();
        tree.link_parent(c, Some(b), false).unwrap();

        assert_eq!(tree.link_parent(a, Some(a), false), Err(XformError::SelfParent(a)));
        assert_eq!(
            tree.link_parent(a, Some(c), false),
            Err(XformError::CycleDetected { child: a, parent: c })
        );
        // 树保持不变
        assert_eq!(tree.parent(a).unwrap(), None);
        assert_eq!(tree.ancestors(c).unwrap(), vec![b, a]);
    }

    #[test]
    fn test_remove_detaches_and_invalidates_handle() {
        let mut tree = XformTree::new();
        let a = tree.insert(XformNode::mesh("a"));
        let b = tree.insert(XformNode::mesh("b"));
        let c = tree.insert(XformNode::mesh("c"));
        tree.link_parent(b, Some(a), false).unwrap();
        tree.link_parent(c, Some(b), false).unwrap();

        let removed = tree.remove(b).unwrap();
        assert_eq!(removed.name, "b");
        assert!(tree.children(a).unwrap().is_empty());
        assert_eq!(tree.parent(c).unwrap(), None);
        assert_eq!(tree.len(), 2);

        let d = tree.insert(XformNode::light("d"));
        assert_eq!(d.index(), b.index());
        assert_eq!(tree.node(b).err(), Some(XformError::NodeNotFound(b)));
        assert_eq!(tree.find_by_name("d"), Some(d));
    }

    #[test]
    fn test_normal_xform_non_uniform_scale() {
        let mut tree = XformTree::new();
        let id = tree.insert(XformNode::mesh("n").with_scale(Vec3::new(2.0, 1.0, 1.0)));
        let normal = tree.get_normal_xform(id).unwrap();

        // 法线 (1,1,0) 在 X 方向被压缩
        let n = normal.transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert!(n.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-6));
        assert!(!tree.node(id).unwrap().is_dirty_normal_xform());

        tree.set_scale(id, Vec3::ONE).unwrap();
        assert!(tree.node(id).unwrap().is_dirty_normal_xform());
        assert!(tree.get_normal_xform(id).unwrap().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_trace_down_false_ignores_parent() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::mesh("p").with_origin(Vec3::splat(3.0)));
        let child = tree.insert(XformNode::mesh("c").with_origin(Vec3::X));
        tree.link_parent(child, Some(parent), false).unwrap();

        let local = tree.get_xform_traced(child, false).unwrap();
        assert!(local.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::X, 1e-6));
        assert!(tree.node(child).unwrap().is_dirty_xform());
    }

    #[test]
    fn test_apply_constraints_idempotent() {
        let mut tree = XformTree::new();
        let id = tree.insert(XformNode::mesh("j").with_orient(Vec3::new(70.0, -100.0, 10.0)));
        tree.node_mut(id)
            .unwrap()
            .set_orient_constraints(OrientConstraint::new(AxisMask::X | AxisMask::Y, Vec3::ZERO, Vec3::new(30.0, 45.0, 0.0)));

        assert!(tree.is_violate_constraints(id).unwrap());
        assert!(tree.apply_constraints(id).unwrap());
        let once = tree.node(id).unwrap().orient();
        assert!(!tree.apply_constraints(id).unwrap());
        assert_eq!(tree.node(id).unwrap().orient(), once);
        assert!(once.abs_diff_eq(Vec3::new(30.0, -45.0, 10.0), 1e-4));
    }

    #[test]
    fn test_flatten_bakes_placement() {
        let mut tree = XformTree::new();
        let id = tree.insert(
            XformNode::mesh("boid")
                .with_origin(Vec3::new(1.0, 2.0, 3.0))
                .with_scale(Vec3::new(0.0625, 0.0625, 0.25)),
        );
        let before = tree.get_xform(id).unwrap();
        tree.flatten(id).unwrap();

        let node = tree.node(id).unwrap();
        assert_eq!(*node.placement(), Placement::default());
        let basis = node.kind().as_mesh().map(|m| m.geometry_basis).unwrap_or(Mat4::IDENTITY);
        assert!(basis.abs_diff_eq(before, 1e-6));
    }

    #[test]
    fn test_center_axis_keeps_geometry() {
        let mut tree = XformTree::new();
        let id = tree.insert(
            XformNode::mesh("m")
                .with_origin(Vec3::new(4.0, 0.0, 0.0))
                .with_orient(Vec3::new(0.0, 30.0, 0.0)),
        );
        let probe = Vec3::new(0.5, 1.0, 2.0);
        let before = tree.get_xform(id).unwrap().transform_point3(probe);

        tree.center_axis(id, Vec3::new(0.0, 0.0, 2.0)).unwrap();
        let after = tree.get_xform(id).unwrap().transform_point3(probe);
        assert!(before.abs_diff_eq(after, 1e-5));
    }
}
