//! 坐标系转换
//!
//! 本地空间 / 父空间 / 世界空间之间的点与方向转换，全部基于当前世界矩阵。
//! 父节点世界矩阵奇异（零缩放）时，父空间点转换返回 `SingularParent`，方向转换返回零向量。

use glam::{Mat4, Quat, Vec3};

use super::{is_singular, NodeId, XformTree};
use crate::{Result, XformError};

impl XformTree {
    /// 本地点 -> 世界坐标
    pub fn map_to_abs_coord(&mut self, id: NodeId, local_point: Vec3) -> Result<Vec3> {
        Ok(self.get_xform(id)?.transform_point3(local_point))
    }

    /// 节点原点（旋转中心）的世界坐标：parent_world * origin
    ///
    /// 网格设置了轴心时，它与 `map_to_abs_coord(id, Vec3::ZERO)`（模型空间零点）不同。
    pub fn abs_position(&mut self, id: NodeId) -> Result<Vec3> {
        let origin = self.node(id)?.origin();
        Ok(self.parent_xform(id)?.transform_point3(origin))
    }

    /// 世界坐标 -> 父空间坐标（无父节点时原样返回）
    pub fn map_to_parent_coord(&mut self, id: NodeId, abs_point: Vec3) -> Result<Vec3> {
        match self.parent_inverse(id)? {
            Some(to_parent) => Ok(to_parent.transform_point3(abs_point)),
            None => Err(XformError::SingularParent(id)),
        }
    }

    /// 父空间中从本节点原点指向 `abs_point` 的向量
    pub fn map_to_origin_in_parent_coord(&mut self, id: NodeId, abs_point: Vec3) -> Result<Vec3> {
        let origin = self.node(id)?.origin();
        Ok(self.map_to_parent_coord(id, abs_point)? - origin)
    }

    /// 世界方向 -> 父空间方向（只使用父节点的旋转，结果已归一化）
    pub fn map_dir_to_parent_coord(&mut self, id: NodeId, abs_dir: Vec3) -> Result<Vec3> {
        match self.parent_rotation(id)? {
            Some(rotation) => Ok((rotation.inverse() * abs_dir).normalize_or_zero()),
            None => Ok(Vec3::ZERO),
        }
    }

    pub fn get_abs_left_direction(&mut self, id: NodeId) -> Result<Vec3> {
        self.abs_axis(id, Vec3::X)
    }

    pub fn get_abs_up_direction(&mut self, id: NodeId) -> Result<Vec3> {
        self.abs_axis(id, Vec3::Y)
    }

    pub fn get_abs_heading(&mut self, id: NodeId) -> Result<Vec3> {
        self.abs_axis(id, Vec3::Z)
    }

    /// 父节点世界矩阵（根节点为单位矩阵）
    pub(crate) fn parent_xform(&mut self, id: NodeId) -> Result<Mat4> {
        let parent = self.node(id)?.parent();
        match parent {
            Some(parent) => self.get_xform(parent),
            None => Ok(Mat4::IDENTITY),
        }
    }

    /// 父节点世界矩阵的逆，奇异时为 None
    pub(crate) fn parent_inverse(&mut self, id: NodeId) -> Result<Option<Mat4>> {
        let parent_world = self.parent_xform(id)?;
        if is_singular(&parent_world) {
            return Ok(None);
        }
        Ok(Some(parent_world.inverse()))
    }

    /// 父节点世界旋转，奇异时为 None
    pub(crate) fn parent_rotation(&mut self, id: NodeId) -> Result<Option<Quat>> {
        let parent_world = self.parent_xform(id)?;
        if is_singular(&parent_world) {
            return Ok(None);
        }
        let (_, rotation, _) = parent_world.to_scale_rotation_translation();
        Ok(Some(rotation))
    }

    fn abs_axis(&mut self, id: NodeId, axis: Vec3) -> Result<Vec3> {
        Ok(self.get_xform(id)?.transform_vector3(axis).normalize_or_zero())
    }
}

#[cfg(test)]
mod tests {
    use crate::xform::{XformNode, XformTree};
    use crate::XformError;
    use glam::Vec3;

    #[test]
    fn test_parent_coord_round_trip() {
        let mut tree = XformTree::new();
        let parent = tree.insert(
            XformNode::mesh("p")
                .with_origin(Vec3::new(1.0, 2.0, 3.0))
                .with_orient(Vec3::new(0.0, 90.0, 0.0)),
        );
        let child = tree.insert(XformNode::mesh("c").with_origin(Vec3::new(0.0, 0.0, 1.0)));
        tree.link_parent(child, Some(parent), false).unwrap();

        let abs = tree.abs_position(child).unwrap();
        assert!(abs.abs_diff_eq(Vec3::new(2.0, 2.0, 3.0), 1e-5));

        let back = tree.map_to_parent_coord(child, abs).unwrap();
        assert!(back.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-5));
        assert!(tree.map_to_origin_in_parent_coord(child, abs).unwrap().abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn test_root_parent_coord_is_identity() {
        let mut tree = XformTree::new();
        let id = tree.insert(XformNode::mesh("r").with_origin(Vec3::X));
        let p = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(tree.map_to_parent_coord(id, p).unwrap(), p);
        assert_eq!(tree.map_to_origin_in_parent_coord(id, p).unwrap(), Vec3::new(3.0, 5.0, 6.0));
    }

    #[test]
    fn test_directions_normalized_under_scale() {
        let mut tree = XformTree::new();
        let id = tree.insert(
            XformNode::mesh("d")
                .with_orient(Vec3::new(0.0, 90.0, 0.0))
                .with_scale(Vec3::new(3.0, 0.5, 7.0)),
        );

        assert!(tree.get_abs_heading(id).unwrap().abs_diff_eq(Vec3::X, 1e-5));
        assert!(tree.get_abs_up_direction(id).unwrap().abs_diff_eq(Vec3::Y, 1e-5));
        assert!(tree.get_abs_left_direction(id).unwrap().abs_diff_eq(-Vec3::Z, 1e-5));
    }

    #[test]
    fn test_dir_to_parent_coord() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::camera("p").with_orient(Vec3::new(0.0, 90.0, 0.0)));
        let child = tree.insert(XformNode::mesh("c"));
        tree.link_parent(child, Some(parent), false).unwrap();

        let dir = tree.map_dir_to_parent_coord(child, Vec3::X).unwrap();
        assert!(dir.abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn test_abs_position_is_pivoted_mesh_origin() {
        let mut tree = XformTree::new();
        let id = tree.insert(XformNode::mesh("box").with_origin(Vec3::new(8.0, 0.0, 0.0)));
        tree.flatten(id).unwrap();
        tree.center_axis(id, Vec3::new(8.0, 0.0, 0.0)).unwrap();

        assert_eq!(tree.node(id).unwrap().origin(), Vec3::new(8.0, 0.0, 0.0));
        assert!(tree.abs_position(id).unwrap().abs_diff_eq(Vec3::new(8.0, 0.0, 0.0), 1e-5));
        // 模型空间零点仍映射到世界原点
        assert!(tree.map_to_abs_coord(id, Vec3::ZERO).unwrap().abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn test_abs_position_through_rotated_parent() {
        let mut tree = XformTree::new();
        let parent = tree.insert(
            XformNode::mesh("p")
                .with_origin(Vec3::new(0.0, 1.0, 0.0))
                .with_orient(Vec3::new(0.0, 90.0, 0.0)),
        );
        let child = tree.insert(XformNode::mesh("c").with_origin(Vec3::new(0.0, 0.0, 2.0)));
        tree.link_parent(child, Some(parent), false).unwrap();
        tree.set_axis(child, Vec3::new(0.0, 0.0, 5.0)).unwrap();

        assert!(tree.abs_position(child).unwrap().abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn test_singular_parent_coord() {
        let mut tree = XformTree::new();
        let parent = tree.insert(XformNode::mesh("flat").with_scale(Vec3::new(0.0, 1.0, 1.0)));
        let child = tree.insert(XformNode::mesh("c"));
        tree.link_parent(child, Some(parent), false).unwrap();

        assert_eq!(
            tree.map_to_parent_coord(child, Vec3::ONE),
            Err(XformError::SingularParent(child))
        );
        assert_eq!(tree.map_dir_to_parent_coord(child, Vec3::X).unwrap(), Vec3::ZERO);
        assert!(tree.abs_position(child).unwrap().is_finite());
    }
}
