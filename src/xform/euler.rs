//! 欧拉角与旋转矩阵互转
//!
//! 对外接口一律使用角度制；组合顺序 R = Ry(yaw) * Rx(pitch) * Rz(roll)。

use glam::{Mat3, Vec3};

/// 欧拉角（度）-> 旋转矩阵
pub fn rotation_from_orient(orient: Vec3) -> Mat3 {
    Mat3::from_rotation_y(orient.y.to_radians())
        * Mat3::from_rotation_x(orient.x.to_radians())
        * Mat3::from_rotation_z(orient.z.to_radians())
}

/// 旋转矩阵 -> 欧拉角（度）
///
/// 矩阵必须是纯旋转。万向节锁时 roll 固定为 0，全部旋转归入 yaw。
pub fn orient_from_rotation(m: Mat3) -> Vec3 {
    // glam 列主序：m.col(c)[r] 即 m[r][c]
    let m02 = m.col(2).x;
    let m12 = m.col(2).y;
    let m22 = m.col(2).z;

    let pitch = (-m12).clamp(-1.0, 1.0).asin();
    let cos_pitch = (m02 * m02 + m22 * m22).sqrt();

    let (yaw, roll) = if cos_pitch > 1.0e-6 {
        (m02.atan2(m22), m.col(0).y.atan2(m.col(1).y))
    } else {
        // Gimbal lock
        ((-m.col(0).z).atan2(m.col(0).x), 0.0)
    };

    Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// 角度归一化到 [-180, 180)
#[inline]
pub fn wrap_degrees(angle: f32) -> f32 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}
