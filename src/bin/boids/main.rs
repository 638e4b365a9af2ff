//! 无窗口 boids 演示
//!
//! 50 个盒子在 ±10 立方体内散布，循环追逐单位立方体的 8 个角；
//! 另有一条三节手臂用 CCD IK 追踪同一目标。
//!
//! 运行：RUST_LOG=debug cargo run --features demo --bin boids

use glam::Vec3;

use xform_engine::kinematics::{get_config, set_config};
use xform_engine::{BoidParams, Flock, IkConfig, IkSolver, NodeId, XformNode, XformTree};

const BOID_COUNT: usize = 50;
const TICKS_PER_TARGET: usize = 400;
const TOTAL_TICKS: usize = 3200;

const TARGETS: [Vec3; 8] = [
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
];

/// R3 低差异序列，得到确定性的散布位置
fn scatter(index: usize, min: Vec3, max: Vec3) -> Vec3 {
    const ALPHA: Vec3 = Vec3::new(0.819_172_5, 0.671_043_5, 0.549_700_5);
    let t = (ALPHA * (index as f32 + 1.0) + 0.5).fract();
    min + t * (max - min)
}

fn create_boids(tree: &mut XformTree, flock: &mut Flock, count: usize, box_dim: Vec3) -> xform_engine::Result<()> {
    for i in 0..count {
        let position = scatter(i, Vec3::splat(-10.0), Vec3::splat(10.0));
        let id = tree.insert(XformNode::mesh(format!("boid_box_{}", i)));
        tree.set_origin(id, position)?;
        tree.set_scale(id, box_dim)?;
        // 烘焙缩放与位置，再把轴心放回盒子中心
        tree.flatten(id)?;
        tree.center_axis(id, position)?;
        flock.add(id);
    }
    Ok(())
}

fn create_arm(tree: &mut XformTree) -> xform_engine::Result<(NodeId, NodeId)> {
    let base = tree.insert(XformNode::mesh("arm_base").with_origin(Vec3::new(0.0, -3.0, 0.0)));
    let mut parent = base;
    for i in 0..3 {
        let segment = tree.insert(XformNode::mesh(format!("arm_segment_{}", i)).with_origin(Vec3::Y * 1.5));
        tree.link_parent(segment, Some(parent), false)?;
        parent = segment;
    }
    Ok((base, parent))
}

fn main() -> xform_engine::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = get_config();
    config.debug_log = log::log_enabled!(log::Level::Debug);
    set_config(config);

    let mut tree = XformTree::new();
    let mut flock = Flock::new(BoidParams::default());
    create_boids(&mut tree, &mut flock, BOID_COUNT, Vec3::new(0.0625, 0.0625, 0.25))?;

    let (arm_base, arm_tip) = create_arm(&mut tree)?;
    let arm = IkSolver::new(arm_tip, arm_base, Vec3::Y * 1.5, IkConfig::default());

    log::info!("[Demo] 创建 {} 个 boid，节点总数 {}", flock.len(), tree.len());

    for tick in 0..TOTAL_TICKS {
        let target = TARGETS[(tick / TICKS_PER_TARGET) % TARGETS.len()];
        let avoiding = flock.step(&mut tree, target)?;

        if tick % TICKS_PER_TARGET == 0 {
            let reached = arm.solve(&mut tree, target)?;
            log::info!(
                "[Demo] tick {}: 目标 {:?}, 回避中 {}/{}, 手臂到达={}",
                tick, target, avoiding, flock.len(), reached
            );
        }
    }

    let mut mean_distance = 0.0;
    let last_target = TARGETS[((TOTAL_TICKS - 1) / TICKS_PER_TARGET) % TARGETS.len()];
    for &id in flock.members() {
        mean_distance += tree.abs_position(id)?.distance(last_target);
    }
    mean_distance /= flock.len().max(1) as f32;
    log::info!("[Demo] 结束：boid 到最后目标的平均距离 {:.3}", mean_distance);

    Ok(())
}
