//! 两关节数值求解后端
//!
//! `TwoJointsSolver` 只通过 `TwoJointsBackend` 调用求解器：
//! 后端读取链配置，修改工作姿势中三个关节的局部变换，返回是否成功。

use glam::{Quat, Vec3};

use super::config::IkChainConfig;
use super::settings::{get_settings, SolverSettings};
use super::sync::is_descendant;
use crate::skeleton::{BoneTransform, Pose, Propagation};

/// 外部两关节求解器
pub trait TwoJointsBackend {
    /// 失败表示链无效（未设置的骨骼索引等）或几何退化
    fn solve(&self, chain: &IkChainConfig, pose: &mut Pose) -> bool;
}

impl<F> TwoJointsBackend for F
where
    F: Fn(&IkChainConfig, &mut Pose) -> bool,
{
    fn solve(&self, chain: &IkChainConfig, pose: &mut Pose) -> bool {
        self(chain, pose)
    }
}

/// 链上三个骨骼的有效索引
#[derive(Clone, Copy, Debug)]
struct ChainJoints {
    first: usize,
    second: usize,
    end: usize,
}

impl ChainJoints {
    fn resolve(chain: &IkChainConfig, pose: &Pose) -> Option<Self> {
        let count = pose.bone_count();
        let index = |i: i32| usize::try_from(i).ok().filter(|&i| i < count);
        let joints = Self {
            first: index(chain.first_joint_idx)?,
            second: index(chain.second_joint_idx)?,
            end: index(chain.end_bone_idx)?,
        };

        // 必须是 first -> second -> end 的祖先链
        let parents = pose.skeleton().parent_indices();
        let ordered = joints.first != joints.second
            && joints.second != joints.end
            && is_descendant(parents, chain.first_joint_idx, chain.second_joint_idx)
            && is_descendant(parents, chain.second_joint_idx, chain.end_bone_idx);
        ordered.then_some(joints)
    }
}

/// 解析两关节求解（余弦定理）
///
/// 1. 绕铰链轴弯曲第二关节，使第一关节到效应器的距离等于到目标的距离
/// 2. 旋转第一关节，使效应器指向目标
/// 3. 需要时把末端骨骼旋转到目标朝向
///
/// 每一步都按对应关节的增益从单位旋转插值。链完全伸直或折叠时，
/// 铰链轴（第一关节局部空间）决定弯曲方向。
#[derive(Clone, Debug)]
pub struct AnalyticTwoJoints {
    settings: SolverSettings,
}

impl AnalyticTwoJoints {
    /// 使用当前全局配置
    pub fn new() -> Self {
        Self::with_settings(get_settings())
    }

    pub fn with_settings(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    fn solve_position(&self, chain: &IkChainConfig, joints: ChainJoints, pose: &mut Pose) -> bool {
        let (Some(first), Some(second)) = (
            pose.model_transform(joints.first),
            pose.model_transform(joints.second),
        ) else {
            return false;
        };
        let Some(effector) = effector_position(chain, pose, joints.end) else {
            return false;
        };

        let target = chain.end_target_ms;
        let to_first = first.translation - second.translation;
        let lower = effector - second.translation;
        let l1 = to_first.length();
        let l2 = lower.length();
        if l1 < self.settings.min_bone_length || l2 < self.settings.min_bone_length {
            log::debug!("两关节链骨骼长度退化: {} / {}", l1, l2);
            return false;
        }

        let reach_min = (l1 - l2).abs();
        let reach_max = ((l1 + l2) * self.settings.max_reach_ratio).max(reach_min);
        let dist = (target - first.translation).length().clamp(reach_min, reach_max);

        // 中间关节夹角，180° 为伸直
        let cos_target = ((l1 * l1 + l2 * l2 - dist * dist) / (2.0 * l1 * l2))
            .clamp(-1.0, 1.0)
            .max(chain.cos_min_hinge_angle)
            .min(chain.cos_max_hinge_angle);
        let cos_current = (to_first / l1).dot(lower / l2).clamp(-1.0, 1.0);
        let delta = (cos_target.acos() - cos_current.acos()) * chain.second_joint_gain;

        if delta.abs() > f32::EPSILON {
            let hinge_ms = first.rotation * chain.hinge_axis_ls;
            let axis = bend_axis(to_first, lower, hinge_ms);
            if !rotate_joint(pose, joints.second, Quat::from_axis_angle(axis, delta)) {
                return false;
            }
        }

        // 第一关节对准目标
        let Some(effector) = effector_position(chain, pose, joints.end) else {
            return false;
        };
        let from = effector - first.translation;
        let to = target - first.translation;
        let min_length = self.settings.min_bone_length;
        if from.length() < min_length || to.length() < min_length {
            return true;
        }
        let aim = Quat::from_rotation_arc(from.normalize(), to.normalize());
        let aim = Quat::IDENTITY.slerp(aim, chain.first_joint_gain);
        rotate_joint(pose, joints.first, aim)
    }

    fn solve_rotation(&self, chain: &IkChainConfig, joints: ChainJoints, pose: &mut Pose) -> bool {
        let Some(end) = pose.model_transform(joints.end) else {
            return false;
        };
        let desired = chain.end_target_rotation_ms * chain.end_bone_rotation_offset_ls.inverse();
        let rotation = end.rotation.slerp(desired, chain.end_joint_gain).normalize();
        pose.set_model_transform(
            joints.end,
            BoneTransform { rotation, ..end },
            Propagation::Propagate,
        )
        .is_ok()
    }
}

impl Default for AnalyticTwoJoints {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoJointsBackend for AnalyticTwoJoints {
    fn solve(&self, chain: &IkChainConfig, pose: &mut Pose) -> bool {
        let joints = match ChainJoints::resolve(chain, pose) {
            Some(joints) => joints,
            None => return false,
        };

        pose.sync_model_space();

        if chain.enforce_end_position && !self.solve_position(chain, joints, pose) {
            return false;
        }
        if chain.enforce_end_rotation && !self.solve_rotation(chain, joints, pose) {
            return false;
        }
        true
    }
}

/// 末端效应器位置 = 末端骨骼 ∘ 局部偏移
fn effector_position(chain: &IkChainConfig, pose: &Pose, end: usize) -> Option<Vec3> {
    let end = pose.model_transform(end)?;
    Some(end.translation + end.rotation * chain.end_bone_offset_ls)
}

/// 弯曲轴：两段骨骼所在平面的法线；共线时用铰链轴在垂直平面上的投影
fn bend_axis(to_first: Vec3, lower: Vec3, hinge_ms: Vec3) -> Vec3 {
    let normal = to_first.cross(lower);
    if normal.length_squared() > 1e-8 {
        return normal.normalize();
    }

    let dir = lower.normalize_or_zero();
    let projected = hinge_ms - dir * hinge_ms.dot(dir);
    if projected.length_squared() > 1e-8 {
        projected.normalize()
    } else {
        dir.any_orthonormal_vector()
    }
}

/// 绕关节自身位置旋转（模型空间），子骨骼跟随
fn rotate_joint(pose: &mut Pose, index: usize, delta: Quat) -> bool {
    let Some(model) = pose.model_transform(index) else {
        return false;
    };
    let rotated = BoneTransform {
        rotation: (delta * model.rotation).normalize(),
        ..model
    };
    pose.set_model_transform(index, rotated, Propagation::Propagate)
        .is_ok()
}
