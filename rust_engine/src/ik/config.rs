//! 两关节 IK 链配置

use glam::{Quat, Vec3};

use crate::skeleton::Skeleton;
use crate::{IkError, Result};

/// 单条两关节链的求解参数
///
/// 骨骼索引 -1 表示未设置。铰链角度以余弦存储，
/// 角度指中间关节处两段骨骼的夹角（180° 为完全伸直）。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IkChainConfig {
    pub first_joint_idx: i32,
    pub first_joint_twist_idx: i32,
    pub second_joint_idx: i32,
    pub second_joint_twist_idx: i32,
    pub end_bone_idx: i32,

    /// 铰链轴（第一关节局部空间）
    pub hinge_axis_ls: Vec3,
    pub cos_min_hinge_angle: f32,
    pub cos_max_hinge_angle: f32,

    // 增益（0.0 - 1.0）
    pub first_joint_gain: f32,
    pub second_joint_gain: f32,
    pub end_joint_gain: f32,

    /// 末端目标（模型空间）
    pub end_target_ms: Vec3,
    pub end_target_rotation_ms: Quat,

    /// 末端效应器相对末端骨骼的偏移（局部空间）
    pub end_bone_offset_ls: Vec3,
    pub end_bone_rotation_offset_ls: Quat,

    pub enforce_end_position: bool,
    pub enforce_end_rotation: bool,
}

impl Default for IkChainConfig {
    fn default() -> Self {
        Self {
            first_joint_idx: -1,
            first_joint_twist_idx: -1,
            second_joint_idx: -1,
            second_joint_twist_idx: -1,
            end_bone_idx: -1,
            hinge_axis_ls: Vec3::Z,
            cos_min_hinge_angle: -1.0,
            cos_max_hinge_angle: 1.0,
            first_joint_gain: 1.0,
            second_joint_gain: 1.0,
            end_joint_gain: 1.0,
            end_target_ms: Vec3::ZERO,
            end_target_rotation_ms: Quat::IDENTITY,
            end_bone_offset_ls: Vec3::ZERO,
            end_bone_rotation_offset_ls: Quat::IDENTITY,
            enforce_end_position: true,
            enforce_end_rotation: false,
        }
    }
}

impl IkChainConfig {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 以角度（度）设置铰链范围，`min_deg <= max_deg`，均在 [0, 180] 内
    pub fn set_hinge_limits_degrees(&mut self, min_deg: f32, max_deg: f32) {
        let (cos_min, cos_max) = hinge_cosines(min_deg, max_deg);
        self.cos_min_hinge_angle = cos_min;
        self.cos_max_hinge_angle = cos_max;
    }
}

/// 余弦在 [0°, 180°] 上递减：上限角度对应余弦下限
fn hinge_cosines(min_deg: f32, max_deg: f32) -> (f32, f32) {
    let lo = min_deg.clamp(0.0, 180.0);
    let hi = max_deg.clamp(0.0, 180.0);
    (hi.to_radians().cos(), lo.to_radians().cos())
}

/// 目标模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IkMode {
    /// 目标固定为调用方给定的姿势
    #[default]
    Absolute,
    /// 每次求解时以当前输出姿势为目标基准
    Relative,
}

/// 调用方持有的肢体 IK 描述（每条肢体一个，跨帧复用）
#[derive(Clone, Debug)]
pub struct ChainGroup {
    pub name: String,
    pub first_joint: i32,
    pub first_joint_twist: i32,
    pub second_joint: i32,
    pub second_joint_twist: i32,
    pub end_bone: i32,

    pub first_joint_gain: f32,
    pub second_joint_gain: f32,
    pub end_joint_gain: f32,

    pub hinge_axis: Vec3,
    pub cos_min_hinge_angle: f32,
    pub cos_max_hinge_angle: f32,

    pub end_bone_offset: Vec3,
    pub end_bone_rotation_offset: Quat,

    pub enforce_end_position: bool,
    pub enforce_end_rotation: bool,

    pub mode: IkMode,
    pub enabled: bool,

    /// 目标姿势；相对模式或未强制的分量会在每次求解时被覆盖
    pub target_position: Vec3,
    pub target_rotation: Quat,
}

impl Default for ChainGroup {
    fn default() -> Self {
        let chain = IkChainConfig::default();
        Self {
            name: String::new(),
            first_joint: chain.first_joint_idx,
            first_joint_twist: chain.first_joint_twist_idx,
            second_joint: chain.second_joint_idx,
            second_joint_twist: chain.second_joint_twist_idx,
            end_bone: chain.end_bone_idx,
            first_joint_gain: chain.first_joint_gain,
            second_joint_gain: chain.second_joint_gain,
            end_joint_gain: chain.end_joint_gain,
            hinge_axis: chain.hinge_axis_ls,
            cos_min_hinge_angle: chain.cos_min_hinge_angle,
            cos_max_hinge_angle: chain.cos_max_hinge_angle,
            end_bone_offset: chain.end_bone_offset_ls,
            end_bone_rotation_offset: chain.end_bone_rotation_offset_ls,
            enforce_end_position: chain.enforce_end_position,
            enforce_end_rotation: chain.enforce_end_rotation,
            mode: IkMode::Absolute,
            enabled: true,
            target_position: Vec3::ZERO,
            target_rotation: Quat::IDENTITY,
        }
    }
}

impl ChainGroup {
    pub fn new(
        name: impl Into<String>,
        first_joint: i32,
        second_joint: i32,
        end_bone: i32,
    ) -> Self {
        Self {
            name: name.into(),
            first_joint,
            second_joint,
            end_bone,
            ..Self::default()
        }
    }

    /// 通过骨骼名称构建（例如 "左腕" / "左ひじ" / "左手首"）
    pub fn from_bone_names(
        skeleton: &Skeleton,
        name: impl Into<String>,
        first_joint: &str,
        second_joint: &str,
        end_bone: &str,
    ) -> Result<Self> {
        let lookup = |bone: &str| {
            skeleton
                .find_bone_by_name(bone)
                .map(|i| i as i32)
                .ok_or_else(|| IkError::UnknownBone(bone.to_string()))
        };
        Ok(Self::new(
            name,
            lookup(first_joint)?,
            lookup(second_joint)?,
            lookup(end_bone)?,
        ))
    }

    pub fn set_hinge_limits_degrees(&mut self, min_deg: f32, max_deg: f32) {
        let (cos_min, cos_max) = hinge_cosines(min_deg, max_deg);
        self.cos_min_hinge_angle = cos_min;
        self.cos_max_hinge_angle = cos_max;
    }

    /// 把骨骼、增益、铰链和强制标志写入链配置（目标另行写入）
    pub fn apply_to(&self, chain: &mut IkChainConfig) {
        chain.first_joint_idx = self.first_joint;
        chain.first_joint_twist_idx = self.first_joint_twist;
        chain.second_joint_idx = self.second_joint;
        chain.second_joint_twist_idx = self.second_joint_twist;
        chain.end_bone_idx = self.end_bone;

        chain.first_joint_gain = self.first_joint_gain;
        chain.second_joint_gain = self.second_joint_gain;
        chain.end_joint_gain = self.end_joint_gain;

        chain.hinge_axis_ls = self.hinge_axis;
        chain.cos_min_hinge_angle = self.cos_min_hinge_angle;
        chain.cos_max_hinge_angle = self.cos_max_hinge_angle;

        chain.end_bone_offset_ls = self.end_bone_offset;
        chain.end_bone_rotation_offset_ls = self.end_bone_rotation_offset;

        chain.enforce_end_position = self.enforce_end_position;
        chain.enforce_end_rotation = self.enforce_end_rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain() {
        let chain = IkChainConfig::default();
        assert_eq!(chain.first_joint_idx, -1);
        assert_eq!(chain.end_bone_idx, -1);
        assert_eq!(chain.first_joint_gain, 1.0);
        assert_eq!(chain.cos_min_hinge_angle, -1.0);
        assert_eq!(chain.cos_max_hinge_angle, 1.0);
        assert!(chain.enforce_end_position);
        assert!(!chain.enforce_end_rotation);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut chain = IkChainConfig {
            first_joint_idx: 3,
            second_joint_gain: 0.2,
            enforce_end_rotation: true,
            ..IkChainConfig::default()
        };
        chain.reset();
        assert_eq!(chain, IkChainConfig::default());
    }

    #[test]
    fn test_hinge_limits_degrees() {
        let mut chain = IkChainConfig::default();
        chain.set_hinge_limits_degrees(30.0, 180.0);
        assert!((chain.cos_min_hinge_angle + 1.0).abs() < 1e-6);
        assert!((chain.cos_max_hinge_angle - 30f32.to_radians().cos()).abs() < 1e-6);

        chain.set_hinge_limits_degrees(0.0, 180.0);
        assert!((chain.cos_min_hinge_angle + 1.0).abs() < 1e-6);
        assert!((chain.cos_max_hinge_angle - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_apply_group() {
        let mut group = ChainGroup::new("left_arm", 1, 2, 3);
        group.first_joint_twist = 4;
        group.second_joint_gain = 0.5;
        group.enforce_end_rotation = true;
        group.hinge_axis = Vec3::X;

        let mut chain = IkChainConfig::default();
        group.apply_to(&mut chain);
        assert_eq!(chain.first_joint_idx, 1);
        assert_eq!(chain.first_joint_twist_idx, 4);
        assert_eq!(chain.second_joint_idx, 2);
        assert_eq!(chain.second_joint_twist_idx, -1);
        assert_eq!(chain.end_bone_idx, 3);
        assert_eq!(chain.second_joint_gain, 0.5);
        assert_eq!(chain.hinge_axis_ls, Vec3::X);
        assert!(chain.enforce_end_rotation);
    }

    #[test]
    fn test_from_bone_names() {
        let skeleton = Skeleton::from_model_positions([
            ("root", -1, Vec3::ZERO),
            ("shoulder", 0, Vec3::Y),
            ("elbow", 1, Vec3::new(1.0, 1.0, 0.0)),
            ("wrist", 2, Vec3::new(2.0, 1.0, 0.0)),
        ])
        .unwrap();

        let group =
            ChainGroup::from_bone_names(&skeleton, "arm", "shoulder", "elbow", "wrist").unwrap();
        assert_eq!((group.first_joint, group.second_joint, group.end_bone), (1, 2, 3));
        assert!(group.enabled);
        assert_eq!(group.mode, IkMode::Absolute);

        let err = ChainGroup::from_bone_names(&skeleton, "arm", "shoulder", "knee", "wrist")
            .unwrap_err();
        assert!(matches!(err, IkError::UnknownBone(ref name) if name == "knee"));
    }
}
