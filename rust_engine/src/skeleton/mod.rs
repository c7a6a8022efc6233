//! 骨骼与姿势
//!
//! 扁平数组 + 父索引表的骨骼层级，以及绑定到骨骼上的姿势（局部/模型空间）。

mod bone;
mod pose;

pub use bone::{Bone, Skeleton};
pub use pose::{Pose, Propagation};

use glam::{Quat, Vec3};

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// 父骨骼模型变换 ∘ 子骨骼局部变换
    ///
    /// 平移不受父骨骼缩放影响：`p.t + p.r * l.t`。
    pub fn compose(parent: &BoneTransform, local: &BoneTransform) -> BoneTransform {
        BoneTransform {
            translation: parent.translation + parent.rotation * local.translation,
            rotation: (parent.rotation * local.rotation).normalize(),
            scale: parent.scale * local.scale,
        }
    }

    /// `compose` 的逆：求本变换相对于 `parent` 的局部变换
    pub fn relative_to(&self, parent: &BoneTransform) -> BoneTransform {
        let inv_rot = parent.rotation.inverse();
        // 父缩放为 0 的分量，局部缩放记为 0
        let nonzero = parent.scale.cmpne(Vec3::ZERO);
        let safe_parent_scale = Vec3::select(nonzero, parent.scale, Vec3::ONE);
        let scale = Vec3::select(nonzero, self.scale / safe_parent_scale, Vec3::ZERO);

        BoneTransform {
            translation: inv_rot * (self.translation - parent.translation),
            rotation: (inv_rot * self.rotation).normalize(),
            scale,
        }
    }

    pub fn abs_diff_eq(&self, other: &BoneTransform, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
            // q 与 -q 表示同一旋转
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_relative_roundtrip() {
        let parent = BoneTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.7),
            scale: Vec3::new(2.0, 1.0, 0.5),
        };
        let local = BoneTransform {
            translation: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::from_rotation_x(0.3),
            scale: Vec3::splat(1.5),
        };

        let model = BoneTransform::compose(&parent, &local);
        assert!(model.relative_to(&parent).abs_diff_eq(&local, 1e-5));
    }

    #[test]
    fn test_compose_ignores_parent_scale_for_translation() {
        let parent = BoneTransform {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(3.0),
        };
        let local = BoneTransform::from_translation(Vec3::X);

        let model = BoneTransform::compose(&parent, &local);
        assert!(model.translation.abs_diff_eq(Vec3::X, 1e-6));
        assert!(model.scale.abs_diff_eq(Vec3::splat(3.0), 1e-6));
    }

    #[test]
    fn test_relative_to_zero_scale_parent() {
        let parent = BoneTransform {
            scale: Vec3::new(0.0, 1.0, 1.0),
            ..BoneTransform::IDENTITY
        };
        let local = BoneTransform::IDENTITY.relative_to(&parent);
        assert_eq!(local.scale, Vec3::new(0.0, 1.0, 1.0));
    }
}
