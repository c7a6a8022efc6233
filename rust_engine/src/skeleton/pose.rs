//! 姿势：绑定到单个骨骼层级的局部/模型空间变换

use std::sync::Arc;

use super::{BoneTransform, Skeleton};
use crate::{IkError, Result};

/// 写入模型空间变换时，子骨骼的处理方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// 子骨骼保持局部变换，跟随父骨骼移动
    Propagate,
    /// 子骨骼保持模型空间变换，重新推算其局部变换
    DoNotPropagate,
}

/// 骨骼姿势
///
/// 同时保存局部与模型空间变换。`set_local_transform` 只改局部变换，
/// 之后需要 `sync_model_space` 才能反映到模型空间。
#[derive(Clone, Debug)]
pub struct Pose {
    skeleton: Arc<Skeleton>,
    local: Vec<BoneTransform>,
    model: Vec<BoneTransform>,
}

impl Pose {
    /// 创建姿势，初始为参考姿势
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let bone_count = skeleton.bone_count();
        let mut pose = Self {
            skeleton,
            local: vec![BoneTransform::IDENTITY; bone_count],
            model: vec![BoneTransform::IDENTITY; bone_count],
        };
        pose.set_to_reference_pose();
        pose
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn bone_count(&self) -> usize {
        self.model.len()
    }

    pub fn model_transform(&self, index: usize) -> Option<BoneTransform> {
        self.model.get(index).copied()
    }

    pub fn local_transform(&self, index: usize) -> Option<BoneTransform> {
        self.local.get(index).copied()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.model.len() {
            Ok(())
        } else {
            Err(IkError::BoneOutOfRange {
                index,
                count: self.model.len(),
            })
        }
    }

    fn parent_model(&self, index: usize) -> Option<BoneTransform> {
        self.skeleton.parent_of(index).map(|p| self.model[p])
    }

    /// 设置模型空间变换，并按 `propagation` 处理子骨骼
    pub fn set_model_transform(
        &mut self,
        index: usize,
        transform: BoneTransform,
        propagation: Propagation,
    ) -> Result<()> {
        self.check_index(index)?;

        self.model[index] = transform;
        self.local[index] = match self.parent_model(index) {
            Some(parent) => transform.relative_to(&parent),
            None => transform,
        };

        match propagation {
            Propagation::Propagate => self.update_children_model(index),
            Propagation::DoNotPropagate => {
                let skeleton = Arc::clone(&self.skeleton);
                for &child in skeleton.children_of(index) {
                    self.local[child] = self.model[child].relative_to(&transform);
                }
            }
        }
        Ok(())
    }

    /// 递归更新子骨骼的模型空间变换（不改变局部变换）
    fn update_children_model(&mut self, parent_index: usize) {
        let skeleton = Arc::clone(&self.skeleton);
        let parent_model = self.model[parent_index];
        for &child in skeleton.children_of(parent_index) {
            self.model[child] = BoneTransform::compose(&parent_model, &self.local[child]);
            self.update_children_model(child);
        }
    }

    /// 设置局部变换，模型空间不会自动刷新
    pub fn set_local_transform(&mut self, index: usize, transform: BoneTransform) -> Result<()> {
        self.check_index(index)?;
        self.local[index] = transform;
        Ok(())
    }

    /// 重置为骨骼的参考姿势
    pub fn set_to_reference_pose(&mut self) {
        for (local, bone) in self.local.iter_mut().zip(self.skeleton.bones()) {
            *local = bone.reference;
        }
        self.sync_model_space();
    }

    /// 由局部变换重新计算全部模型空间变换
    pub fn sync_model_space(&mut self) {
        for i in 0..self.local.len() {
            self.model[i] = match self.parent_model(i) {
                Some(parent) => BoneTransform::compose(&parent, &self.local[i]),
                None => self.local[i],
            };
        }
    }

    /// 整体复制另一个姿势
    pub fn copy_model_pose_from(&mut self, other: &Pose) -> Result<()> {
        if other.bone_count() != self.bone_count() {
            return Err(IkError::InvalidPose(format!(
                "骨骼数量不一致: {} != {}",
                other.bone_count(),
                self.bone_count()
            )));
        }
        self.model.copy_from_slice(&other.model);
        self.local.copy_from_slice(&other.local);
        Ok(())
    }
}

impl PartialEq for Pose {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.skeleton, &other.skeleton)
            && self.local == other.local
            && self.model == other.model
    }
}
