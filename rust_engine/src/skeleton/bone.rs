//! 骨骼节点与骨骼层级

use glam::Vec3;
use std::collections::HashMap;

use super::BoneTransform;
use crate::{IkError, Result};

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    /// 父骨骼索引，-1 或自身索引表示根骨骼
    pub parent_index: i32,
    /// 参考姿势下相对于父骨骼的局部变换
    pub reference: BoneTransform,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent_index: i32, reference: BoneTransform) -> Self {
        Self {
            name: name.into(),
            parent_index,
            reference,
        }
    }

    pub fn is_root_at(&self, index: usize) -> bool {
        self.parent_index < 0 || self.parent_index as usize == index
    }
}

/// 骨骼层级
///
/// 父索引表在构建时校验：每个父索引都必须小于子骨骼索引（根骨骼除外），
/// 按索引升序遍历即可保证父骨骼先于子骨骼处理。
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    parent_indices: Vec<i32>,
    children: Vec<Vec<usize>>,
    name_to_index: HashMap<String, usize>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Result<Self> {
        let bone_count = bones.len();
        let mut parent_indices = Vec::with_capacity(bone_count);
        let mut children = vec![Vec::new(); bone_count];
        let mut name_to_index = HashMap::with_capacity(bone_count);

        for (i, bone) in bones.iter().enumerate() {
            let parent = bone.parent_index;
            if !bone.is_root_at(i) {
                if parent as usize >= bone_count {
                    return Err(IkError::InvalidParent { bone: i, parent });
                }
                if parent as usize > i {
                    log::warn!("骨骼 {} ({}) 的父骨骼 {} 排在其后", i, bone.name, parent);
                    return Err(IkError::UnsortedHierarchy { bone: i, parent });
                }
                children[parent as usize].push(i);
            }
            parent_indices.push(parent);
            // 同名骨骼保留第一个
            name_to_index.entry(bone.name.clone()).or_insert(i);
        }

        Ok(Self {
            bones,
            parent_indices,
            children,
            name_to_index,
        })
    }

    /// 由模型空间初始位置构建，局部偏移 = 自身位置 - 父骨骼位置
    pub fn from_model_positions<I, S>(bones: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, i32, Vec3)>,
        S: Into<String>,
    {
        let raw: Vec<(String, i32, Vec3)> = bones
            .into_iter()
            .map(|(name, parent, pos)| (name.into(), parent, pos))
            .collect();

        let bones = raw
            .iter()
            .enumerate()
            .map(|(i, (name, parent, pos))| {
                let offset = match usize::try_from(*parent) {
                    Ok(p) if p != i && p < raw.len() => *pos - raw[p].2,
                    _ => *pos,
                };
                Bone::new(name.clone(), *parent, BoneTransform::from_translation(offset))
            })
            .collect();

        Self::new(bones)
    }

    /// 获取骨骼数量
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// 骨骼索引 -> 父骨骼索引
    pub fn parent_indices(&self) -> &[i32] {
        &self.parent_indices
    }

    /// 父骨骼索引，根骨骼返回 None
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        let bone = self.bones.get(index)?;
        if bone.is_root_at(index) {
            None
        } else {
            Some(bone.parent_index as usize)
        }
    }

    pub fn children_of(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }
}
