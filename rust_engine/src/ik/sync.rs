//! 工作姿势与输出姿势之间的同步
//!
//! 冻结求解时，只把链起点所在的子树送入求解器，求解后再合并回输出姿势。
//! 两个合并过程都按骨骼索引升序处理，依赖 `Skeleton` 构建时保证的
//! 父骨骼索引小于子骨骼索引。

use std::sync::Arc;

use crate::skeleton::{BoneTransform, Pose, Propagation};
use crate::{IkError, Result};

/// `candidate` 是否为 `ancestor` 的后代（包含自身）
///
/// 沿 `candidate` 的父链向上查找，遇到根骨骼（-1 或自身为父）即停止。
pub fn is_descendant(parents: &[i32], ancestor: i32, candidate: i32) -> bool {
    if ancestor < 0 || candidate < 0 {
        return false;
    }

    let mut current = candidate;
    // 最多走 len 步，防止父索引表成环
    for _ in 0..=parents.len() {
        if current == ancestor {
            return true;
        }
        let parent = match parents.get(current as usize) {
            Some(&p) => p,
            None => return false,
        };
        if parent < 0 || parent == current {
            return false;
        }
        current = parent;
    }
    false
}

fn model_at(pose: &Pose, index: usize) -> Result<BoneTransform> {
    pose.model_transform(index).ok_or(IkError::BoneOutOfRange {
        index,
        count: pose.bone_count(),
    })
}

/// 工作姿势与输出姿势必须绑定同一骨骼，或至少父索引表一致
pub(crate) fn check_same_layout(working: &Pose, output: &Pose) -> Result<()> {
    if working.bone_count() != output.bone_count() {
        return Err(IkError::InvalidPose(format!(
            "工作姿势 {} 个骨骼，输出姿势 {} 个骨骼",
            working.bone_count(),
            output.bone_count()
        )));
    }
    let same_skeleton = Arc::ptr_eq(working.skeleton(), output.skeleton())
        || working.skeleton().parent_indices() == output.skeleton().parent_indices();
    if !same_skeleton {
        return Err(IkError::InvalidPose("工作姿势与输出姿势的骨骼层级不一致".into()));
    }
    Ok(())
}

/// 把输出姿势中链起点子树的模型变换写入工作姿势（根骨骼除外）
///
/// 其余骨骼保持工作姿势原状（通常是刚重置的参考姿势）。
pub fn isolate_chain(working: &mut Pose, output: &Pose, chain_start: i32) -> Result<()> {
    check_same_layout(working, output)?;

    let skeleton = Arc::clone(output.skeleton());
    let parents = skeleton.parent_indices();
    for i in 1..output.bone_count() {
        if !is_descendant(parents, chain_start, i as i32) {
            continue;
        }
        working.set_model_transform(i, model_at(output, i)?, Propagation::Propagate)?;
    }
    Ok(())
}

/// 把冻结求解的结果合并回输出姿势
///
/// - 链起点子树之外的骨骼不动
/// - 起点到末端骨骼（含）：复制求解后的平移和旋转，缩放保留
/// - 末端骨骼之后的骨骼：用工作姿势的局部变换挂到输出姿势中已更新的父骨骼上
pub fn merge_solved_chain(
    working: &mut Pose,
    output: &mut Pose,
    chain_start: i32,
    chain_end: i32,
) -> Result<()> {
    check_same_layout(working, output)?;

    // 求解器只改局部变换
    working.sync_model_space();

    let skeleton = Arc::clone(output.skeleton());
    let parents = skeleton.parent_indices();
    for i in 1..output.bone_count() {
        let bone = i as i32;
        if !is_descendant(parents, chain_start, bone) {
            continue;
        }

        let beyond_end = bone != chain_end && is_descendant(parents, chain_end, bone);
        let merged = if beyond_end {
            let local = working.local_transform(i).ok_or(IkError::BoneOutOfRange {
                index: i,
                count: working.bone_count(),
            })?;
            let parent = match skeleton.parent_of(i) {
                Some(p) => model_at(output, p)?,
                None => BoneTransform::IDENTITY,
            };
            BoneTransform::compose(&parent, &local)
        } else {
            let solved = model_at(working, i)?;
            BoneTransform {
                translation: solved.translation,
                rotation: solved.rotation,
                scale: model_at(output, i)?.scale,
            }
        };

        output.set_model_transform(i, merged, Propagation::DoNotPropagate)?;
    }
    Ok(())
}

/// 非冻结求解：整体复制同步后的工作姿势
pub fn copy_synced_pose(working: &mut Pose, output: &mut Pose) -> Result<()> {
    check_same_layout(working, output)?;
    working.sync_model_space();
    output.copy_model_pose_from(working)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Skeleton;
    use glam::{Quat, Vec3};

    //        0
    //        |
    //        1 (shoulder)
    //       / \
    //      2   6
    //      |
    //      3 (wrist)
    //     / \
    //    4   5
    fn parents() -> Vec<i32> {
        vec![-1, 0, 1, 2, 3, 3, 1]
    }

    fn arm() -> Arc<Skeleton> {
        Arc::new(
            Skeleton::from_model_positions([
                ("root", -1, Vec3::ZERO),
                ("shoulder", 0, Vec3::new(0.0, 2.0, 0.0)),
                ("elbow", 1, Vec3::new(1.0, 2.0, 0.0)),
                ("wrist", 2, Vec3::new(2.0, 2.0, 0.0)),
                ("index", 3, Vec3::new(2.5, 2.0, 0.1)),
                ("thumb", 3, Vec3::new(2.2, 2.0, 0.3)),
                ("pad", 1, Vec3::new(0.0, 2.3, 0.0)),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_is_descendant() {
        let parents = parents();
        assert!(is_descendant(&parents, 1, 4));
        assert!(is_descendant(&parents, 3, 5));
        assert!(is_descendant(&parents, 0, 6));
        assert!(!is_descendant(&parents, 3, 6));
        assert!(!is_descendant(&parents, 4, 1));
        assert!(!is_descendant(&parents, 2, 6));
    }

    #[test]
    fn test_is_descendant_inclusive_and_invalid() {
        let parents = parents();
        assert!(is_descendant(&parents, 3, 3));
        assert!(is_descendant(&parents, 0, 0));
        assert!(!is_descendant(&parents, -1, 3));
        assert!(!is_descendant(&parents, 3, -1));
        assert!(!is_descendant(&parents, 3, 42));
    }

    #[test]
    fn test_is_descendant_self_parent_root() {
        let parents = vec![0, 0, 1];
        assert!(is_descendant(&parents, 0, 2));
        assert!(!is_descendant(&parents, 1, 0));
    }

    #[test]
    fn test_is_descendant_cycle_terminates() {
        let parents = vec![1, 0];
        assert!(!is_descendant(&parents, 5, 0));
    }

    #[test]
    fn test_isolate_chain_copies_subtree_only() {
        let skeleton = arm();
        let mut output = Pose::new(Arc::clone(&skeleton));
        output
            .set_model_transform(
                0,
                BoneTransform::from_translation(Vec3::new(10.0, 0.0, 0.0)),
                Propagation::Propagate,
            )
            .unwrap();

        let mut working = Pose::new(Arc::clone(&skeleton));
        isolate_chain(&mut working, &output, 2).unwrap();

        // 链起点子树来自输出姿势
        for i in [2, 3, 4, 5] {
            let expected = output.model_transform(i).unwrap();
            assert!(working.model_transform(i).unwrap().abs_diff_eq(&expected, 1e-5));
        }
        // 其他骨骼保持参考姿势
        let reference = Pose::new(skeleton);
        for i in [0, 1, 6] {
            assert_eq!(working.model_transform(i), reference.model_transform(i));
        }
    }

    #[test]
    fn test_merge_preserves_distal_locals() {
        let skeleton = arm();
        let mut output = Pose::new(Arc::clone(&skeleton));
        output
            .set_local_transform(
                4,
                BoneTransform::from_rotation_translation(
                    Quat::from_rotation_y(0.4),
                    Vec3::new(0.5, 0.0, 0.1),
                ),
            )
            .unwrap();
        output.sync_model_space();
        let before = output.clone();

        let mut working = Pose::new(Arc::clone(&skeleton));
        isolate_chain(&mut working, &output, 1).unwrap();

        // 模拟求解器：只改三个关节的局部变换
        let bend = Quat::from_rotation_z(0.8);
        for joint in [1, 2, 3] {
            let local = working.local_transform(joint).unwrap();
            working
                .set_local_transform(
                    joint,
                    BoneTransform {
                        rotation: bend * local.rotation,
                        ..local
                    },
                )
                .unwrap();
        }
        merge_solved_chain(&mut working, &mut output, 1, 3).unwrap();

        // 链内骨骼取求解结果
        for joint in [1, 2, 3] {
            let solved = working.model_transform(joint).unwrap();
            let merged = output.model_transform(joint).unwrap();
            assert!(merged.translation.abs_diff_eq(solved.translation, 1e-5));
        }
        // 末端之后的骨骼保持局部偏移，模型变换跟随
        for distal in [4, 5] {
            let local_before = before.local_transform(distal).unwrap();
            let local_after = output.local_transform(distal).unwrap();
            assert!(local_after.abs_diff_eq(&local_before, 1e-5));
            assert!(!output
                .model_transform(distal)
                .unwrap()
                .translation
                .abs_diff_eq(before.model_transform(distal).unwrap().translation, 1e-3));
        }
        // 子树之外不动
        assert_eq!(output.model_transform(0), before.model_transform(0));
    }

    #[test]
    fn test_merge_keeps_output_scale() {
        let skeleton = arm();
        let mut output = Pose::new(Arc::clone(&skeleton));
        let mut elbow = output.model_transform(2).unwrap();
        elbow.scale = Vec3::splat(2.0);
        output
            .set_model_transform(2, elbow, Propagation::DoNotPropagate)
            .unwrap();

        let mut working = Pose::new(Arc::clone(&skeleton));
        let mut working_elbow = working.local_transform(2).unwrap();
        working_elbow.scale = Vec3::splat(5.0);
        working.set_local_transform(2, working_elbow).unwrap();

        merge_solved_chain(&mut working, &mut output, 1, 3).unwrap();
        assert!(output.model_transform(2).unwrap().scale.abs_diff_eq(Vec3::splat(2.0), 1e-6));
    }

    #[test]
    fn test_layout_mismatch() {
        let mut working = Pose::new(arm());
        let mut output = Pose::new(Arc::new(Skeleton::new(Vec::new()).unwrap()));
        assert!(matches!(
            isolate_chain(&mut working, &output, 1),
            Err(IkError::InvalidPose(_))
        ));
        assert!(merge_solved_chain(&mut working, &mut output, 1, 3).is_err());
        assert!(copy_synced_pose(&mut working, &mut output).is_err());
    }

    #[test]
    fn test_same_count_different_hierarchy() {
        let chain = Arc::new(
            Skeleton::from_model_positions([
                ("a", -1, Vec3::ZERO),
                ("b", 0, Vec3::Y),
                ("c", 1, Vec3::new(0.0, 1.0, 1.0)),
            ])
            .unwrap(),
        );
        let fork = Arc::new(
            Skeleton::from_model_positions([
                ("a", -1, Vec3::ZERO),
                ("b", 0, Vec3::Y),
                ("c", 0, Vec3::Z),
            ])
            .unwrap(),
        );
        let mut working = Pose::new(fork);
        let mut output = Pose::new(Arc::clone(&chain));
        let before = output.clone();

        assert!(matches!(
            copy_synced_pose(&mut working, &mut output),
            Err(IkError::InvalidPose(_))
        ));
        assert!(merge_solved_chain(&mut working, &mut output, 0, 2).is_err());
        assert_eq!(output, before);

        // 不同实例但层级相同的骨骼可以互通
        let twin = Arc::new(Skeleton::new(chain.bones().to_vec()).unwrap());
        let mut working = Pose::new(twin);
        assert!(copy_synced_pose(&mut working, &mut output).is_ok());
    }
}
