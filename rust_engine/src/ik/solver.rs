//! 两关节 IK 求解流程
//!
//! 持有链配置，可选地在参考姿势中隔离求解链，调用后端求解，
//! 再把结果合并回输出姿势。

use super::backend::{AnalyticTwoJoints, TwoJointsBackend};
use super::config::{ChainGroup, IkChainConfig, IkMode};
use super::settings::get_settings;
use super::sync;
use crate::skeleton::Pose;
use crate::{IkError, Result};

/// 两关节求解器
///
/// 链配置存储在首次 `setup` 时取得，`release` 或析构时释放且只释放一次。
/// 同一实例的调用需由调用方串行化。
pub struct TwoJointsSolver<B = AnalyticTwoJoints> {
    backend: B,
    chain: Option<Box<[IkChainConfig]>>,
    released: bool,
}

/// 取得一份链配置存储，内容为默认值
fn allocate_chain() -> Result<Box<[IkChainConfig]>> {
    let mut block = Vec::new();
    block.try_reserve_exact(1)?;
    block.push(IkChainConfig::default());
    Ok(block.into_boxed_slice())
}

impl TwoJointsSolver<AnalyticTwoJoints> {
    /// 使用默认解析后端
    pub fn analytic() -> Self {
        Self::new(AnalyticTwoJoints::new())
    }
}

impl<B: TwoJointsBackend> TwoJointsSolver<B> {
    /// 创建求解器，此时尚未持有链配置
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            chain: None,
            released: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 取得链配置存储，已持有时重置为默认值
    pub fn setup(&mut self) -> Result<()> {
        if self.released {
            return Err(IkError::Released);
        }
        match self.chain_mut() {
            Some(chain) => chain.reset(),
            None => self.chain = Some(allocate_chain()?),
        }
        Ok(())
    }

    /// 释放链配置存储，只有第一次调用返回 true
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.chain = None;
        true
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn chain(&self) -> Option<&IkChainConfig> {
        self.chain.as_deref().and_then(|block| block.first())
    }

    pub fn chain_mut(&mut self) -> Option<&mut IkChainConfig> {
        self.chain.as_deref_mut().and_then(|block| block.first_mut())
    }

    fn check_usable(&self) -> Result<()> {
        if self.released {
            Err(IkError::Released)
        } else if self.chain.is_none() {
            Err(IkError::NotSetUp)
        } else {
            Ok(())
        }
    }

    /// 求解并写回输出姿势，失败时输出姿势保持不变
    ///
    /// `frozen` 为 true 时，工作姿势先重置为参考姿势，只从输出姿势
    /// 复制链起点子树，求解后按子树合并；否则整体复制工作姿势。
    pub fn try_solve(
        &mut self,
        pose_in: &mut Pose,
        pose_out: Option<&mut Pose>,
        frozen: bool,
    ) -> Result<()> {
        self.check_usable()?;
        let chain = self.chain().ok_or(IkError::NotSetUp)?;
        let pose_out = pose_out.ok_or_else(|| IkError::InvalidPose("缺少输出姿势".into()))?;
        sync::check_same_layout(pose_in, pose_out)?;

        if frozen {
            // 重置时已同步模型空间
            pose_in.set_to_reference_pose();
            sync::isolate_chain(pose_in, pose_out, chain.first_joint_idx)?;
        }

        if !self.backend.solve(chain, pose_in) {
            return Err(IkError::SolveFailure);
        }

        if frozen {
            sync::merge_solved_chain(pose_in, pose_out, chain.first_joint_idx, chain.end_bone_idx)?;
        } else {
            sync::copy_synced_pose(pose_in, pose_out)?;
        }

        if get_settings().debug_log {
            log::debug!(
                "两关节 IK 求解完成: {} -> {} -> {}, frozen={}",
                chain.first_joint_idx,
                chain.second_joint_idx,
                chain.end_bone_idx,
                frozen
            );
        }
        Ok(())
    }

    /// 把肢体描述写入链配置后求解
    ///
    /// 相对模式，或某个分量未强制时，目标取输出姿势中末端骨骼的当前值，
    /// 并写回 `group`。
    pub fn try_solve_group(
        &mut self,
        pose_in: &mut Pose,
        pose_out: Option<&mut Pose>,
        group: &mut ChainGroup,
        frozen: bool,
    ) -> Result<()> {
        self.check_usable()?;
        if !group.enabled {
            return Err(IkError::DisabledChain);
        }
        let pose_out = pose_out.ok_or_else(|| IkError::InvalidPose("缺少输出姿势".into()))?;

        let chain = self.chain_mut().ok_or(IkError::NotSetUp)?;
        chain.reset();
        group.apply_to(chain);

        let end = usize::try_from(group.end_bone)
            .ok()
            .and_then(|i| pose_out.model_transform(i))
            .ok_or(IkError::UnresolvableTarget(group.end_bone))?;

        let relative = group.mode == IkMode::Relative;
        if relative || !group.enforce_end_position {
            group.target_position = end.translation;
        }
        if relative || !group.enforce_end_rotation {
            group.target_rotation = end.rotation;
        }
        chain.end_target_ms = group.target_position;
        chain.end_target_rotation_ms = group.target_rotation;

        self.try_solve(pose_in, Some(pose_out), frozen)
    }

    /// `try_solve` 的布尔版本
    pub fn solve(&mut self, pose_in: &mut Pose, pose_out: Option<&mut Pose>, frozen: bool) -> bool {
        match self.try_solve(pose_in, pose_out, frozen) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("两关节 IK 求解失败: {}", e);
                false
            }
        }
    }

    /// `try_solve_group` 的布尔版本
    pub fn solve_group(
        &mut self,
        pose_in: &mut Pose,
        pose_out: Option<&mut Pose>,
        group: &mut ChainGroup,
        frozen: bool,
    ) -> bool {
        match self.try_solve_group(pose_in, pose_out, group, frozen) {
            Ok(()) => true,
            Err(IkError::DisabledChain) => false,
            Err(e) => {
                log::debug!("肢体 {} IK 求解失败: {}", group.name, e);
                false
            }
        }
    }
}
