//! 两关节 IK 求解与姿势合并
//!
//! 提供：
//! - 扁平数组骨骼层级与姿势（局部/模型空间）
//! - 两关节（三骨骼）IK 链配置
//! - 工作姿势与输出姿势之间的子树同步、合并
//! - 可替换的数值求解后端（默认解析解）

pub mod ik;
pub mod skeleton;

pub use ik::{
    AnalyticTwoJoints, ChainGroup, IkChainConfig, IkMode, SolverSettings, TwoJointsBackend,
    TwoJointsSolver,
};
pub use skeleton::{Bone, BoneTransform, Pose, Propagation, Skeleton};

use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IkError {
    #[error("chain config allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("solver storage already released")]
    Released,

    #[error("chain config not set up")]
    NotSetUp,

    #[error("invalid pose: {0}")]
    InvalidPose(String),

    #[error("chain group is disabled")]
    DisabledChain,

    #[error("end bone {0} not found in output skeleton")]
    UnresolvableTarget(i32),

    #[error("two-joint solve failed")]
    SolveFailure,

    #[error("unknown bone: {0}")]
    UnknownBone(String),

    #[error("bone index {index} out of range ({count} bones)")]
    BoneOutOfRange { index: usize, count: usize },

    #[error("bone {bone} has invalid parent {parent}")]
    InvalidParent { bone: usize, parent: i32 },

    #[error("bone {bone} is ordered before its parent {parent}")]
    UnsortedHierarchy { bone: usize, parent: i32 },
}

pub type Result<T> = std::result::Result<T, IkError>;
