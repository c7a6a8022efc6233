//! 两关节 IK
//!
//! - `config`：链配置与肢体描述
//! - `sync`：工作姿势 / 输出姿势之间的子树同步
//! - `backend`：数值求解后端
//! - `solver`：求解流程

mod backend;
mod config;
mod solver;
pub mod settings;
pub mod sync;

pub use backend::{AnalyticTwoJoints, TwoJointsBackend};
pub use config::{ChainGroup, IkChainConfig, IkMode};
pub use settings::{get_settings, reset_settings, set_settings, SolverSettings};
pub use solver::TwoJointsSolver;
