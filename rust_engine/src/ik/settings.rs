//! IK 求解配置
//!
//! 与物理配置一样扁平化，全局一份，可在运行时调整。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 求解器配置
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    /// 骨骼长度下限，短于此值视为退化链，默认 1e-4
    pub min_bone_length: f32,
    /// 最大伸展比例（相对两段骨骼长度之和），默认 1.0
    /// 小于 1.0 可避免手臂完全伸直时的抖动
    pub max_reach_ratio: f32,
    /// 是否输出每次求解的调试日志
    pub debug_log: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            min_bone_length: 1e-4,
            max_reach_ratio: 1.0,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SOLVER_SETTINGS: Lazy<RwLock<SolverSettings>> =
    Lazy::new(|| RwLock::new(SolverSettings::default()));

/// 获取当前配置（只读）
pub fn get_settings() -> SolverSettings {
    match SOLVER_SETTINGS.read() {
        Ok(settings) => settings.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// 手动设置配置（用于运行时调试）
pub fn set_settings(settings: SolverSettings) {
    match SOLVER_SETTINGS.write() {
        Ok(mut guard) => *guard = settings,
        Err(poisoned) => *poisoned.into_inner() = settings,
    }
}

/// 重置为默认配置
pub fn reset_settings() {
    set_settings(SolverSettings::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_reset_settings() {
        // 全局配置被其他测试并行读取，只改动 debug_log，结束时恢复原值
        let original = get_settings();

        let mut settings = original.clone();
        settings.debug_log = true;
        set_settings(settings);
        assert!(get_settings().debug_log);
        assert_eq!(get_settings().min_bone_length, original.min_bone_length);

        reset_settings();
        assert_eq!(get_settings(), SolverSettings::default());

        set_settings(original.clone());
        assert_eq!(get_settings(), original);
    }
}
