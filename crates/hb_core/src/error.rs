// crates/hb_core/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `HbError` 枚举和 `HbResult` 类型别名。
//!
//! # 设计原则
//!
//! 1. **层次化**: 核心层只定义结构性错误，物理参数错误在各容器中扩展
//! 2. **退化态不是错误**: 零粒子、零接触、暖启动缓存长度不匹配等
//!    瞬态退化状态由调用方提前返回处理，不经过本类型
//! 3. **热路径不走 Result**: 约束矩阵的写入协议违规属于编程错误，
//!    由断言与布尔返回值处理（见 `jacobian`），不进入本类型

use thiserror::Error;

/// 统一结果类型
pub type HbResult<T> = Result<T, HbError>;

/// HydroBody 核心错误类型
#[derive(Error, Debug)]
pub enum HbError {
    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },
}

impl HbError {
    /// 构造无效输入错误
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HbError::SizeMismatch {
            name: "gamma",
            expected: 10,
            actual: 7,
        };
        let msg = format!("{err}");
        assert!(msg.contains("gamma"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_invalid_input_helper() {
        let err = HbError::invalid_input("粒子数为负");
        assert!(matches!(err, HbError::InvalidInput { .. }));
    }
}
