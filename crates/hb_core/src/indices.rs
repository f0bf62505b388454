// crates/hb_core/src/indices.rs

//! 统一索引类型定义
//!
//! 全项目唯一的索引类型定义处，其他模块必须从这里引用。
//!
//! # 设计原则
//!
//! 1. **类型安全**: 粒子索引与刚体索引不可混用
//! 2. **零开销**: `repr(transparent)` 包装 `usize`，运行时无开销
//! 3. **排序稳定性**: 排序后粒子序仅在单个时间步内稳定，跨步引用
//!    必须经过邻居提供者的 sorted → original 映射（[`ParticleIndex`]
//!    标记映射后的原始索引）

use serde::{Deserialize, Serialize};
use std::fmt;

/// 无效索引标记
pub const INVALID_INDEX: usize = usize::MAX;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub usize);

        impl $name {
            /// 无效索引常量
            pub const INVALID: Self = Self(INVALID_INDEX);

            /// 创建新索引
            #[inline]
            pub const fn new(idx: usize) -> Self {
                Self(idx)
            }

            /// 获取索引值
            #[inline]
            pub const fn get(self) -> usize {
                self.0
            }

            /// 检查是否有效
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != INVALID_INDEX
            }

            /// 检查是否无效
            #[inline]
            pub const fn is_invalid(self) -> bool {
                self.0 == INVALID_INDEX
            }

            /// 转换为 Option
            #[inline]
            pub fn to_option(self) -> Option<usize> {
                if self.is_valid() {
                    Some(self.0)
                } else {
                    None
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                } else {
                    write!(f, concat!(stringify!($name), "(INVALID)"))
                }
            }
        }

        impl From<usize> for $name {
            fn from(idx: usize) -> Self {
                Self(idx)
            }
        }
    };
}

define_index!(
    /// 流体粒子原始索引（跨步稳定，排序后索引经映射得到）
    ParticleIndex
);

define_index!(
    /// 刚体索引（跨步稳定，用于接触力查询）
    BodyIndex
);

// ============================================================
// 单元测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_basics() {
        let p = ParticleIndex::new(7);
        assert_eq!(p.get(), 7);
        assert!(p.is_valid());
        assert_eq!(p.to_option(), Some(7));
    }

    #[test]
    fn test_invalid_index() {
        let b = BodyIndex::INVALID;
        assert!(b.is_invalid());
        assert_eq!(b.to_option(), None);
        assert_eq!(BodyIndex::default(), BodyIndex::INVALID);
    }

    #[test]
    fn test_index_ordering() {
        let a = ParticleIndex::new(1);
        let b = ParticleIndex::new(2);
        assert!(a < b);
    }
}
