// crates/hb_core/src/lib.rs

//! HydroBody 引擎核心抽象层
//!
//! 提供所有物理容器共享的基础设施，包括：
//! - [`indices`]: 统一索引类型（ParticleIndex, BodyIndex）
//! - [`error`]: 统一错误类型
//! - [`jacobian`]: 行终结式稀疏约束矩阵（拓扑声明 → 数值写入两阶段协议）
//! - [`dof`]: 全局速度未知量布局（刚体 → 轴 → 电机 → 3-DOF 粒子）
//! - [`state`]: 外部持有的求解器状态上下文（D_T, b, E, gamma, ...）
//! - [`container`]: 3-DOF 物理容器的逐步构建协议 trait
//!
//! # 设计原则
//!
//! 1. **无隐藏全局状态**: 共享数组封装在 [`state::SolverState`] 中，
//!    以显式引用传入每个容器的逐步回调
//! 2. **行范围独占**: 每个容器在一个时间步内独占一段约束行区间，
//!    通过 [`state::ConstraintRange`] 显式传递
//! 3. **每步重建**: 约束雅可比的稀疏结构每步作废重建，
//!    拓扑必须先于数值声明（见 [`jacobian::ConstraintMatrix`]）

#![warn(missing_docs)]

pub mod container;
pub mod dof;
pub mod error;
pub mod indices;
pub mod jacobian;
pub mod state;

pub use container::ThreeDofContainer;
pub use dof::DofLayout;
pub use error::{HbError, HbResult};
pub use indices::{BodyIndex, ParticleIndex, INVALID_INDEX};
pub use jacobian::{ConstraintMatrix, RowBlockMut, RowView};
pub use state::{ConstraintRange, SolverState, StepSettings};

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::container::ThreeDofContainer;
    pub use crate::dof::DofLayout;
    pub use crate::error::{HbError, HbResult};
    pub use crate::indices::{BodyIndex, ParticleIndex};
    pub use crate::jacobian::ConstraintMatrix;
    pub use crate::state::{ConstraintRange, SolverState, StepSettings};
}
