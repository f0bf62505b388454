// crates/hb_fluid/src/lib.rs

//! 3-DOF 粒子流体耦合容器
//!
//! 将弱可压缩流体建模为自由运动的粒子集合（"3-DOF 体"），通过统一的
//! 互补/约束公式与刚体及彼此耦合：密度误差（及可选的粘性）作为被求解
//! 的约束行进入全局系统，而不是显式力。
//!
//! # 模块
//!
//! - [`kernels`]: SPH 光滑核（poly6 密度核、spiky 梯度）
//! - [`particles`]: 粒子存储（位置/速度/密度 SoA 数组）
//! - [`neighbors`]: 邻居提供者接口与定步长邻居表
//! - [`boundary`]: 刚体-流体边界协作者接口
//! - [`config`]: 流体参数配置与校验
//! - [`container`]: [`FluidContainer`] —— 逐步构建管线与读回查询
//!
//! # 每步控制流
//!
//! ```text
//! 邻居提供者 → 密度估计(两遍) → 雅可比填充 → 柔度/右端项
//!   → (外部求解器) → 拉伸失稳修正 → 压强/密度/接触力抽取
//! ```
//!
//! 稀疏结构必须在数值写入前声明（拓扑遍 → 数值遍），因为底层
//! 稀疏矩阵的行结构每步一次性冻结（见 `hb_core::jacobian`）。
//!
//! # 非目标
//!
//! 本容器不做邻居搜索、不求解全局线性/互补系统、不管理粒子数组
//! 之外的物体生命周期——这些由外部协作者承担。

#![warn(missing_docs)]

pub mod boundary;
pub mod config;
pub mod container;
pub mod kernels;
pub mod neighbors;
pub mod particles;

pub use boundary::{BoundaryContext, NoBoundaryContacts, RigidFluidBoundary};
pub use config::{FluidConfig, FluidConfigBuilder, FluidConfigError};
pub use container::FluidContainer;
pub use kernels::KernelSet;
pub use neighbors::{NeighborProvider, NeighborTable, MAX_NEIGHBORS};
pub use particles::ParticleStore;

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::boundary::{BoundaryContext, NoBoundaryContacts, RigidFluidBoundary};
    pub use crate::config::{FluidConfig, FluidConfigBuilder};
    pub use crate::container::FluidContainer;
    pub use crate::neighbors::{NeighborProvider, NeighborTable, MAX_NEIGHBORS};
    pub use crate::particles::ParticleStore;
    pub use hb_core::prelude::*;
}
