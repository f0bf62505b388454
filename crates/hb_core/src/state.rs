// crates/hb_core/src/state.rs

//! 求解器状态上下文
//!
//! 约束雅可比、右端项、柔度、乘子等全局共享数组由持有引擎显式持有，
//! 以 `&mut SolverState` 传入每个物理容器的逐步回调——没有隐藏的
//! 全局单例。各容器在一步内独占互不重叠的约束行区间
//! （[`ConstraintRange`]），这是并行写入安全性的前提。
//!
//! # 生命周期
//!
//! 除速度向量 `v` 外，所有数组在每步开始时由 [`SolverState::configure_step`]
//! 重建，具有单步作用域。

use crate::jacobian::ConstraintMatrix;
use glam::DVec3;
use serde::{Deserialize, Serialize};

// ============================================================
// 步进设置
// ============================================================

/// 每步只读设置（由外部引擎提供）
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepSettings {
    /// 时间步长 [s]（步间可变，依赖量必须每步重算）
    pub step_size: f64,
    /// 重力加速度 [m/s²]
    pub gravity: DVec3,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            step_size: 1e-2,
            gravity: DVec3::new(0.0, 0.0, -9.81),
        }
    }
}

// ============================================================
// 约束行区间
// ============================================================

/// 一段独占的约束行区间（显式的范围所有权参数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstraintRange {
    /// 起始行
    pub start: usize,
    /// 行数
    pub count: usize,
}

impl ConstraintRange {
    /// 创建区间
    #[inline]
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// 区间末尾（开区间）
    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.count
    }

    /// 是否为空
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ============================================================
// 求解器状态
// ============================================================

/// 外部持有的求解器状态
///
/// 单写者约定：一个约束行（及其在 `b`/`e`/`gamma` 中的对应元素）
/// 在一步内只能由拥有该行区间的容器写入。
#[derive(Debug, Clone, Default)]
pub struct SolverState {
    /// 约束雅可比 `D_T`（约束行 × DOF 列）
    pub d_t: ConstraintMatrix,
    /// 质量矩阵 `M`（DOF × DOF，对角块）
    pub m: ConstraintMatrix,
    /// 逆质量矩阵 `M⁻¹`
    pub m_inv: ConstraintMatrix,
    /// 右端项残差向量 `b`（每约束行一个标量）
    pub b: Vec<f64>,
    /// 柔度向量 `E`（每约束行一个标量；0 = 精确约束）
    pub e: Vec<f64>,
    /// 乘子向量 `gamma`（冲量单位；求解前写入暖启动初值，求解后读回）
    pub gamma: Vec<f64>,
    /// 步长缩放的外力载荷 `hf`（长度 = DOF 总数）
    pub hf: Vec<f64>,
    /// 速度未知量向量 `v`（长度 = DOF 总数，求解后由引擎更新）
    pub v: Vec<f64>,
    /// 本步设置
    pub settings: StepSettings,
}

impl SolverState {
    /// 创建空状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 按本步的约束数与 DOF 数重建所有步作用域数组
    ///
    /// `v` 保留已有前缀（引擎拥有速度状态），其余数组清零重建。
    pub fn configure_step(&mut self, n_constraints: usize, n_dofs: usize) {
        self.d_t.reset(n_constraints, n_dofs);
        self.m.reset(n_dofs, n_dofs);
        self.m_inv.reset(n_dofs, n_dofs);

        self.b.clear();
        self.b.resize(n_constraints, 0.0);
        self.e.clear();
        self.e.resize(n_constraints, 0.0);
        self.gamma.clear();
        self.gamma.resize(n_constraints, 0.0);
        self.hf.clear();
        self.hf.resize(n_dofs, 0.0);

        self.v.resize(n_dofs, 0.0);
    }

    /// 约束行总数
    #[inline]
    pub fn n_constraints(&self) -> usize {
        self.b.len()
    }

    /// DOF 总数
    #[inline]
    pub fn n_dofs(&self) -> usize {
        self.hf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_step_sizes() {
        let mut state = SolverState::new();
        state.configure_step(5, 12);
        assert_eq!(state.n_constraints(), 5);
        assert_eq!(state.n_dofs(), 12);
        assert_eq!(state.gamma.len(), 5);
        assert_eq!(state.v.len(), 12);
        assert_eq!(state.d_t.n_rows(), 5);
        assert_eq!(state.d_t.n_cols(), 12);
    }

    #[test]
    fn test_velocity_preserved_across_steps() {
        let mut state = SolverState::new();
        state.configure_step(1, 3);
        state.v[0] = 7.0;
        state.configure_step(2, 6);
        assert_eq!(state.v[0], 7.0);
        assert_eq!(state.v.len(), 6);
    }

    #[test]
    fn test_constraint_range() {
        let r = ConstraintRange::new(3, 4);
        assert_eq!(r.end(), 7);
        assert!(!r.is_empty());
        assert!(ConstraintRange::new(0, 0).is_empty());
    }
}
