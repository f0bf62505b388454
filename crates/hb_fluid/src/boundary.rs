// crates/hb_fluid/src/boundary.rs

//! 刚体-流体边界协作者接口
//!
//! 刚体与流体粒子间的接触约束（法向 + 可选摩擦）在全局矩阵中占据
//! 流体块之前的一段行区间，但其检测与装配属于刚体接触管线——
//! 容器只负责为它预留行区间并在各阶段转发回调。
//!
//! 行区间大小由接触数与摩擦开关决定：无摩擦时每接触 1 行（法向），
//! 有摩擦时每接触 3 行（法向 + 两切向）。

use hb_core::{DofLayout, SolverState};

/// 转发给边界协作者的每步上下文
#[derive(Debug, Clone, Copy)]
pub struct BoundaryContext {
    /// 边界行区间的起始行
    pub start_row: usize,
    /// 本步 DOF 布局
    pub layout: DofLayout,
    /// 刚体-流体接触摩擦系数（0 = 仅法向约束）
    pub contact_mu: f64,
}

/// 刚体-流体边界约束的装配接口
pub trait RigidFluidBoundary {
    /// 当前刚体-流体接触数
    fn num_contacts(&self) -> usize;

    /// 本步占用的边界约束行数
    fn num_rows(&self, contact_mu: f64) -> usize {
        let per_contact = if contact_mu == 0.0 { 1 } else { 3 };
        self.num_contacts() * per_contact
    }

    /// 每接触的结构非零元数上界（法向行 9 列：刚体 6 + 粒子 3）
    fn nnz_per_row(&self) -> usize {
        9
    }

    /// 拓扑阶段：声明边界行的结构非零元
    fn build_sparsity(&mut self, state: &mut SolverState, ctx: &BoundaryContext) {
        let _ = (state, ctx);
    }

    /// 数值阶段：写入边界行雅可比
    fn build_jacobian(&mut self, state: &mut SolverState, ctx: &BoundaryContext) {
        let _ = (state, ctx);
    }

    /// 写入边界行右端项（穿透深度残差）
    fn build_rhs(&mut self, state: &mut SolverState, ctx: &BoundaryContext) {
        let _ = (state, ctx);
    }

    /// 写入边界行柔度系数
    fn build_compliance(&mut self, state: &mut SolverState, ctx: &BoundaryContext) {
        let _ = (state, ctx);
    }

    /// 边界行乘子投影（非负法向冲量、摩擦锥）
    fn project(&mut self, gamma: &mut [f64], ctx: &BoundaryContext) {
        let _ = (gamma, ctx);
    }
}

/// 无边界接触的空实现
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBoundaryContacts;

impl RigidFluidBoundary for NoBoundaryContacts {
    #[inline]
    fn num_contacts(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_tracks_friction() {
        struct FourContacts;
        impl RigidFluidBoundary for FourContacts {
            fn num_contacts(&self) -> usize {
                4
            }
        }
        let b = FourContacts;
        assert_eq!(b.num_rows(0.0), 4);
        assert_eq!(b.num_rows(0.3), 12);
    }

    #[test]
    fn test_no_contacts_is_empty() {
        let b = NoBoundaryContacts;
        assert_eq!(b.num_contacts(), 0);
        assert_eq!(b.num_rows(0.5), 0);
    }
}
