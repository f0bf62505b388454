// crates/hb_core/src/container.rs

//! 3-DOF 物理容器的逐步构建协议
//!
//! 流体、颗粒物质等 3-DOF 容器家族共享同一套有序的逐步钩子：
//!
//! ```text
//! setup → update → compute_mass / compute_inv_mass
//!   → generate_sparsity → build_d → build_b → build_e → project
//!   → pre_solve → (外部求解器) → post_solve → update_position
//! ```
//!
//! 钩子之间存在严格的顺序依赖（稀疏结构先于数值、数值先于求解、
//! 求解先于后处理），由持有引擎保证调用顺序；容器只需实现自己
//! 需要的钩子，其余保持默认空实现。

use crate::dof::DofLayout;
use crate::state::SolverState;

/// 3-DOF 物理容器的逐步构建协议
///
/// 约定：`generate_sparsity` 声明的列位置必须与 `build_d` 写入的
/// 列位置完全一致；两者都只触碰本容器在 `setup` 中分得的行区间。
pub trait ThreeDofContainer {
    /// 本步贡献的约束行数（用于全局矩阵尺寸计算）
    fn num_constraints(&self) -> usize;

    /// 本步贡献的结构非零元数上界（用于全局矩阵容量预留）
    fn num_nonzeros(&self) -> usize;

    /// 计算本步的行偏移与 DOF 偏移
    ///
    /// `start_row` 是引擎按各容器的 `num_constraints` 顺序累加出的
    /// 本容器独占行区间起点。
    fn setup(&mut self, start_row: usize, layout: &DofLayout) {
        let _ = (start_row, layout);
    }

    /// 写入步长缩放的外力载荷（如重力）
    fn update(&mut self, state: &mut SolverState) {
        let _ = state;
    }

    /// 求解后按速度推进位置
    fn update_position(&mut self, state: &SolverState) {
        let _ = state;
    }

    /// 向质量矩阵写入本容器的对角块
    fn compute_mass(&self, state: &mut SolverState) {
        let _ = state;
    }

    /// 向逆质量矩阵写入本容器的对角块
    fn compute_inv_mass(&self, state: &mut SolverState) {
        let _ = state;
    }

    /// 拓扑阶段：声明本容器各约束行的结构非零元
    fn generate_sparsity(&mut self, state: &mut SolverState) {
        let _ = state;
    }

    /// 数值阶段：写入雅可比数值
    fn build_d(&mut self, state: &mut SolverState) {
        let _ = state;
    }

    /// 写入右端项残差
    fn build_b(&mut self, state: &mut SolverState) {
        let _ = state;
    }

    /// 写入柔度（正则化）系数
    fn build_e(&mut self, state: &mut SolverState) {
        let _ = state;
    }

    /// 乘子投影（锥约束等；行区间限定在本容器）
    fn project(&mut self, gamma: &mut [f64]) {
        let _ = gamma;
    }

    /// 求解前钩子（暖启动写入）
    fn pre_solve(&mut self, state: &mut SolverState) {
        let _ = state;
    }

    /// 求解后钩子（乘子缓存、后处理修正）
    fn post_solve(&mut self, state: &mut SolverState) {
        let _ = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 最小容器：只实现必需的尺寸查询，其余钩子保持默认
    struct EmptyContainer;

    impl ThreeDofContainer for EmptyContainer {
        fn num_constraints(&self) -> usize {
            0
        }
        fn num_nonzeros(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let mut c = EmptyContainer;
        let mut state = SolverState::new();
        state.configure_step(0, 0);

        c.setup(0, &DofLayout::new(0, 0, 0, 0));
        c.update(&mut state);
        c.generate_sparsity(&mut state);
        c.build_d(&mut state);
        c.build_b(&mut state);
        c.build_e(&mut state);
        c.pre_solve(&mut state);
        c.post_solve(&mut state);
        c.update_position(&state);
        assert_eq!(c.num_constraints(), 0);
    }
}
