// crates/hb_fluid/src/container.rs

//! 流体容器：SPH 密度/粘性约束的逐步装配
//!
//! 每个粒子贡献一行密度约束（开启粘性时再加三行粘性约束），
//! 约束雅可比按 [`hb_core::jacobian`] 的两阶段协议装配：
//! 邻居拓扑先声明，SPH 数值后写入。求解由外部互补求解器完成，
//! 本容器只产出 `D_T` / `b` / `E` 并在求解前后做暖启动与
//! 拉伸失稳修正。
//!
//! # 行区间布局
//!
//! ```text
//! start_boundary ──┬── 边界行（每接触 1 或 3 行，协作者装配）
//! start_density  ──┼── 密度行（每粒子 1 行）
//! start_viscous  ──┼── 粘性行（每粒子 3 行，可选）
//! ```
//!
//! 所有行偏移与 DOF 偏移在 [`FluidContainer::setup`]
//! 中按本步计数重算，不跨步缓存。
//!
//! # 索引空间
//!
//! 装配全程工作在邻居提供者的排序后索引上；只有
//! [`FluidContainer::update_position`] 在回写粒子数组时经
//! `original_index` 映射回原始索引。

use glam::DVec3;
use hb_core::{
    BodyIndex, ConstraintRange, DofLayout, HbResult, RowBlockMut, SolverState, ThreeDofContainer,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::boundary::{BoundaryContext, NoBoundaryContacts, RigidFluidBoundary};
use crate::config::FluidConfig;
use crate::neighbors::{NeighborProvider, NeighborTable, MAX_NEIGHBORS};
use crate::particles::ParticleStore;

/// 粘性项分母的正则化参数 η（以核半径为单位）
const VISCOSITY_ETA: f64 = 0.01;

/// 3-DOF 粒子流体容器
pub struct FluidContainer {
    config: FluidConfig,
    particles: ParticleStore,
    neighbors: Box<dyn NeighborProvider + Send + Sync>,
    boundary: Box<dyn RigidFluidBoundary + Send + Sync>,
    /// 本步归一化密度（排序后索引序）
    density: Vec<f64>,
    /// 上一步流体块乘子缓存（暖启动源）
    gamma_old: Vec<f64>,
    /// 边界行抽取出的广义接触力（DOF 长度；无接触时为空）
    contact_forces: Vec<f64>,
    layout: DofLayout,
    start_boundary: usize,
    start_density: usize,
    start_viscous: usize,
    body_offset: usize,
    num_boundary_rows: usize,
}

impl FluidContainer {
    /// 以给定配置创建容器（无边界接触、空邻居表）
    pub fn new(config: FluidConfig) -> Self {
        Self {
            config,
            particles: ParticleStore::new(),
            neighbors: Box::new(NeighborTable::default()),
            boundary: Box::new(NoBoundaryContacts),
            density: Vec::new(),
            gamma_old: Vec::new(),
            contact_forces: Vec::new(),
            layout: DofLayout::new(0, 0, 0, 0),
            start_boundary: 0,
            start_density: 0,
            start_viscous: 0,
            body_offset: 0,
            num_boundary_rows: 0,
        }
    }

    /// 配置
    #[inline]
    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// 粒子存储
    #[inline]
    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    /// 批量追加粒子（速度条目不足时补零）
    pub fn add_particles(&mut self, positions: &[DVec3], velocities: &[DVec3]) -> HbResult<()> {
        self.particles.add_particles(positions, velocities)
    }

    /// 替换邻居提供者
    ///
    /// 提供者的粒子数必须与本容器一致，且每步在粒子移动后更新。
    pub fn set_neighbors(&mut self, neighbors: Box<dyn NeighborProvider + Send + Sync>) {
        self.neighbors = neighbors;
    }

    /// 用暴力搜索按当前粒子位置重建内置邻居表
    ///
    /// O(n²)，只适合测试与小规模场景；生产环境应通过
    /// [`set_neighbors`](Self::set_neighbors) 注入空间哈希提供者。
    pub fn rebuild_neighbors(&mut self) {
        self.neighbors = Box::new(NeighborTable::brute_force(
            self.particles.positions(),
            self.config.kernel_radius,
        ));
    }

    /// 替换边界协作者
    pub fn set_boundary(&mut self, boundary: Box<dyn RigidFluidBoundary + Send + Sync>) {
        self.boundary = boundary;
    }

    /// 本步密度行区间
    #[inline]
    pub fn density_range(&self) -> ConstraintRange {
        ConstraintRange::new(self.start_density, self.particles.len())
    }

    /// 本步边界行区间
    #[inline]
    pub fn boundary_range(&self) -> ConstraintRange {
        ConstraintRange::new(self.start_boundary, self.num_boundary_rows)
    }

    /// 本步粘性行区间（未开启粘性时为空）
    #[inline]
    pub fn viscous_range(&self) -> ConstraintRange {
        let count = if self.config.enable_viscosity {
            self.particles.len() * 3
        } else {
            0
        };
        ConstraintRange::new(self.start_viscous, count)
    }

    /// 流体块首列
    #[inline]
    pub fn body_offset(&self) -> usize {
        self.body_offset
    }

    fn boundary_ctx(&self) -> BoundaryContext {
        BoundaryContext {
            start_row: self.start_boundary,
            layout: self.layout,
            contact_mu: self.config.contact_mu,
        }
    }

    /// 流体块的暖启动/乘子长度（密度行 + 可选粘性行）
    #[inline]
    fn fluid_multiplier_len(&self) -> usize {
        let n = self.particles.len();
        if self.config.enable_viscosity {
            n + n * 3
        } else {
            n
        }
    }

    // ========== 密度遍 ==========

    /// 第一遍：SPH 密度求和 + 密度行雅可比
    ///
    /// 每个密度行的对角块等于负的非对角块之和（动量守恒）；
    /// 自邻居只计入密度，不产生梯度项。
    fn density_pass(&mut self, state: &mut SolverState) {
        let n = self.particles.len();
        self.density.clear();
        self.density.resize(n, 0.0);

        let kernels = self.config.kernels();
        let mass = self.config.mass;
        let mass_over_density = mass / self.config.rho;
        let body_offset = self.body_offset;
        let start_density = self.start_density;
        let neighbors = &*self.neighbors;

        let fill = |blk: &mut RowBlockMut<'_>, dens: &mut f64| {
            let body_a = blk.row() - start_density;
            let pos_a = neighbors.sorted_position(body_a);
            let mut acc = 0.0;
            let mut diag = DVec3::ZERO;
            for k in 0..neighbors.neighbor_count(body_a) {
                let body_b = neighbors.neighbor(body_a, k);
                if body_a == body_b {
                    acc += mass * kernels.poly6_zero();
                    continue;
                }
                let xij = pos_a - neighbors.sorted_position(body_b);
                let dist = xij.length();
                acc += mass * kernels.poly6(dist);

                let off_diag = mass_over_density * kernels.grad_spiky_coeff(dist) * xij;
                diag -= off_diag;
                blk.set_block3(body_offset + body_b * 3, off_diag);
            }
            blk.set_block3(body_offset + body_a * 3, diag);
            *dens = acc;
        };

        let mut blocks = state.d_t.row_blocks_mut(start_density, n);
        #[cfg(feature = "parallel")]
        blocks
            .par_iter_mut()
            .zip(self.density.par_iter_mut())
            .for_each(|(blk, dens)| fill(blk, dens));
        #[cfg(not(feature = "parallel"))]
        for (blk, dens) in blocks.iter_mut().zip(self.density.iter_mut()) {
            fill(blk, dens);
        }
    }

    /// 第二遍：Shepard 归一化
    ///
    /// 分母使用第一遍的原始密度快照，避免读到本遍已覆写的值。
    fn normalize_density_pass(&mut self) {
        let raw = self.density.clone();
        let kernels = self.config.kernels();
        let mass = self.config.mass;
        let neighbors = &*self.neighbors;

        let norm = |body_a: usize, dens: &mut f64| {
            let pos_a = neighbors.sorted_position(body_a);
            let mut denom = 0.0;
            for k in 0..neighbors.neighbor_count(body_a) {
                let body_b = neighbors.neighbor(body_a, k);
                if body_a == body_b {
                    denom += mass / raw[body_b] * kernels.poly6_zero();
                    continue;
                }
                let dist = pos_a.distance(neighbors.sorted_position(body_b));
                denom += mass / raw[body_b] * kernels.poly6(dist);
            }
            *dens = raw[body_a] / denom;
        };

        #[cfg(feature = "parallel")]
        self.density
            .par_iter_mut()
            .enumerate()
            .for_each(|(body_a, dens)| norm(body_a, dens));
        #[cfg(not(feature = "parallel"))]
        for (body_a, dens) in self.density.iter_mut().enumerate() {
            norm(body_a, dens);
        }
    }

    /// 粘性行雅可比（XSPH 型对称粘性，每粒子三行）
    fn viscosity_pass(&mut self, state: &mut SolverState) {
        let n = self.particles.len();
        let kernels = self.config.kernels();
        let h = self.config.kernel_radius;
        let h2 = h * h;
        let mass_2 = self.config.mass * self.config.mass;
        let visc_sum = 2.0 * self.config.viscosity;
        let eta_2 = VISCOSITY_ETA * VISCOSITY_ETA;
        let body_offset = self.body_offset;
        let neighbors = &*self.neighbors;
        let density = &self.density;

        let fill = |body_a: usize, rows: &mut [RowBlockMut<'_>]| {
            let pos_a = neighbors.sorted_position(body_a);
            let mut diag = [DVec3::ZERO; 3];
            for k in 0..neighbors.neighbor_count(body_a) {
                let body_b = neighbors.neighbor(body_a, k);
                if body_a == body_b {
                    continue;
                }
                let xij = pos_a - neighbors.sorted_position(body_b);
                let dist = xij.length();
                let kernel_xij = kernels.grad_spiky_coeff(dist) * xij;

                let part_a = 8.0 / (density[body_a] + density[body_b]);
                let part_c = 1.0 / (h * (dist * dist / h2 + eta_2));
                let scalar = -mass_2 * part_a * visc_sum * part_c;

                for axis in 0..3 {
                    let r = xij[axis] * scalar * kernel_xij;
                    rows[axis].set_block3(body_offset + body_b * 3, r);
                    diag[axis] -= r;
                }
            }
            for axis in 0..3 {
                rows[axis].set_block3(body_offset + body_a * 3, diag[axis]);
            }
        };

        let mut blocks = state.d_t.row_blocks_mut(self.start_viscous, n * 3);
        #[cfg(feature = "parallel")]
        blocks
            .par_chunks_mut(3)
            .enumerate()
            .for_each(|(body_a, rows)| fill(body_a, rows));
        #[cfg(not(feature = "parallel"))]
        for (body_a, rows) in blocks.chunks_mut(3).enumerate() {
            fill(body_a, rows);
        }
    }

    // ========== 读回查询 ==========

    /// 本步归一化密度（排序后索引序；`build_d` 之后有效）
    #[inline]
    pub fn fluid_density(&self) -> &[f64] {
        &self.density
    }

    /// 每粒子压强 = 密度行乘子（求解之后有效）
    pub fn fluid_pressure(&self, state: &SolverState) -> Vec<f64> {
        state.gamma[self.start_density..self.start_density + self.particles.len()].to_vec()
    }

    /// 每粒子所受的密度约束力 `D·γ / Δt`（排序后索引序）
    pub fn fluid_force(&self, state: &SolverState) -> Vec<DVec3> {
        let n = self.particles.len();
        if n == 0 {
            return Vec::new();
        }
        let mut scatter = vec![0.0; state.n_dofs()];
        state
            .d_t
            .apply_transpose_range(self.start_density, n, &state.gamma, &mut scatter);
        let inv_dt = 1.0 / state.settings.step_size;
        (0..n)
            .map(|i| {
                let dof = self.body_offset + i * 3;
                DVec3::new(scatter[dof], scatter[dof + 1], scatter[dof + 2]) * inv_dt
            })
            .collect()
    }

    /// 从边界行乘子抽取广义接触力（求解后调用一次，供按刚体查询）
    pub fn calculate_contact_forces(&mut self, state: &SolverState) {
        self.contact_forces.clear();
        if self.boundary.num_contacts() == 0 {
            return;
        }
        self.contact_forces.resize(state.n_dofs(), 0.0);
        state.d_t.apply_transpose_range(
            self.start_boundary,
            self.num_boundary_rows,
            &state.gamma,
            &mut self.contact_forces,
        );
        let inv_dt = 1.0 / state.settings.step_size;
        for f in &mut self.contact_forces {
            *f *= inv_dt;
        }
    }

    /// 流体作用在某刚体上的合力（无接触时为零）
    pub fn body_contact_force(&self, body: BodyIndex) -> DVec3 {
        if self.contact_forces.is_empty() {
            return DVec3::ZERO;
        }
        let dof = self.layout.rigid_velocity_dof(body.get());
        DVec3::new(
            self.contact_forces[dof],
            self.contact_forces[dof + 1],
            self.contact_forces[dof + 2],
        )
    }

    /// 流体作用在某刚体上的合力矩（无接触时为零）
    pub fn body_contact_torque(&self, body: BodyIndex) -> DVec3 {
        if self.contact_forces.is_empty() {
            return DVec3::ZERO;
        }
        let dof = self.layout.rigid_rotation_dof(body.get());
        DVec3::new(
            self.contact_forces[dof],
            self.contact_forces[dof + 1],
            self.contact_forces[dof + 2],
        )
    }
}

// ============================================================
// 逐步构建协议
// ============================================================

impl ThreeDofContainer for FluidContainer {
    fn num_constraints(&self) -> usize {
        let n = self.particles.len();
        let mut count = n + self.boundary.num_rows(self.config.contact_mu);
        if self.config.enable_viscosity {
            count += n * 3;
        }
        count
    }

    fn num_nonzeros(&self) -> usize {
        let n = self.particles.len();
        // 密度行按邻居上限预留容量（上界，非精确计数）
        let mut nnz = n * 6 * MAX_NEIGHBORS;
        nnz += self.boundary.nnz_per_row() * self.boundary.num_rows(self.config.contact_mu);
        if self.config.enable_viscosity {
            nnz += n * 18 * MAX_NEIGHBORS;
        }
        nnz
    }

    fn setup(&mut self, start_row: usize, layout: &DofLayout) {
        debug_assert_eq!(layout.num_particles, self.particles.len());
        self.layout = *layout;
        self.start_boundary = start_row;
        self.num_boundary_rows = self.boundary.num_rows(self.config.contact_mu);
        self.start_density = self.start_boundary + self.num_boundary_rows;
        self.start_viscous = self.start_density + self.particles.len();
        self.body_offset = layout.fluid_offset();

        let saturated = self.neighbors.saturated_count();
        if saturated > 0 {
            log::warn!(
                "{saturated} 个粒子的邻居列表达到上限 {MAX_NEIGHBORS}，被截断的邻居不参与本步约束"
            );
        }
    }

    fn update(&mut self, state: &mut SolverState) {
        let h_gravity = state.settings.step_size * self.config.mass * state.settings.gravity;
        for i in 0..self.particles.len() {
            let dof = self.body_offset + i * 3;
            state.hf[dof] = h_gravity.x;
            state.hf[dof + 1] = h_gravity.y;
            state.hf[dof + 2] = h_gravity.z;
        }
    }

    fn update_position(&mut self, state: &SolverState) {
        let dt = state.settings.step_size;
        let max_velocity = self.config.max_velocity;
        for i in 0..self.particles.len() {
            let dof = self.body_offset + i * 3;
            let mut vel = DVec3::new(state.v[dof], state.v[dof + 1], state.v[dof + 2]);
            let speed = vel.length();
            if speed > max_velocity {
                vel *= max_velocity / speed;
            }
            let original = self.neighbors.original_index(i).get();
            self.particles.velocities_mut()[original] = vel;
            self.particles.positions_mut()[original] += vel * dt;
        }
    }

    fn compute_mass(&self, state: &mut SolverState) {
        let mass = self.config.mass;
        for i in 0..self.particles.len() * 3 {
            let dof = self.body_offset + i;
            state.m.append_value(dof, dof, mass);
            state.m.finalize(dof);
        }
    }

    fn compute_inv_mass(&self, state: &mut SolverState) {
        let inv_mass = 1.0 / self.config.mass;
        for i in 0..self.particles.len() * 3 {
            let dof = self.body_offset + i;
            state.m_inv.append_value(dof, dof, inv_mass);
            state.m_inv.finalize(dof);
        }
    }

    fn generate_sparsity(&mut self, state: &mut SolverState) {
        let ctx = self.boundary_ctx();
        self.boundary.build_sparsity(state, &ctx);

        let n = self.particles.len();
        if n == 0 {
            return;
        }
        for body_a in 0..n {
            for k in 0..self.neighbors.neighbor_count(body_a) {
                let body_b = self.neighbors.neighbor(body_a, k);
                state
                    .d_t
                    .append_block3(self.start_density + body_a, self.body_offset + body_b * 3);
            }
            state.d_t.finalize(self.start_density + body_a);
        }
        if self.config.enable_viscosity {
            for body_a in 0..n {
                for axis in 0..3 {
                    let row = self.start_viscous + body_a * 3 + axis;
                    for k in 0..self.neighbors.neighbor_count(body_a) {
                        let body_b = self.neighbors.neighbor(body_a, k);
                        state.d_t.append_block3(row, self.body_offset + body_b * 3);
                    }
                    state.d_t.finalize(row);
                }
            }
        }
    }

    fn build_d(&mut self, state: &mut SolverState) {
        let ctx = self.boundary_ctx();
        self.boundary.build_jacobian(state, &ctx);

        if self.particles.is_empty() {
            return;
        }
        self.density_pass(state);
        self.normalize_density_pass();
        if self.config.enable_viscosity {
            self.viscosity_pass(state);
        }
    }

    fn build_b(&mut self, state: &mut SolverState) {
        let ctx = self.boundary_ctx();
        self.boundary.build_rhs(state, &ctx);

        let rho = self.config.rho;
        let rows = self.start_density..self.start_density + self.particles.len();
        for (b, &dens) in state.b[rows].iter_mut().zip(&self.density) {
            *b = -(dens / rho - 1.0);
        }
    }

    fn build_e(&mut self, state: &mut SolverState) {
        let ctx = self.boundary_ctx();
        self.boundary.build_compliance(state, &ctx);

        let n = self.particles.len();
        if n == 0 {
            return;
        }
        let step_size = state.settings.step_size;
        let zeta = 1.0 / (1.0 + 4.0 * self.config.tau / step_size);
        let f_compliance = 4.0 / (step_size * step_size) * (self.config.epsilon * zeta);

        state.e[self.start_density..self.start_density + n].fill(f_compliance);
        // 粘性为等式约束，无柔度
        if self.config.enable_viscosity {
            state.e[self.start_viscous..self.start_viscous + n * 3].fill(0.0);
        }
    }

    fn project(&mut self, gamma: &mut [f64]) {
        let ctx = self.boundary_ctx();
        self.boundary.project(gamma, &ctx);
        // 密度行不投影：允许张力，由拉伸失稳修正兜底
    }

    fn pre_solve(&mut self, state: &mut SolverState) {
        if self.gamma_old.is_empty() {
            return;
        }
        // 长度不匹配说明粒子数或粘性开关变了，缓存作废
        let expected = self.fluid_multiplier_len();
        if self.gamma_old.len() != expected {
            return;
        }
        let rows = self.start_density..self.start_density + expected;
        for (g, &old) in state.gamma[rows].iter_mut().zip(&self.gamma_old) {
            *g = 0.9 * old;
        }
    }

    fn post_solve(&mut self, state: &mut SolverState) {
        let n = self.particles.len();
        if n > 0 {
            let cached = self.fluid_multiplier_len();
            self.gamma_old.clear();
            self.gamma_old
                .extend_from_slice(&state.gamma[self.start_density..self.start_density + cached]);
        }

        if !self.config.artificial_pressure {
            return;
        }
        let kernels = self.config.kernels();
        let k = self.config.artificial_pressure_k;
        let n_exp = self.config.artificial_pressure_n;
        let w_dq = kernels.poly6(self.config.artificial_pressure_dq);
        let neighbors = &*self.neighbors;

        let correct = |body_a: usize, gamma: &mut f64| {
            let pos_a = neighbors.sorted_position(body_a);
            let mut corr = 0.0;
            for i in 0..neighbors.neighbor_count(body_a) {
                let body_b = neighbors.neighbor(body_a, i);
                if body_a == body_b {
                    continue;
                }
                let dist = pos_a.distance(neighbors.sorted_position(body_b));
                corr += k * (kernels.poly6(dist) / w_dq).powf(n_exp);
            }
            *gamma += corr;
        };

        let gamma = &mut state.gamma[self.start_density..self.start_density + n];
        #[cfg(feature = "parallel")]
        gamma
            .par_iter_mut()
            .enumerate()
            .for_each(|(body_a, g)| correct(body_a, g));
        #[cfg(not(feature = "parallel"))]
        for (body_a, g) in gamma.iter_mut().enumerate() {
            correct(body_a, g);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_particle_container(h: f64, spacing: f64) -> FluidContainer {
        let config = FluidConfig::builder()
            .kernel_radius(h)
            .rho(1000.0)
            .mass(1.0)
            .build()
            .unwrap();
        let mut container = FluidContainer::new(config);
        container
            .add_particles(
                &[DVec3::ZERO, DVec3::new(spacing, 0.0, 0.0)],
                &[],
            )
            .unwrap();
        container.rebuild_neighbors();
        container
    }

    fn run_assembly(container: &mut FluidContainer, layout: DofLayout) -> SolverState {
        let mut state = SolverState::new();
        container.setup(0, &layout);
        state.configure_step(container.num_constraints(), layout.total());
        container.update(&mut state);
        container.generate_sparsity(&mut state);
        state.d_t.finish_rows();
        container.build_d(&mut state);
        container.build_b(&mut state);
        container.build_e(&mut state);
        state
    }

    #[test]
    fn test_constraint_and_nnz_counts() {
        let mut container = two_particle_container(0.1, 0.05);
        assert_eq!(container.num_constraints(), 2);
        container.config.enable_viscosity = true;
        assert_eq!(container.num_constraints(), 2 + 6);
        assert!(container.num_nonzeros() >= 2 * 6);
    }

    #[test]
    fn test_offsets_follow_layout() {
        let mut container = two_particle_container(0.1, 0.05);
        let layout = DofLayout::new(2, 1, 0, 2);
        container.setup(5, &layout);
        assert_eq!(container.boundary_range(), ConstraintRange::new(5, 0));
        assert_eq!(container.density_range(), ConstraintRange::new(5, 2));
        assert_eq!(container.body_offset(), 13);
    }

    #[test]
    fn test_density_row_diagonal_balances_offdiag() {
        let mut container = two_particle_container(0.1, 0.05);
        let layout = DofLayout::new(0, 0, 0, 2);
        let state = run_assembly(&mut container, layout);

        // 行内对角块 = 负的非对角块之和（动量守恒）
        for row in 0..2 {
            for axis in 0..3 {
                let sum = state.d_t.get(row, axis) + state.d_t.get(row, 3 + axis);
                assert!(sum.abs() < 1e-12, "行 {row} 轴 {axis} 不平衡: {sum}");
            }
        }
        // 对称粒子对的两条密度行逐元素相同
        for col in 0..6 {
            let diff = state.d_t.get(0, col) - state.d_t.get(1, col);
            assert!(diff.abs() < 1e-12);
        }
        // x 方向梯度非零
        assert!(state.d_t.get(0, 0).abs() > 0.0);
    }

    #[test]
    fn test_normalized_density_of_symmetric_pair() {
        // 两粒子对称排布时 Shepard 归一化密度严格等于 raw/denom 的公共值
        let mut container = two_particle_container(0.1, 0.05);
        let layout = DofLayout::new(0, 0, 0, 2);
        let _ = run_assembly(&mut container, layout);
        let density = container.fluid_density();
        assert_eq!(density.len(), 2);
        assert!((density[0] - density[1]).abs() < 1e-9);
        assert!(density[0] > 0.0);
    }

    #[test]
    fn test_rhs_sign_for_overdense_fluid() {
        // 间距远小于核半径 → 密度超过静息密度 → b < 0
        let mut container = two_particle_container(0.05, 0.01);
        let layout = DofLayout::new(0, 0, 0, 2);
        let state = run_assembly(&mut container, layout);
        let dens = container.fluid_density()[0];
        assert!(dens > 1000.0);
        assert!(state.b[0] < 0.0);
        assert!((state.b[0] + (dens / 1000.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_compliance_formula() {
        let mut container = two_particle_container(0.1, 0.05);
        let layout = DofLayout::new(0, 0, 0, 2);
        let state = run_assembly(&mut container, layout);
        let dt = state.settings.step_size;
        let zeta = 1.0 / (1.0 + 4.0 * container.config.tau / dt);
        let expected = 4.0 / (dt * dt) * container.config.epsilon * zeta;
        assert!((state.e[0] - expected).abs() < 1e-12);
        assert_eq!(state.e[0], state.e[1]);
    }

    #[test]
    fn test_gravity_load() {
        let mut container = two_particle_container(0.1, 0.05);
        let layout = DofLayout::new(0, 0, 0, 2);
        let state = run_assembly(&mut container, layout);
        let dt = state.settings.step_size;
        assert!((state.hf[2] - dt * 1.0 * -9.81).abs() < 1e-12);
        assert_eq!(state.hf[0], 0.0);
    }

    #[test]
    fn test_warm_start_length_gate() {
        let mut container = two_particle_container(0.1, 0.05);
        let layout = DofLayout::new(0, 0, 0, 2);
        let mut state = run_assembly(&mut container, layout);

        state.gamma[0] = 2.0;
        state.gamma[1] = 4.0;
        container.post_solve(&mut state);
        assert_eq!(container.gamma_old, vec![2.0, 4.0]);

        // 下一步长度一致 → 0.9 倍种子
        let mut state2 = SolverState::new();
        state2.configure_step(2, 6);
        container.pre_solve(&mut state2);
        assert!((state2.gamma[0] - 1.8).abs() < 1e-12);
        assert!((state2.gamma[1] - 3.6).abs() < 1e-12);

        // 粒子数变化 → 缓存作废
        container
            .add_particles(&[DVec3::new(0.5, 0.0, 0.0)], &[])
            .unwrap();
        container.rebuild_neighbors();
        container.setup(0, &DofLayout::new(0, 0, 0, 3));
        let mut state3 = SolverState::new();
        state3.configure_step(3, 9);
        container.pre_solve(&mut state3);
        assert_eq!(state3.gamma, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_artificial_pressure_added_after_caching() {
        let mut container = two_particle_container(0.1, 0.05);
        container.config.artificial_pressure = true;
        let layout = DofLayout::new(0, 0, 0, 2);
        let mut state = run_assembly(&mut container, layout);

        state.gamma[0] = 1.0;
        container.post_solve(&mut state);
        // 缓存的是修正前的乘子
        assert_eq!(container.gamma_old[0], 1.0);
        // 修正后的乘子变大（近距离对产生正修正）
        assert!(state.gamma[0] > 1.0);
        assert!(state.gamma[1] > 0.0);
    }

    #[test]
    fn test_update_position_clamps_velocity() {
        let config = FluidConfig::builder()
            .kernel_radius(0.1)
            .max_velocity(2.0)
            .build()
            .unwrap();
        let mut container = FluidContainer::new(config);
        container.add_particles(&[DVec3::ZERO], &[]).unwrap();
        container.rebuild_neighbors();

        let layout = DofLayout::new(0, 0, 0, 1);
        container.setup(0, &layout);
        let mut state = SolverState::new();
        state.configure_step(1, 3);
        state.v[0] = 10.0;
        container.update_position(&state);

        assert!((container.particles().velocity(0).x - 2.0).abs() < 1e-12);
        let expected_dx = 2.0 * state.settings.step_size;
        assert!((container.particles().position(0).x - expected_dx).abs() < 1e-12);
    }

    #[test]
    fn test_empty_container_assembles_nothing() {
        let config = FluidConfig::default();
        let mut container = FluidContainer::new(config);
        let layout = DofLayout::new(0, 0, 0, 0);
        let state = run_assembly(&mut container, layout);
        assert_eq!(state.n_constraints(), 0);
        assert!(container.fluid_force(&state).is_empty());
        assert_eq!(
            container.body_contact_force(BodyIndex::new(0)),
            DVec3::ZERO
        );
    }

    #[test]
    fn test_mass_matrices() {
        let mut container = two_particle_container(0.1, 0.05);
        let layout = DofLayout::new(0, 0, 0, 2);
        container.setup(0, &layout);
        let mut state = SolverState::new();
        state.configure_step(2, 6);
        container.compute_mass(&mut state);
        container.compute_inv_mass(&mut state);
        state.m.finish_rows();
        state.m_inv.finish_rows();
        assert_eq!(state.m.get(4, 4), 1.0);
        assert_eq!(state.m_inv.get(4, 4), 1.0);
        assert_eq!(state.m.get(4, 3), 0.0);
    }
}
