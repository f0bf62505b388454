// crates/hb_core/src/dof.rs

//! 全局速度未知量（DOF）布局
//!
//! 全局速度向量按固定顺序排列：刚体 DOF（每刚体 6 个）、
//! 机械轴 DOF、电机 DOF，最后是流体粒子 DOF（每粒子 3 个）。
//!
//! 流体块的起始偏移是上游各块当前数量的纯函数，必须在每步开始时
//! 重新计算——刚体数量可能在步间变化，缓存偏移会产生陈旧偏移错误。

use serde::{Deserialize, Serialize};

/// 全局 DOF 布局（某一步的快照，按值传递）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofLayout {
    /// 刚体数量
    pub num_rigid_bodies: usize,
    /// 机械轴数量
    pub num_shafts: usize,
    /// 电机数量
    pub num_motors: usize,
    /// 流体粒子数量
    pub num_particles: usize,
}

impl DofLayout {
    /// 由上游计数构造本步布局
    pub fn new(
        num_rigid_bodies: usize,
        num_shafts: usize,
        num_motors: usize,
        num_particles: usize,
    ) -> Self {
        Self {
            num_rigid_bodies,
            num_shafts,
            num_motors,
            num_particles,
        }
    }

    /// 流体粒子块的起始列偏移
    #[inline]
    pub fn fluid_offset(&self) -> usize {
        self.num_rigid_bodies * 6 + self.num_shafts + self.num_motors
    }

    /// 全局 DOF 总数
    #[inline]
    pub fn total(&self) -> usize {
        self.fluid_offset() + self.num_particles * 3
    }

    /// 第 `i` 个粒子（排序后索引）的首个 DOF 列
    #[inline]
    pub fn particle_dof(&self, i: usize) -> usize {
        self.fluid_offset() + i * 3
    }

    /// 刚体平动 DOF 块的首列（接触力的力分量所在）
    #[inline]
    pub fn rigid_velocity_dof(&self, body: usize) -> usize {
        body * 6
    }

    /// 刚体转动 DOF 块的首列（接触力的力矩分量所在）
    #[inline]
    pub fn rigid_rotation_dof(&self, body: usize) -> usize {
        body * 6 + 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let layout = DofLayout::new(2, 3, 1, 4);
        assert_eq!(layout.fluid_offset(), 2 * 6 + 3 + 1);
        assert_eq!(layout.total(), 16 + 12);
        assert_eq!(layout.particle_dof(0), 16);
        assert_eq!(layout.particle_dof(3), 25);
        assert_eq!(layout.rigid_velocity_dof(1), 6);
        assert_eq!(layout.rigid_rotation_dof(1), 9);
    }

    #[test]
    fn test_offset_tracks_upstream_counts() {
        // 刚体数量变化时偏移必须跟随变化
        let a = DofLayout::new(1, 0, 0, 2);
        let b = DofLayout::new(3, 0, 0, 2);
        assert_eq!(a.fluid_offset(), 6);
        assert_eq!(b.fluid_offset(), 18);
    }

    #[test]
    fn test_pure_fluid_layout() {
        let layout = DofLayout::new(0, 0, 0, 5);
        assert_eq!(layout.fluid_offset(), 0);
        assert_eq!(layout.total(), 15);
    }
}
