// crates/hb_fluid/src/particles.rs

//! 流体粒子存储
//!
//! 位置与速度以并行数组（SoA）存放，下标即粒子的原始索引。
//! 所有粒子共享同一质量与材料参数（见 [`crate::config::FluidConfig`]），
//! 因此这里只存运动学状态。
//!
//! 粒子数组的顺序由外部邻居提供者决定的"排序后索引"另行映射
//! （见 [`crate::neighbors::NeighborProvider::original_index`]）；
//! 本存储始终按原始索引寻址。

use glam::DVec3;
use hb_core::{HbError, HbResult};

/// 粒子运动学状态（原始索引序）
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    pos: Vec<DVec3>,
    vel: Vec<DVec3>,
}

impl ParticleStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 粒子数量
    #[inline]
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// 批量追加粒子
    ///
    /// 速度条目不足时以零速度补齐；多于位置条目则报错。
    pub fn add_particles(&mut self, positions: &[DVec3], velocities: &[DVec3]) -> HbResult<()> {
        if velocities.len() > positions.len() {
            return Err(HbError::SizeMismatch {
                name: "粒子速度数组",
                expected: positions.len(),
                actual: velocities.len(),
            });
        }
        self.pos.extend_from_slice(positions);
        self.vel.extend_from_slice(velocities);
        self.vel.resize(self.pos.len(), DVec3::ZERO);
        Ok(())
    }

    /// 清空全部粒子
    pub fn clear(&mut self) {
        self.pos.clear();
        self.vel.clear();
    }

    /// 位置数组
    #[inline]
    pub fn positions(&self) -> &[DVec3] {
        &self.pos
    }

    /// 速度数组
    #[inline]
    pub fn velocities(&self) -> &[DVec3] {
        &self.vel
    }

    /// 可变位置数组
    #[inline]
    pub fn positions_mut(&mut self) -> &mut [DVec3] {
        &mut self.pos
    }

    /// 可变速度数组
    #[inline]
    pub fn velocities_mut(&mut self) -> &mut [DVec3] {
        &mut self.vel
    }

    /// 第 `i` 个粒子的位置
    #[inline]
    pub fn position(&self, i: usize) -> DVec3 {
        self.pos[i]
    }

    /// 第 `i` 个粒子的速度
    #[inline]
    pub fn velocity(&self, i: usize) -> DVec3 {
        self.vel[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_pads_missing_velocities() {
        let mut store = ParticleStore::new();
        store
            .add_particles(
                &[DVec3::ZERO, DVec3::X, DVec3::Y],
                &[DVec3::new(1.0, 0.0, 0.0)],
            )
            .unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.velocity(0), DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(store.velocity(1), DVec3::ZERO);
        assert_eq!(store.velocity(2), DVec3::ZERO);
    }

    #[test]
    fn test_excess_velocities_rejected() {
        let mut store = ParticleStore::new();
        let err = store.add_particles(&[DVec3::ZERO], &[DVec3::X, DVec3::Y]);
        assert!(err.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_incremental_append() {
        let mut store = ParticleStore::new();
        store.add_particles(&[DVec3::ZERO], &[DVec3::X]).unwrap();
        store.add_particles(&[DVec3::Y], &[]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.position(1), DVec3::Y);
        assert_eq!(store.velocity(1), DVec3::ZERO);
    }
}
