// crates/hb_fluid/src/neighbors.rs

//! 邻居提供者接口与定步长邻居表
//!
//! 邻居搜索本身（空间哈希、排序等）由外部承担；容器只通过
//! [`NeighborProvider`] 消费其结果。提供者工作在"排序后索引"空间
//! （按空间局部性重排的粒子顺序），并负责给出排序后 → 原始索引的
//! 映射以供位置回写。
//!
//! # 约定
//!
//! - 每个粒子的邻居列表**包含自身**；
//! - 列表长度上限为 [`MAX_NEIGHBORS`]，超出的邻居被静默丢弃
//!   （提供者通过 [`NeighborProvider::saturated_count`] 上报丢弃情况）；
//! - 列表内的索引均为排序后索引。
//!
//! [`NeighborTable`] 是自带暴力搜索的参考实现，用于测试与小规模场景，
//! 排序后索引即原始索引（恒等映射）。

use glam::DVec3;
use hb_core::ParticleIndex;

/// 每个粒子的邻居列表长度上限（含自身）
pub const MAX_NEIGHBORS: usize = 64;

/// 邻居查询接口（排序后索引空间）
pub trait NeighborProvider {
    /// 参与搜索的粒子数量
    fn num_particles(&self) -> usize;

    /// 第 `i` 个粒子（排序后索引）的位置
    fn sorted_position(&self, i: usize) -> DVec3;

    /// 第 `i` 个粒子的邻居数量（含自身，已截断至 [`MAX_NEIGHBORS`]）
    fn neighbor_count(&self, i: usize) -> usize;

    /// 第 `i` 个粒子的第 `k` 个邻居（排序后索引）
    fn neighbor(&self, i: usize, k: usize) -> usize;

    /// 排序后索引 → 原始粒子索引（粒子数组的寻址空间）
    fn original_index(&self, i: usize) -> ParticleIndex;

    /// 本次搜索中邻居列表被截断的粒子数
    fn saturated_count(&self) -> usize {
        0
    }
}

// ============================================================
// 暴力搜索参考实现
// ============================================================

/// 定步长展平的邻居表（恒等排序映射）
///
/// 邻居索引按 `MAX_NEIGHBORS` 步长展平存放，`counts[i]` 给出
/// 第 `i` 个列表的有效长度。
#[derive(Debug, Clone, Default)]
pub struct NeighborTable {
    positions: Vec<DVec3>,
    indices: Vec<usize>,
    counts: Vec<usize>,
    saturated: usize,
}

impl NeighborTable {
    /// 暴力 O(n²) 搜索构建邻居表
    ///
    /// 距离严格小于 `radius` 的粒子对互为邻居；每个粒子是自己的邻居
    /// （零距自然满足条件）。超出 [`MAX_NEIGHBORS`] 的邻居被丢弃并计入
    /// 饱和计数。
    pub fn brute_force(positions: &[DVec3], radius: f64) -> Self {
        let n = positions.len();
        let mut indices = vec![0usize; n * MAX_NEIGHBORS];
        let mut counts = vec![0usize; n];
        let mut saturated = 0;

        for i in 0..n {
            let mut count = 0;
            let mut overflow = false;
            for j in 0..n {
                if positions[i].distance(positions[j]) < radius {
                    if count == MAX_NEIGHBORS {
                        overflow = true;
                        break;
                    }
                    indices[i * MAX_NEIGHBORS + count] = j;
                    count += 1;
                }
            }
            counts[i] = count;
            if overflow {
                saturated += 1;
            }
        }

        Self {
            positions: positions.to_vec(),
            indices,
            counts,
            saturated,
        }
    }
}

impl NeighborProvider for NeighborTable {
    #[inline]
    fn num_particles(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    fn sorted_position(&self, i: usize) -> DVec3 {
        self.positions[i]
    }

    #[inline]
    fn neighbor_count(&self, i: usize) -> usize {
        self.counts[i]
    }

    #[inline]
    fn neighbor(&self, i: usize, k: usize) -> usize {
        self.indices[i * MAX_NEIGHBORS + k]
    }

    #[inline]
    fn original_index(&self, i: usize) -> ParticleIndex {
        ParticleIndex::new(i)
    }

    #[inline]
    fn saturated_count(&self) -> usize {
        self.saturated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_is_neighbor() {
        let table = NeighborTable::brute_force(&[DVec3::ZERO], 0.1);
        assert_eq!(table.neighbor_count(0), 1);
        assert_eq!(table.neighbor(0, 0), 0);
    }

    #[test]
    fn test_pair_within_radius() {
        let pos = [DVec3::ZERO, DVec3::new(0.05, 0.0, 0.0), DVec3::new(1.0, 0.0, 0.0)];
        let table = NeighborTable::brute_force(&pos, 0.1);
        // 粒子 0 与 1 互为邻居，2 孤立
        assert_eq!(table.neighbor_count(0), 2);
        assert_eq!(table.neighbor_count(1), 2);
        assert_eq!(table.neighbor_count(2), 1);
        assert_eq!(table.saturated_count(), 0);
    }

    #[test]
    fn test_boundary_distance_excluded() {
        // 距离恰好等于半径不算邻居（严格小于）
        let pos = [DVec3::ZERO, DVec3::new(0.1, 0.0, 0.0)];
        let table = NeighborTable::brute_force(&pos, 0.1);
        assert_eq!(table.neighbor_count(0), 1);
    }

    #[test]
    fn test_identity_original_mapping() {
        let table = NeighborTable::brute_force(&[DVec3::ZERO, DVec3::X], 0.1);
        assert_eq!(table.original_index(0), ParticleIndex::new(0));
        assert_eq!(table.original_index(1), ParticleIndex::new(1));
    }

    #[test]
    fn test_saturation_reported() {
        // 重合粒子超过列表容量
        let pos = vec![DVec3::ZERO; MAX_NEIGHBORS + 8];
        let table = NeighborTable::brute_force(&pos, 0.1);
        assert_eq!(table.neighbor_count(0), MAX_NEIGHBORS);
        assert_eq!(table.saturated_count(), MAX_NEIGHBORS + 8);
    }
}
