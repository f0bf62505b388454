// crates/hb_core/src/jacobian.rs

//! 行终结式稀疏约束矩阵（`D_T`，约束行 × 速度未知量列）
//!
//! 基于 CSR 格式，但构建遵循两阶段协议：
//!
//! 1. **拓扑阶段** (`append` / `append_block3` / `finalize`)：
//!    逐行声明结构非零元的列位置。行必须按升序终结，终结时
//!    对列排序并冻结；被跳过的行自动填充为空行。
//! 2. **数值阶段** (`set` / `set_block3` / `add`)：
//!    向已声明的位置写入数值（行内二分查找）。写入未声明的位置
//!    是编程错误。
//!
//! 邻居拓扑每步都在变化，因此矩阵每步通过 [`ConstraintMatrix::reset`]
//! 作废重建——上一步的行结构一律无效。
//!
//! # 并行写入
//!
//! [`ConstraintMatrix::row_blocks_mut`] 将一段行区间拆分为互不相交的
//! 可变行切片，使数值阶段可以在 rayon 下按"每行单写者"安全并行。
//!
//! # 特性开关
//!
//! - `parallel`: 启用基于 `rayon` 的并行矩阵-向量乘法

use glam::DVec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================
// 矩阵主体
// ============================================================

/// 行终结式 CSR 约束矩阵
///
/// `row_ptr` 随行终结逐步增长；全部行终结后长度为 `n_rows + 1`。
#[derive(Debug, Clone, Default)]
pub struct ConstraintMatrix {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    /// 当前暂存行的 (列, 初值) 对；终结时排序冻结
    staged: Vec<(usize, f64)>,
    /// 当前暂存行号
    staged_row: Option<usize>,
    /// 下一个待终结的行
    next_row: usize,
}

impl ConstraintMatrix {
    /// 创建空矩阵（0 × 0）
    pub fn new() -> Self {
        Self {
            row_ptr: vec![0],
            ..Default::default()
        }
    }

    /// 作废全部结构并按新维度重建
    ///
    /// 每个时间步开始时调用：上一步的稀疏结构因邻居拓扑变化而失效。
    pub fn reset(&mut self, n_rows: usize, n_cols: usize) {
        self.n_rows = n_rows;
        self.n_cols = n_cols;
        self.row_ptr.clear();
        self.row_ptr.push(0);
        self.col_idx.clear();
        self.values.clear();
        self.staged.clear();
        self.staged_row = None;
        self.next_row = 0;
    }

    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 当前非零元数量（仅统计已终结的行）
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 是否所有行都已终结
    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.next_row == self.n_rows && self.staged_row.is_none()
    }

    // ========== 拓扑阶段 ==========

    /// 声明 (row, col) 处的结构非零元，初值为 0
    ///
    /// # Panics
    /// - `row` 已终结，或与当前暂存行不一致
    /// - `col >= n_cols`
    #[inline]
    pub fn append(&mut self, row: usize, col: usize) {
        self.append_value(row, col, 0.0);
    }

    /// 声明 (row, col) 处的结构非零元并附带初值
    ///
    /// 质量矩阵等一次成型的结构用此方法在拓扑阶段直接写值。
    pub fn append_value(&mut self, row: usize, col: usize, value: f64) {
        assert!(row >= self.next_row, "第{row}行已终结，不能再声明非零元");
        assert!(col < self.n_cols, "列索引越界: {col} >= {}", self.n_cols);
        match self.staged_row {
            None => self.staged_row = Some(row),
            Some(r) => assert_eq!(r, row, "存在未终结的暂存行{r}，不能声明第{row}行"),
        }
        self.staged.push((col, value));
    }

    /// 声明从 `col0` 起连续三列的结构非零元（一个 3-DOF 块）
    #[inline]
    pub fn append_block3(&mut self, row: usize, col0: usize) {
        self.append(row, col0);
        self.append(row, col0 + 1);
        self.append(row, col0 + 2);
    }

    /// 终结第 `row` 行：排序、去重、冻结
    ///
    /// `next_row..row` 之间被跳过的行填充为空行（本步不拥有任何
    /// 非零元的容器同样满足升序终结协议）。
    ///
    /// # Panics
    /// - `row < next_row`（重复终结）
    /// - 暂存行与 `row` 不一致
    pub fn finalize(&mut self, row: usize) {
        assert!(row >= self.next_row, "第{row}行已终结，不能重复终结");
        assert!(row < self.n_rows, "行索引越界: {row} >= {}", self.n_rows);
        if let Some(r) = self.staged_row {
            assert_eq!(r, row, "暂存行{r}与终结行{row}不一致");
        }

        // 跳过的行为空行
        for _ in self.next_row..row {
            self.row_ptr.push(self.col_idx.len());
        }

        self.staged.sort_unstable_by_key(|&(col, _)| col);
        self.staged.dedup_by_key(|&mut (col, _)| col);
        for &(col, value) in &self.staged {
            self.col_idx.push(col);
            self.values.push(value);
        }
        self.row_ptr.push(self.col_idx.len());

        self.staged.clear();
        self.staged_row = None;
        self.next_row = row + 1;
    }

    /// 将剩余未终结的行全部填充为空行
    ///
    /// 由持有引擎在所有容器的拓扑阶段结束后调用。
    pub fn finish_rows(&mut self) {
        assert!(self.staged_row.is_none(), "存在未终结的暂存行");
        for _ in self.next_row..self.n_rows {
            self.row_ptr.push(self.col_idx.len());
        }
        self.next_row = self.n_rows;
    }

    // ========== 数值阶段 ==========

    /// 在行内查找列位置对应的存储下标
    #[inline]
    fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_idx[start..end]
            .binary_search(&col)
            .ok()
            .map(|k| start + k)
    }

    /// 写入已声明位置的数值
    ///
    /// # 返回
    /// - `true`: 写入成功
    /// - `false`: 位置未声明（未修改）
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> bool {
        if let Some(idx) = self.find_index(row, col) {
            self.values[idx] = value;
            true
        } else {
            false
        }
    }

    /// 累加到已声明位置
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> bool {
        if let Some(idx) = self.find_index(row, col) {
            self.values[idx] += value;
            true
        } else {
            false
        }
    }

    /// 向 `col0` 起连续三列写入一个向量
    ///
    /// 三列必须已在拓扑阶段以 [`append_block3`](Self::append_block3) 声明。
    #[inline]
    pub fn set_block3(&mut self, row: usize, col0: usize, v: DVec3) -> bool {
        if let Some(idx) = self.find_index(row, col0) {
            debug_assert_eq!(self.col_idx[idx + 1], col0 + 1, "3-DOF 块声明不连续");
            debug_assert_eq!(self.col_idx[idx + 2], col0 + 2, "3-DOF 块声明不连续");
            self.values[idx] = v.x;
            self.values[idx + 1] = v.y;
            self.values[idx + 2] = v.z;
            true
        } else {
            false
        }
    }

    /// 获取 (row, col) 位置的值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 获取第 `row` 行的非零元视图
    #[inline]
    pub fn row(&self, row: usize) -> RowView<'_> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        RowView {
            col_idx: &self.col_idx[start..end],
            values: &self.values[start..end],
        }
    }

    /// 获取第 `row` 行的非零元数量
    #[inline]
    pub fn row_nnz(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// 将数值清零（保持稀疏结构不变）
    pub fn clear_values(&mut self) {
        self.values.fill(0.0);
    }

    // ========== 读取/抽取 ==========

    /// 矩阵-向量乘法 y = D_T * x
    ///
    /// # Panics
    /// - 矩阵未完全终结
    /// - `x.len() != n_cols` 或 `y.len() != n_rows`
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert!(self.is_finalized(), "矩阵未完全终结");
        assert_eq!(x.len(), self.n_cols, "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows, "y 长度必须等于矩阵行数");

        for row in 0..self.n_rows {
            let start = self.row_ptr[row];
            let end = self.row_ptr[row + 1];
            let mut sum = 0.0;
            for idx in start..end {
                sum += self.values[idx] * x[self.col_idx[idx]];
            }
            y[row] = sum;
        }
    }

    /// 并行矩阵-向量乘法（需启用 `parallel` 特性）
    #[cfg(feature = "parallel")]
    pub fn mul_vec_parallel(&self, x: &[f64], y: &mut [f64]) {
        assert!(self.is_finalized(), "矩阵未完全终结");
        assert_eq!(x.len(), self.n_cols, "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows, "y 长度必须等于矩阵行数");

        y.par_iter_mut().enumerate().for_each(|(row, out)| {
            let start = self.row_ptr[row];
            let end = self.row_ptr[row + 1];
            let mut sum = 0.0;
            for idx in start..end {
                sum += self.values[idx] * x[self.col_idx[idx]];
            }
            *out = sum;
        });
    }

    /// 转置乘法的行区间限定版: out[col] += D_T[row, col] * gamma[row]
    ///
    /// 即 `D · gamma` 限定在一段约束行上——这是从求解后的乘子
    /// 抽取广义力的基本原语（力 = 该结果 / 步长）。
    ///
    /// # 参数
    /// - `row_start` / `row_count`: 参与散射的约束行区间
    /// - `gamma`: 全局乘子向量（按行索引）
    /// - `out`: 长度为 `n_cols` 的输出累加缓冲区
    pub fn apply_transpose_range(
        &self,
        row_start: usize,
        row_count: usize,
        gamma: &[f64],
        out: &mut [f64],
    ) {
        assert!(self.is_finalized(), "矩阵未完全终结");
        assert!(row_start + row_count <= self.n_rows, "行区间越界");
        assert_eq!(out.len(), self.n_cols, "out 长度必须等于矩阵列数");

        for row in row_start..row_start + row_count {
            let g = gamma[row];
            let start = self.row_ptr[row];
            let end = self.row_ptr[row + 1];
            for idx in start..end {
                out[self.col_idx[idx]] += self.values[idx] * g;
            }
        }
    }

    /// 将一段行区间拆分为互不相交的可变行切片
    ///
    /// 区间内的行必须已终结。返回的每个 [`RowBlockMut`] 独占该行的
    /// 数值存储，可在 rayon 下按行并行写入。
    pub fn row_blocks_mut(&mut self, row_start: usize, row_count: usize) -> Vec<RowBlockMut<'_>> {
        assert!(
            row_start + row_count < self.row_ptr.len(),
            "行区间内存在未终结的行"
        );
        let lo = self.row_ptr[row_start];
        let hi = self.row_ptr[row_start + row_count];

        let mut values = &mut self.values[lo..hi];
        let mut cols = &self.col_idx[lo..hi];
        let mut blocks = Vec::with_capacity(row_count);
        for row in row_start..row_start + row_count {
            let len = self.row_ptr[row + 1] - self.row_ptr[row];
            let (v_head, v_tail) = values.split_at_mut(len);
            let (c_head, c_tail) = cols.split_at(len);
            values = v_tail;
            cols = c_tail;
            blocks.push(RowBlockMut {
                row,
                col_idx: c_head,
                values: v_head,
            });
        }
        blocks
    }
}

// ============================================================
// 行视图
// ============================================================

/// 行视图：对某一行非零元的只读访问
pub struct RowView<'a> {
    col_idx: &'a [usize],
    values: &'a [f64],
}

impl<'a> RowView<'a> {
    /// 获取列索引切片
    #[inline]
    pub fn col_indices(&self) -> &'a [usize] {
        self.col_idx
    }

    /// 获取值切片
    #[inline]
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 迭代 (列索引, 值) 对
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.col_idx
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// 可变行切片：数值阶段的"每行单写者"并行原语
pub struct RowBlockMut<'a> {
    row: usize,
    col_idx: &'a [usize],
    values: &'a mut [f64],
}

impl RowBlockMut<'_> {
    /// 行索引
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 写入已声明位置的数值
    #[inline]
    pub fn set(&mut self, col: usize, value: f64) -> bool {
        if let Ok(k) = self.col_idx.binary_search(&col) {
            self.values[k] = value;
            true
        } else {
            false
        }
    }

    /// 向 `col0` 起连续三列写入一个向量
    #[inline]
    pub fn set_block3(&mut self, col0: usize, v: DVec3) -> bool {
        if let Ok(k) = self.col_idx.binary_search(&col0) {
            debug_assert_eq!(self.col_idx[k + 1], col0 + 1, "3-DOF 块声明不连续");
            debug_assert_eq!(self.col_idx[k + 2], col0 + 2, "3-DOF 块声明不连续");
            self.values[k] = v.x;
            self.values[k + 1] = v.y;
            self.values[k + 2] = v.z;
            true
        } else {
            false
        }
    }
}

// ============================================================
// 单元测试
// ============================================================
