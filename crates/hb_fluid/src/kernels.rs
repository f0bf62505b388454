// crates/hb_fluid/src/kernels.rs

//! SPH 光滑核
//!
//! 密度估计使用 poly6 核，约束雅可比的梯度项使用 spiky 核梯度。
//! 归一化常数只依赖核半径 `h`，构造时一次算好。
//!
//! # 核函数
//!
//! - poly6:  `W(d) = 315/(64π h⁹) · (h² − d²)³`，`d < h`
//! - spiky 梯度系数: `∇W(d) = −45/(π h⁶) · (h − d)²/d · x_ij`
//!
//! 梯度系数在 `d → 0` 处奇异；调用处以返回 0 作为零距保护
//! （重合粒子对彼此没有确定的排斥方向）。

/// 零距保护阈值
const MIN_SEPARATION: f64 = 1e-12;

/// 某一核半径下的 SPH 核集合
#[derive(Debug, Clone, Copy)]
pub struct KernelSet {
    h: f64,
    h2: f64,
    /// poly6 归一化常数 315/(64π h⁹)
    cpoly6: f64,
    /// spiky 梯度归一化常数 −45/(π h⁶)
    gspiky: f64,
}

impl KernelSet {
    /// 按核半径构造
    ///
    /// # Panics
    /// - `h <= 0`
    pub fn new(h: f64) -> Self {
        assert!(h > 0.0, "核半径必须为正");
        let h3 = h * h * h;
        let h6 = h3 * h3;
        let h9 = h6 * h3;
        Self {
            h,
            h2: h * h,
            cpoly6: 315.0 / (64.0 * std::f64::consts::PI * h9),
            gspiky: -45.0 / (std::f64::consts::PI * h6),
        }
    }

    /// 核半径
    #[inline]
    pub fn radius(&self) -> f64 {
        self.h
    }

    /// poly6 核值
    #[inline]
    pub fn poly6(&self, dist: f64) -> f64 {
        if dist >= self.h {
            return 0.0;
        }
        let diff = self.h2 - dist * dist;
        self.cpoly6 * diff * diff * diff
    }

    /// 零距处的 poly6 核值（粒子自贡献项）
    #[inline]
    pub fn poly6_zero(&self) -> f64 {
        self.cpoly6 * self.h2 * self.h2 * self.h2
    }

    /// spiky 核梯度系数：`∇W = grad_spiky_coeff(d) · x_ij`
    ///
    /// 支持域外与零距时返回 0。
    #[inline]
    pub fn grad_spiky_coeff(&self, dist: f64) -> f64 {
        if dist >= self.h || dist < MIN_SEPARATION {
            return 0.0;
        }
        let diff = self.h - dist;
        self.gspiky * diff * diff / dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly6_zero_matches_limit() {
        let k = KernelSet::new(0.1);
        assert!((k.poly6(0.0) - k.poly6_zero()).abs() < 1e-12);
    }

    #[test]
    fn test_poly6_compact_support() {
        let k = KernelSet::new(0.1);
        assert_eq!(k.poly6(0.1), 0.0);
        assert_eq!(k.poly6(0.2), 0.0);
        assert!(k.poly6(0.05) > 0.0);
    }

    #[test]
    fn test_poly6_monotone_decreasing() {
        let k = KernelSet::new(0.1);
        assert!(k.poly6(0.02) > k.poly6(0.05));
        assert!(k.poly6(0.05) > k.poly6(0.09));
    }

    #[test]
    fn test_grad_spiky_zero_distance_guard() {
        let k = KernelSet::new(0.1);
        assert_eq!(k.grad_spiky_coeff(0.0), 0.0);
        assert_eq!(k.grad_spiky_coeff(0.1), 0.0);
        // 支持域内为负（核随距离递减）
        assert!(k.grad_spiky_coeff(0.05) < 0.0);
    }

    #[test]
    fn test_normalization_constant() {
        // 315/(64π h⁹)，h = 1 时约 1.5666
        let k = KernelSet::new(1.0);
        assert!((k.poly6_zero() - 1.566_681).abs() < 1e-5);
    }
}
