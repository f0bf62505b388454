// crates/hb_fluid/src/config.rs

//! 流体参数配置
//!
//! 所有粒子共享同一套材料/数值参数。通过 [`FluidConfigBuilder`]
//! 构建并在 `build` 时校验；直接修改字段后可用
//! [`FluidConfig::validate`] 重新校验。
//!
//! # 参数
//!
//! | 字段 | 含义 | 默认 |
//! |------|------|------|
//! | `kernel_radius` | SPH 核半径 h [m] | 0.04 |
//! | `epsilon` | 密度约束柔度 ε | 1e-3 |
//! | `tau` | 松弛时间常数 τ [s] | 4e-3 |
//! | `rho` | 静息密度 ρ₀ [kg/m³] | 1000 |
//! | `mass` | 单粒子质量 [kg] | 1 |
//! | `viscosity` | 运动粘度 | 0 |
//! | `enable_viscosity` | 是否生成粘性约束行 | false |
//! | `artificial_pressure` | 是否启用拉伸失稳修正 | false |
//! | `artificial_pressure_k` | 修正强度 k | 0.01 |
//! | `artificial_pressure_dq` | 参考距离 Δq [m] | 0.2·h |
//! | `artificial_pressure_n` | 修正指数 n | 4 |
//! | `contact_mu` | 刚体-流体接触摩擦系数 | 0 |
//! | `max_velocity` | 粒子速度上限 [m/s] | 1e3 |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernels::KernelSet;

/// 配置校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FluidConfigError {
    /// 参数必须为正
    #[error("参数 {field} 必须为正, 实际为 {value}")]
    NotPositive {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
    },

    /// 参数不能为负
    #[error("参数 {field} 不能为负, 实际为 {value}")]
    Negative {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
    },

    /// 拉伸修正参考距离不在核支持域内
    #[error("artificial_pressure_dq ({dq}) 不在核支持域内 (h = {h})")]
    DqOutOfSupport {
        /// 参考距离
        dq: f64,
        /// 核半径
        h: f64,
    },
}

/// 流体共享参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FluidConfig {
    /// SPH 核半径 h [m]
    pub kernel_radius: f64,
    /// 密度约束柔度 ε
    pub epsilon: f64,
    /// 松弛时间常数 τ [s]
    pub tau: f64,
    /// 静息密度 ρ₀ [kg/m³]
    pub rho: f64,
    /// 单粒子质量 [kg]
    pub mass: f64,
    /// 运动粘度
    pub viscosity: f64,
    /// 是否生成粘性约束行
    pub enable_viscosity: bool,
    /// 是否启用拉伸失稳修正
    pub artificial_pressure: bool,
    /// 拉伸修正强度 k
    pub artificial_pressure_k: f64,
    /// 拉伸修正参考距离 Δq [m]
    pub artificial_pressure_dq: f64,
    /// 拉伸修正指数 n
    pub artificial_pressure_n: f64,
    /// 刚体-流体接触摩擦系数（0 = 仅法向）
    pub contact_mu: f64,
    /// 粒子速度上限 [m/s]
    pub max_velocity: f64,
}

impl Default for FluidConfig {
    fn default() -> Self {
        let kernel_radius = 0.04;
        Self {
            kernel_radius,
            epsilon: 1e-3,
            tau: 4.0 * 1e-3,
            rho: 1000.0,
            mass: 1.0,
            viscosity: 0.0,
            enable_viscosity: false,
            artificial_pressure: false,
            artificial_pressure_k: 0.01,
            artificial_pressure_dq: 0.2 * kernel_radius,
            artificial_pressure_n: 4.0,
            contact_mu: 0.0,
            max_velocity: 1e3,
        }
    }
}

impl FluidConfig {
    /// 创建构建器
    pub fn builder() -> FluidConfigBuilder {
        FluidConfigBuilder::default()
    }

    /// 按当前核半径构造核集合
    #[inline]
    pub fn kernels(&self) -> KernelSet {
        KernelSet::new(self.kernel_radius)
    }

    /// 校验参数
    pub fn validate(&self) -> Result<(), FluidConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), FluidConfigError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(FluidConfigError::NotPositive { field, value })
            }
        }
        fn non_negative(field: &'static str, value: f64) -> Result<(), FluidConfigError> {
            if value >= 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(FluidConfigError::Negative { field, value })
            }
        }

        positive("kernel_radius", self.kernel_radius)?;
        positive("rho", self.rho)?;
        positive("mass", self.mass)?;
        positive("max_velocity", self.max_velocity)?;
        non_negative("epsilon", self.epsilon)?;
        non_negative("tau", self.tau)?;
        non_negative("viscosity", self.viscosity)?;
        non_negative("contact_mu", self.contact_mu)?;
        non_negative("artificial_pressure_k", self.artificial_pressure_k)?;
        non_negative("artificial_pressure_n", self.artificial_pressure_n)?;
        non_negative("artificial_pressure_dq", self.artificial_pressure_dq)?;
        // dq = h 处核值为零，拉伸修正会除零
        if self.artificial_pressure_dq >= self.kernel_radius {
            return Err(FluidConfigError::DqOutOfSupport {
                dq: self.artificial_pressure_dq,
                h: self.kernel_radius,
            });
        }
        Ok(())
    }
}

// ============================================================
// 构建器
// ============================================================

/// [`FluidConfig`] 构建器
///
/// `artificial_pressure_dq` 未显式设置时在 `build` 时按 `0.2·h` 推导，
/// 跟随最终的核半径。
#[derive(Debug, Clone, Default)]
pub struct FluidConfigBuilder {
    config: FluidConfig,
    dq_override: Option<f64>,
}

impl FluidConfigBuilder {
    /// 核半径 h
    pub fn kernel_radius(mut self, h: f64) -> Self {
        self.config.kernel_radius = h;
        self
    }

    /// 柔度 ε
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// 松弛时间常数 τ
    pub fn tau(mut self, tau: f64) -> Self {
        self.config.tau = tau;
        self
    }

    /// 静息密度 ρ₀
    pub fn rho(mut self, rho: f64) -> Self {
        self.config.rho = rho;
        self
    }

    /// 单粒子质量
    pub fn mass(mut self, mass: f64) -> Self {
        self.config.mass = mass;
        self
    }

    /// 运动粘度（同时开启粘性约束行）
    pub fn viscosity(mut self, viscosity: f64) -> Self {
        self.config.viscosity = viscosity;
        self.config.enable_viscosity = viscosity > 0.0;
        self
    }

    /// 拉伸失稳修正（strength = k）
    pub fn artificial_pressure(mut self, k: f64) -> Self {
        self.config.artificial_pressure = true;
        self.config.artificial_pressure_k = k;
        self
    }

    /// 拉伸修正参考距离 Δq（默认 0.2·h）
    pub fn artificial_pressure_dq(mut self, dq: f64) -> Self {
        self.dq_override = Some(dq);
        self
    }

    /// 拉伸修正指数 n
    pub fn artificial_pressure_n(mut self, n: f64) -> Self {
        self.config.artificial_pressure_n = n;
        self
    }

    /// 刚体-流体接触摩擦系数
    pub fn contact_mu(mut self, mu: f64) -> Self {
        self.config.contact_mu = mu;
        self
    }

    /// 粒子速度上限
    pub fn max_velocity(mut self, v: f64) -> Self {
        self.config.max_velocity = v;
        self
    }

    /// 校验并产出配置
    pub fn build(mut self) -> Result<FluidConfig, FluidConfigError> {
        self.config.artificial_pressure_dq = self
            .dq_override
            .unwrap_or(0.2 * self.config.kernel_radius);
        self.config.validate()?;
        Ok(self.config)
    }
}
