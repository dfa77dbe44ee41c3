#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将 OCTA-500 视网膜数据集 (BMP 切片栈 + MATLAB 真值标注)
//! 转换为 MONAI Label 服务可直接使用的 nifti 体数据,
//! 并提供 MONAI Label 视网膜分层分割任务的配置解析.
//!
//! # 注意
//!
//! 1. 该 crate 目前只适配 OCTA-500 的目录组织方式
//!   (但如果新数据按照相同模式进行组织, 也可以工作).
//! 2. 所有文件读取失败都以 `Err` 返回, 由调用者决定是否中止整个批处理.
//!
//! # 开发计划
//!
//! ### 分层边界表到三维标签体的重建 ✅
//!
//! 每一列 (x, y) 给出 6 个累积的深度边界, 据此为该列每个深度体素分配层编号 0..=5.
//! 构造边界表时校验单调性与取值范围.
//!
//! 实现位于 `octa-berry/src/data/layers.rs`.
//!
//! ### BMP 切片栈加载 ✅
//!
//! 文件名按 "自然序" 排序 (`2.bmp < 10.bmp`), 可选反转深度方向.
//!
//! 实现位于 `octa-berry/src/data/stack.rs`.
//!
//! ### MAT 真值文件读取 ✅
//!
//! level-5 文件由 `matfile` 解析; v7.3 (HDF5) 文件需要打开 `hdf5` feature.
//!
//! 实现位于 `octa-berry/src/data/mat.rs`.
//!
//! ### 带体素间距的 nifti 存取 ✅
//!
//! 视场 3mm * 3mm * 2mm, 体素网格 304 * 304 * 640. 参数集中在 [`VolumeGeometry`].
//!
//! ### 批量导出, 断点续跑 ✅
//!
//! 以 `label_3D_Layers.nii.gz` 是否存在判断受试者是否已完成.
//!
//! 实现位于 `octa-berry/src/export`.
//!
//! ### MONAI Label 分割任务配置 ✅
//!
//! 标签覆盖, 预训练权重的下载/丢弃, epistemic 主动学习策略与打分方法.
//!
//! 实现位于 `octa-berry/src/monai`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 三维体数据基础结构.
mod data;

pub use data::{
    layers, mat, stack, NiftiHeaderAttr, OctaLabel, OctaScan, VolumeGeometry,
};

pub mod consts;

pub mod dataset;

mod error;

pub use error::{Error, Result};

pub mod export;

pub mod monai;

pub mod prelude;
