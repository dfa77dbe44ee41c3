//! 运行时错误.

use crate::layers::BoundaryError;
use crate::monai::ConfigError;
use crate::{Idx2d, Idx3d};
use std::path::PathBuf;
use thiserror::Error;

/// 本 crate 的统一错误类型.
#[derive(Debug, Error)]
pub enum Error {
    /// 底层 I/O 错误.
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 读写 nifti 文件错误.
    #[error("nifti 错误: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 解码 bmp 切片错误.
    #[error("图像错误: {0}")]
    Image(#[from] image::ImageError),

    /// 数组形状不满足要求.
    #[error("数组形状错误: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// 切片目录下没有任何 bmp 图像.
    #[error("目录 `{0}` 下没有找到 bmp 图像")]
    EmptyStack(PathBuf),

    /// 受试者的输入文件或目录不存在.
    #[error("输入 `{0}` 不存在")]
    MissingInput(PathBuf),

    /// 体数据某一维超出 nifti-1 header 能表示的范围 (`u16`).
    #[error("体数据形状 {0:?} 超出 nifti header 的维度上限")]
    DimOverflow(Idx3d),

    /// 切片栈中存在与第一张切片大小不同的图像.
    ///
    /// 大小均按 (高, 宽) 给出.
    #[error("切片 `{path}` 大小为 {found:?}, 与第一张切片的 {expected:?} 不符")]
    SliceShapeMismatch {
        /// 出错的切片.
        path: PathBuf,
        /// 第一张切片的大小.
        expected: Idx2d,
        /// 出错切片的大小.
        found: Idx2d,
    },

    /// MAT 文件无法解析.
    #[error("mat 文件 `{path}` 解析失败: {reason}")]
    Mat {
        /// 出错的文件.
        path: PathBuf,
        /// 失败原因.
        reason: String,
    },

    /// MAT 文件中不存在指定变量.
    #[error("mat 文件 `{path}` 中不存在变量 `{name}`")]
    MissingVariable {
        /// 出错的文件.
        path: PathBuf,
        /// 变量名.
        name: String,
    },

    /// MAT 变量的数据无法表示为目标类型.
    #[error("mat 变量 `{name}` 含有无法转换为 {target} 的数据")]
    MatConversion {
        /// 变量名.
        name: String,
        /// 目标类型名.
        target: &'static str,
    },

    /// 分层边界表不合法.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    /// 分割任务配置不合法.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 本 crate 的通用返回类型.
pub type Result<T> = std::result::Result<T, Error>;
