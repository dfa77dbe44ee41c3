//! 分层边界表到三维分层标签体的重建.
//!
//! 边界表为每一列 (x, y) 给出 6 个深度方向的 **闭区间右端点**. 第 0 层从深度 0 开始,
//! 第 `i` 层从第 `i - 1` 层右端点的下一个体素开始. 因此只要边界单调不减,
//! 各层区间天然连续且互不重叠.

use crate::consts::layer::*;
use crate::Idx2d;
use ndarray::{s, Array3, ArrayD, ArrayView1, ArrayView3, ArrayViewMut1, Axis, Ix3};
use std::ops::RangeInclusive;
use thiserror::Error;

/// 构造边界表或重建标签体时的错误.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryError {
    /// 原始边界表不是三维数组.
    #[error("边界表应为三维数组, 实际为 {0} 维")]
    Rank(usize),

    /// 边界表的层维度不是 [`LAYER_COUNT`].
    #[error("边界表应有 {LAYER_COUNT} 层, 实际为 {0}")]
    LayerCount(usize),

    /// 边界超出深度范围 `[0, depth - 1]`.
    #[error("列 {column:?} 第 {layer} 层的边界 {value} 超出深度 {depth}")]
    OutOfRange {
        /// 列坐标 (x, y).
        column: Idx2d,
        /// 层编号.
        layer: usize,
        /// 边界值.
        value: usize,
        /// 深度方向体素个数.
        depth: usize,
    },

    /// 边界比上一层的边界小.
    #[error("列 {column:?} 第 {layer} 层的边界 {value} 小于上一层的边界 {prev}")]
    Decreasing {
        /// 列坐标 (x, y).
        column: Idx2d,
        /// 层编号.
        layer: usize,
        /// 边界值.
        value: usize,
        /// 上一层的边界值.
        prev: usize,
    },

    /// 原始边界值不是非负整数 (例如来自 MAT 文件的 NaN 或小数).
    #[error("边界值 {0} 不是非负整数")]
    NotAnIndex(f64),

    /// 深度体素未被任何层覆盖, 且策略为 [`UncoveredPolicy::Reject`].
    #[error("列 {column:?} 自深度 {z} 起未被任何层覆盖")]
    Uncovered {
        /// 列坐标 (x, y).
        column: Idx2d,
        /// 第一个未覆盖的深度.
        z: usize,
    },
}

/// 最后一层边界小于 `depth - 1` 时, 剩余深度体素的处理方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UncoveredPolicy {
    /// 填充为背景.
    #[default]
    Background,

    /// 视为最后一层的延伸 (仍受顶层并入背景选项的影响).
    ExtendLastBand,

    /// 报错.
    Reject,
}

/// 经过校验的分层边界表, 形状为 (X, Y, 6).
///
/// 对于任意列, 边界值单调不减, 且均在 `[0, depth - 1]` 内.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerBoundaries {
    data: Array3<usize>,
    depth: usize,
}

impl LayerBoundaries {
    /// 由 (X, Y, 6) 组织的边界表创建. `depth` 为深度方向体素个数.
    ///
    /// 若层维度不为 6, 边界越界或不单调, 则返回 `Err`.
    pub fn new(data: Array3<usize>, depth: usize) -> Result<Self, BoundaryError> {
        let (nx, ny, layers) = data.dim();
        if layers != LAYER_COUNT {
            return Err(BoundaryError::LayerCount(layers));
        }
        for x in 0..nx {
            for y in 0..ny {
                check_column((x, y), data.slice(s![x, y, ..]), depth)?;
            }
        }
        Ok(Self { data, depth })
    }

    /// 由 MATLAB 维度顺序 (6, X, Y) 的原始边界表创建.
    ///
    /// OCTA-500 的 `Layer` 变量即按此顺序存储, 且以浮点数保存.
    pub fn from_matlab_order(raw: ArrayD<f64>, depth: usize) -> Result<Self, BoundaryError> {
        let rank = raw.ndim();
        let raw = raw
            .into_dimensionality::<Ix3>()
            .map_err(|_| BoundaryError::Rank(rank))?;
        let (layers, nx, ny) = raw.dim();
        if layers != LAYER_COUNT {
            return Err(BoundaryError::LayerCount(layers));
        }

        // (6, X, Y) -> (X, Y, 6)
        let mut data = Array3::<usize>::zeros((nx, ny, LAYER_COUNT));
        for ((layer, x, y), &v) in raw.indexed_iter() {
            data[(x, y, layer)] = as_index(v)?;
        }
        Self::new(data, depth)
    }

    /// 每一列边界都相同的边界表. 常用于构造体模和测试.
    pub fn uniform(
        (nx, ny): Idx2d,
        ends: [usize; LAYER_COUNT],
        depth: usize,
    ) -> Result<Self, BoundaryError> {
        let data = Array3::from_shape_fn((nx, ny, LAYER_COUNT), |(_, _, i)| ends[i]);
        Self::new(data, depth)
    }

    /// 列平面大小 (X, Y).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let (nx, ny, _) = self.data.dim();
        (nx, ny)
    }

    /// 深度方向体素个数.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 获取列 `(x, y)` 的 6 个边界. 越界时 panic.
    #[inline]
    pub fn ends(&self, (x, y): Idx2d) -> ArrayView1<'_, usize> {
        self.data.slice(s![x, y, ..])
    }

    /// 获取列 `(x, y)` 第 `layer` 层的深度闭区间. 空层返回空区间. 越界时 panic.
    pub fn band(&self, column: Idx2d, layer: usize) -> RangeInclusive<usize> {
        let ends = self.ends(column);
        let start = match layer {
            0 => 0,
            _ => ends[layer - 1] + 1,
        };
        start..=ends[layer]
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, usize> {
        self.data.view()
    }
}

/// 检查一列边界是否越界或不单调.
fn check_column(
    column: Idx2d,
    ends: ArrayView1<'_, usize>,
    depth: usize,
) -> Result<(), BoundaryError> {
    let mut prev = 0;
    for (layer, &value) in ends.iter().enumerate() {
        if value >= depth {
            return Err(BoundaryError::OutOfRange {
                column,
                layer,
                value,
                depth,
            });
        }
        if value < prev {
            return Err(BoundaryError::Decreasing {
                column,
                layer,
                value,
                prev,
            });
        }
        prev = value;
    }
    Ok(())
}

/// 浮点边界值 -> 深度索引.
#[inline]
fn as_index(v: f64) -> Result<usize, BoundaryError> {
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
        Ok(v as usize)
    } else {
        Err(BoundaryError::NotAnIndex(v))
    }
}

/// 填充一列深度体素.
fn fill_column(
    mut column: ArrayViewMut1<'_, u8>,
    ends: ArrayView1<'_, usize>,
    pos: Idx2d,
    remap_top_layer: bool,
    policy: UncoveredPolicy,
) -> Result<(), BoundaryError> {
    let mut start = 0;
    for (layer, &end) in ends.iter().enumerate() {
        // start > end 即空层.
        if start <= end {
            column
                .slice_mut(s![start..=end])
                .fill(label_of(layer as u8, remap_top_layer));
        }
        start = end + 1;
    }
    if start < column.len() {
        let fill_with = match policy {
            UncoveredPolicy::Background => BACKGROUND,
            UncoveredPolicy::ExtendLastBand => label_of(TOP_LAYER, remap_top_layer),
            UncoveredPolicy::Reject => {
                return Err(BoundaryError::Uncovered {
                    column: pos,
                    z: start,
                })
            }
        };
        column.slice_mut(s![start..]).fill(fill_with);
    }
    Ok(())
}

/// 由边界表重建 (X, Y, depth) 的分层标签体.
///
/// 列 `(x, y)` 上深度落在第 `i` 层区间内的体素被赋值为 `i`;
/// `remap_top_layer_to_background` 为 `true` 时第 5 层改为背景 0.
/// 最后一层以下未被覆盖的体素按 [`UncoveredPolicy::Background`] 处理.
pub fn build_label_volume(
    boundaries: &LayerBoundaries,
    remap_top_layer_to_background: bool,
) -> Array3<u8> {
    match build_label_volume_with(
        boundaries,
        remap_top_layer_to_background,
        UncoveredPolicy::Background,
    ) {
        Ok(volume) => volume,
        Err(_) => unreachable!(),
    }
}

/// 与 [`build_label_volume`] 相同, 但显式指定未覆盖体素的处理策略.
///
/// 仅当 `policy` 为 [`UncoveredPolicy::Reject`] 且存在未覆盖体素时返回 `Err`.
pub fn build_label_volume_with(
    boundaries: &LayerBoundaries,
    remap_top_layer_to_background: bool,
    policy: UncoveredPolicy,
) -> Result<Array3<u8>, BoundaryError> {
    let (nx, ny) = boundaries.shape();
    let mut volume = Array3::<u8>::zeros((nx, ny, boundaries.depth()));
    for (x, mut plane) in volume.axis_iter_mut(Axis(0)).enumerate() {
        for (y, column) in plane.axis_iter_mut(Axis(0)).enumerate() {
            fill_column(
                column,
                boundaries.ends((x, y)),
                (x, y),
                remap_top_layer_to_background,
                policy,
            )?;
        }
    }
    Ok(volume)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 借助 `rayon`, 沿 x 方向并行地运行 [`build_label_volume_with`]. 结果与串行版本一致.
#[cfg(feature = "rayon")]
pub fn par_build_label_volume_with(
    boundaries: &LayerBoundaries,
    remap_top_layer_to_background: bool,
    policy: UncoveredPolicy,
) -> Result<Array3<u8>, BoundaryError> {
    let (nx, ny) = boundaries.shape();
    let mut volume = Array3::<u8>::zeros((nx, ny, boundaries.depth()));
    volume
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .try_for_each(|(x, mut plane)| {
            plane
                .axis_iter_mut(Axis(0))
                .enumerate()
                .try_for_each(|(y, column)| {
                    fill_column(
                        column,
                        boundaries.ends((x, y)),
                        (x, y),
                        remap_top_layer_to_background,
                        policy,
                    )
                })
        })?;
    Ok(volume)
}
