//! 通用常量.

use std::ops::RangeInclusive;

/// 分层标签体中的体素值.
pub mod layer {
    /// 每一列的层 (边界) 个数.
    pub const LAYER_COUNT: usize = 6;

    /// 背景的体素值. 与第 0 层相同.
    pub const BACKGROUND: u8 = 0;

    /// 最顶部一层 (最后一个边界所界定的层) 的体素值.
    pub const TOP_LAYER: u8 = 5;

    /// 体素是否是背景 (第 0 层)?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 体素是否属于最顶部一层?
    #[inline]
    pub const fn is_top_layer(p: u8) -> bool {
        matches!(p, TOP_LAYER)
    }

    /// 体素值是否是合法的层编号?
    #[inline]
    pub const fn is_layer(p: u8) -> bool {
        (p as usize) < LAYER_COUNT
    }

    /// 根据是否把顶层并入背景, 求第 `layer` 层最终写入的体素值.
    #[inline]
    pub const fn label_of(layer: u8, remap_top_layer: bool) -> u8 {
        if remap_top_layer && is_top_layer(layer) {
            BACKGROUND
        } else {
            layer
        }
    }
}

/// OCTA-500 数据集的深度方向 (A-scan) 体素个数.
pub const OCTA500_DEPTH: usize = 640;

/// OCTA-500 3mm 视场子集的受试者编号.
pub const OCTA500_3MM_SUBJECTS: RangeInclusive<u32> = 10301..=10500;

/// OCTA-500 6mm 视场子集的受试者编号.
pub const OCTA500_6MM_SUBJECTS: RangeInclusive<u32> = 10001..=10300;

/// nifti `xyzt_units` 中表示毫米的值.
pub const NIFTI_UNITS_MM: u8 = 2;

/// nifti `sform_code` 中表示扫描仪坐标的值.
pub const NIFTI_XFORM_SCANNER_ANAT: i16 = 1;
