use crate::consts::{NIFTI_UNITS_MM, NIFTI_XFORM_SCANNER_ANAT, OCTA500_DEPTH};
use crate::{Error, Idx3d, Result};
use nifti::NiftiHeader;

/// 体数据的物理几何参数: 体素网格大小和对应的物理视场.
///
/// 两者均按 nifti 索引顺序 (x, y, z) 给出, 其中 z 为深度 (A-scan) 方向.
/// 体素间距由 `fov_mm / shape` 求得.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeGeometry {
    /// 体素个数.
    pub shape: Idx3d,

    /// 视场大小, 以毫米为单位.
    pub fov_mm: [f64; 3],
}

impl VolumeGeometry {
    /// OCTA-500 3mm 视场: 3mm * 3mm * 2mm, 304 * 304 * 640 体素.
    pub const OCTA_3MM: Self = Self {
        shape: (304, 304, OCTA500_DEPTH),
        fov_mm: [3.0, 3.0, 2.0],
    };

    /// OCTA-500 6mm 视场: 6mm * 6mm * 2mm, 400 * 400 * 640 体素.
    pub const OCTA_6MM: Self = Self {
        shape: (400, 400, OCTA500_DEPTH),
        fov_mm: [6.0, 6.0, 2.0],
    };

    /// 直接构造.
    #[inline]
    pub const fn new(shape: Idx3d, fov_mm: [f64; 3]) -> Self {
        Self { shape, fov_mm }
    }

    /// 深度方向体素个数.
    #[inline]
    pub fn depth(&self) -> usize {
        self.shape.2
    }

    /// 单个体素的物理尺寸 (x, y, z), 以毫米为单位.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        let (x, y, z) = self.shape;
        let [fx, fy, fz] = self.fov_mm;
        [fx / x as f64, fy / y as f64, fz / z as f64]
    }

    /// 生成携带本几何参数的 nifti header, 数据形状为 `shape`.
    ///
    /// `pixdim` 和 `sform` 都写入体素间距, 单位为毫米. 数据类型等字段由写入器填充.
    ///
    /// 体素间距始终由 `self.shape` 求得, 按轴依次写入, 与 `shape` 无关.
    /// 因此 `shape` 与 `self.shape` 不符时, 物理视场不再等于 `fov_mm`.
    ///
    /// 任一维度超出 nifti-1 的 `u16` 上限时返回 [`Error::DimOverflow`].
    pub fn header_for(&self, shape: Idx3d) -> Result<NiftiHeader> {
        let (x, y, z) = shape;
        let dim = |n: usize| u16::try_from(n).map_err(|_| Error::DimOverflow(shape));
        let [sx, sy, sz] = self.spacing().map(|s| s as f32);
        let mut header = NiftiHeader::default();
        header.dim = [3, dim(x)?, dim(y)?, dim(z)?, 1, 1, 1, 1];
        header.pixdim = [1.0, sx, sy, sz, 1.0, 1.0, 1.0, 1.0];
        header.xyzt_units = NIFTI_UNITS_MM;
        header.sform_code = NIFTI_XFORM_SCANNER_ANAT;
        header.srow_x = [sx, 0.0, 0.0, 0.0];
        header.srow_y = [0.0, sy, 0.0, 0.0];
        header.srow_z = [0.0, 0.0, sz, 0.0];
        Ok(header)
    }
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self::OCTA_3MM
    }
}

#[cfg(test)]
mod tests {
    use super::VolumeGeometry;
    use crate::Error;

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_octa_3mm_spacing() {
        let [x, y, z] = VolumeGeometry::OCTA_3MM.spacing();
        assert!(float_eq(x, 3.0 / 304.0));
        assert!(float_eq(y, 3.0 / 304.0));
        assert!(float_eq(z, 2.0 / 640.0));
        assert_eq!(VolumeGeometry::OCTA_3MM.depth(), 640);
    }

    #[test]
    fn test_header_for() {
        let g = VolumeGeometry::new((4, 5, 8), [2.0, 5.0, 4.0]);
        let h = g.header_for((4, 5, 8)).unwrap();
        assert_eq!(&h.dim[..4], &[3, 4, 5, 8]);
        assert_eq!(&h.pixdim[1..4], &[0.5, 1.0, 0.5]);
        assert_eq!(h.srow_y[1], 1.0);
        assert_eq!(h.sform_code, 1);
    }

    #[test]
    fn test_header_for_spacing_from_preset() {
        // 实际形状与预设不符时, 间距仍取自预设形状.
        let g = VolumeGeometry::new((4, 5, 8), [2.0, 5.0, 4.0]);
        let h = g.header_for((8, 5, 2)).unwrap();
        assert_eq!(&h.dim[..4], &[3, 8, 5, 2]);
        assert_eq!(&h.pixdim[1..4], &[0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_header_for_dim_overflow() {
        let g = VolumeGeometry::OCTA_3MM;
        assert!(g.header_for((65535, 1, 640)).is_ok());
        assert!(matches!(
            g.header_for((304, 65536, 640)),
            Err(Error::DimOverflow((304, 65536, 640)))
        ));
    }
}
