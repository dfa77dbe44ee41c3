use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::layer::*;
use crate::{Idx3d, Result};

mod geometry;
pub mod layers;
pub mod mat;
pub mod stack;

pub use geometry::VolumeGeometry;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 从 header 获取数据形状 (x, y, z).
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    let [_, x, y, z, ..] = h.dim;
    (x as usize, y as usize, z as usize)
}

/// 保证数据为行优先存储.
#[inline]
fn standard_layout(data: Array3<u8>) -> Array3<u8> {
    if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().to_owned()
    }
}

/// 3D nii 文件 header 的共用属性和部分通用操作.
///
/// 与 nifti 惯例一致, 数据按 (x, y, z) 访问, 其中 z 为深度方向.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取深度方向体素个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().2
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (x, y, z) = self.shape();
        x * y * z
    }

    /// 获取单个体素分辨率 (x, y, z), 以毫米为单位.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, x, y, z, ..] = self.header().pixdim;
        [x as f64, y as f64, z as f64]
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [x, y, z] = self.pix_dim();
        x == y && x == z
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }

    /// 数据形状是否与 `geometry` 一致.
    #[inline]
    fn fits(&self, geometry: &VolumeGeometry) -> bool {
        self.shape() == geometry.shape
    }
}

/// 两种体数据共用的构造, 存取与访问方法.
macro_rules! impl_volume {
    ($($volume: ty),+) => {
        $(
            impl NiftiHeaderAttr for $volume {
                #[inline]
                fn header(&self) -> &NiftiHeader {
                    &self.header
                }
            }

            impl Index<Idx3d> for $volume {
                type Output = u8;

                #[inline]
                fn index(&self, index: Idx3d) -> &Self::Output {
                    &self.data[index]
                }
            }

            impl IndexMut<Idx3d> for $volume {
                #[inline]
                fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
                    &mut self.data[index]
                }
            }

            impl $volume {
                /// 由 (x, y, z) 组织的裸数据创建体数据, 体素间距取自 `geometry`.
                ///
                /// header 中的形状以 `data` 的实际形状为准, 见 [`VolumeGeometry::header_for`].
                pub fn from_array(data: Array3<u8>, geometry: &VolumeGeometry) -> Result<Self> {
                    let data = standard_layout(data);
                    let header = Box::new(geometry.header_for(data.dim())?);
                    Ok(Self { header, data })
                }

                /// 打开 nii (或 nii.gz) 文件. 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
                pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
                    let obj = ReaderOptions::new().read_file(path.as_ref())?;
                    let header = Box::new(obj.header().clone());
                    let data = obj
                        .into_volume()
                        .into_ndarray::<u8>()?
                        .into_dimensionality::<Ix3>()?;
                    Ok(Self {
                        header,
                        data: standard_layout(data),
                    })
                }

                /// 保存为 nifti 文件. 路径以 `.gz` 结尾时会压缩存储.
                pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
                    WriterOptions::new(path.as_ref())
                        .reference_header(&self.header)
                        .write_nifti(&self.data)?;
                    Ok(())
                }

                /// 获取深度 `z_index` 处的 (x, y) 切片视图.
                ///
                /// 当 `z_index` 越界时 panic.
                #[inline]
                pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, u8> {
                    self.data.index_axis(Axis(2), z_index)
                }

                /// 获得数据的一份不可变 shallow copy.
                #[inline]
                pub fn data(&self) -> ArrayView3<'_, u8> {
                    self.data.view()
                }

                /// 获得数据的一份可变 shallow copy.
                #[inline]
                pub fn data_mut(&mut self) -> ArrayViewMut3<'_, u8> {
                    self.data.view_mut()
                }

                /// 消费自我, 获得底层数据.
                #[inline]
                pub fn into_data(self) -> Array3<u8> {
                    self.data
                }
            }
        )+
    };
}

/// 灰度体数据 (OCT 或 OCTA), 包括 header 和 (x, y, z) 组织的 8-bit 强度.
#[derive(Debug, Clone)]
pub struct OctaScan {
    header: BoxedHeader,
    data: Array3<u8>,
}

/// 标签体数据 (分层标签或 FAZ 掩膜), 包括 header 和 (x, y, z) 组织的标签值.
#[derive(Debug, Clone)]
pub struct OctaLabel {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl_volume!(OctaScan, OctaLabel);

impl OctaLabel {
    /// 获取标签中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取各层体素个数. 第 `i` 个元素为值为 `i` 的体素个数, 不统计其他值.
    pub fn layer_statistics(&self) -> [usize; LAYER_COUNT] {
        let mut ans = [0; LAYER_COUNT];
        for pixel in self.data.iter().copied().filter(|p| is_layer(*p)) {
            ans[pixel as usize] += 1;
        }
        ans
    }

    /// 将标签中值为 `old` 的体素全部替换为 `new`.
    ///
    /// 返回总共成功替换的个数.
    pub fn replace(&mut self, old: u8, new: u8) -> usize {
        let mut cnt = 0usize;
        self.data_mut()
            .iter_mut()
            .filter(|pix| **pix == old)
            .for_each(|p| {
                cnt += 1;
                *p = new;
            });
        cnt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("octa_berry_{}_{name}", std::process::id()))
    }

    fn sample_label() -> OctaLabel {
        let data = Array3::from_shape_fn((3, 4, 8), |(x, y, z)| ((x + y + z) % 6) as u8);
        OctaLabel::from_array(data, &VolumeGeometry::new((3, 4, 8), [3.0, 2.0, 2.0])).unwrap()
    }

    #[test]
    fn test_from_array_header() {
        let label = sample_label();
        assert_eq!(label.shape(), (3, 4, 8));
        assert_eq!(label.len_z(), 8);
        assert_eq!(label.size(), 96);
        assert_eq!(label.pix_dim(), [1.0, 0.5, 0.25]);
        assert!(!label.is_isotropic());
        assert!(!label.fits(&VolumeGeometry::OCTA_3MM));
        assert_eq!(label[(1, 2, 3)], 0);
        assert_eq!(label.slice_at(3).dim(), (3, 4));
    }

    #[test]
    fn test_statistics_and_replace() {
        let mut label = sample_label();
        let stats = label.layer_statistics();
        assert_eq!(stats.iter().sum::<usize>(), label.size());
        let fives = label.count(5);
        assert_eq!(stats[5], fives);
        assert_eq!(label.replace(5, 0), fives);
        assert_eq!(label.count(5), 0);
        assert_eq!(label.layer_statistics()[0], stats[0] + stats[5]);
    }

    #[test]
    fn test_save_and_open_keep_spacing() {
        let label = sample_label();
        let path = temp_path("label.nii.gz");
        label.save(&path).unwrap();
        let back = OctaLabel::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.shape(), label.shape());
        assert_eq!(back.pix_dim(), label.pix_dim());
        assert_eq!(back.data(), label.data());
    }
}
