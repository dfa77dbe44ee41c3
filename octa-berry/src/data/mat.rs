//! MATLAB 真值文件 (`.mat`) 的读取.
//!
//! OCTA-500 的分层边界 `Layer` 以 level-5 格式保存, 3D FAZ 掩膜 `FAZlabel` 以 v7.3 格式保存.
//! level-5 文件由 `matfile` 解析. v7.3 文件实为 HDF5 文件, 需要打开 `hdf5` feature.
//!
//! 本模块返回的数组都按 MATLAB 的维度顺序索引, 即 `a[(i, j, k)]` 对应 MATLAB 中的 `a(i+1, j+1, k+1)`.

use crate::layers::LayerBoundaries;
use crate::{Error, Result};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// 本次构建能否读取 v7.3 文件.
pub const V73_SUPPORTED: bool = cfg!(feature = "hdf5");

/// v7.3 文件的文本头以此开头.
const V73_HEADER_PREFIX: &[u8] = b"MATLAB 7.3 MAT-file";

/// MAT 文件格式版本.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MatVersion {
    /// v4 之后, v7.3 之前的二进制格式.
    Level5,

    /// 基于 HDF5 的格式.
    V73,
}

/// 根据 128 字节文本头判断 MAT 文件版本.
pub fn mat_version<P: AsRef<Path>>(path: P) -> Result<MatVersion> {
    let mut head = Vec::with_capacity(128);
    File::open(path.as_ref())?.take(128).read_to_end(&mut head)?;
    if head.starts_with(V73_HEADER_PREFIX) {
        Ok(MatVersion::V73)
    } else {
        Ok(MatVersion::Level5)
    }
}

fn mat_error(path: &Path, reason: impl Into<String>) -> Error {
    Error::Mat {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

fn missing(path: &Path, name: &str) -> Error {
    Error::MissingVariable {
        path: path.to_owned(),
        name: name.to_owned(),
    }
}

/// 将 level-5 数值数据的实部统一转换为 `f64`.
macro_rules! real_as_f64 {
    ($data: expr, $($variant: ident),+) => {
        match $data {
            $(matfile::NumericData::$variant { real, .. } => {
                real.iter().map(|v| *v as f64).collect::<Vec<f64>>()
            })+
            #[allow(unreachable_patterns)]
            _ => return None,
        }
    };
}

fn level5_real(data: &matfile::NumericData) -> Option<Vec<f64>> {
    Some(real_as_f64!(
        data, Int8, UInt8, Int16, UInt16, Int32, UInt32, Int64, UInt64, Single, Double
    ))
}

/// 从 level-5 文件中读取变量 `name`, 得到 MATLAB 维度顺序的 `f64` 数组.
fn read_level5(path: &Path, name: &str) -> Result<ArrayD<f64>> {
    let file = BufReader::new(File::open(path)?);
    let mat = matfile::MatFile::parse(file).map_err(|e| mat_error(path, format!("{e:?}")))?;
    let array = mat.find_by_name(name).ok_or_else(|| missing(path, name))?;
    let real = level5_real(array.data()).ok_or_else(|| Error::MatConversion {
        name: name.to_owned(),
        target: "f64",
    })?;

    // MATLAB 按列优先存储.
    let dims = array.size().clone();
    Ok(ArrayD::from_shape_vec(IxDyn(&dims).f(), real)?)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "hdf5")] {
        /// 从 v7.3 文件中读取变量 `name`, 得到 MATLAB 维度顺序的数组.
        ///
        /// HDF5 按行优先存储 MATLAB 的列优先数据, 因此读出的维度顺序与 MATLAB 相反.
        fn read_v73<T: hdf5::H5Type>(path: &Path, name: &str) -> Result<ArrayD<T>> {
            let h5 = |e: hdf5::Error| mat_error(path, e.to_string());
            let file = hdf5::File::open(path).map_err(h5)?;
            if !file.link_exists(name) {
                return Err(missing(path, name));
            }
            let data = file.dataset(name).map_err(h5)?.read_dyn::<T>().map_err(h5)?;
            Ok(data.reversed_axes())
        }
    } else {
        fn read_v73<T>(path: &Path, _name: &str) -> Result<ArrayD<T>> {
            Err(mat_error(
                path,
                "MAT v7.3 (HDF5) 文件需要启用 `hdf5` feature",
            ))
        }
    }
}

/// 读取数值变量 `name`, 结果转换为 `f64`, 按 MATLAB 维度顺序组织.
///
/// 自动识别 level-5 与 v7.3 格式.
pub fn read_f64_array<P: AsRef<Path>>(path: P, name: &str) -> Result<ArrayD<f64>> {
    let path = path.as_ref();
    match mat_version(path)? {
        MatVersion::Level5 => read_level5(path, name),
        MatVersion::V73 => read_v73::<f64>(path, name),
    }
}

/// 读取取值均为 0..=255 整数的变量 `name` (例如 logical 掩膜), 按 MATLAB 维度顺序组织.
///
/// 若存在非整数或越界的值, 返回 `Err`.
pub fn read_u8_array<P: AsRef<Path>>(path: P, name: &str) -> Result<ArrayD<u8>> {
    let path = path.as_ref();
    if mat_version(path)? == MatVersion::V73 {
        return read_v73::<u8>(path, name);
    }

    let raw = read_level5(path, name)?;
    if raw
        .iter()
        .any(|v| v.fract() != 0.0 || !(0.0..=255.0).contains(v))
    {
        return Err(Error::MatConversion {
            name: name.to_owned(),
            target: "u8",
        });
    }
    Ok(raw.mapv(|v| v as u8))
}

/// 读取分层边界变量 `Layer` 并转换为 [`LayerBoundaries`].
///
/// 变量在文件中按 (6, X, Y) 保存. `depth` 为体数据深度, 用于校验边界取值.
pub fn read_layer_boundaries<P: AsRef<Path>>(path: P, depth: usize) -> Result<LayerBoundaries> {
    let raw = read_f64_array(path, "Layer")?;
    Ok(LayerBoundaries::from_matlab_order(raw, depth)?)
}

/// 读取 3D FAZ 掩膜变量 `FAZlabel`, 按 MATLAB 维度顺序组织.
#[inline]
pub fn read_faz_mask<P: AsRef<Path>>(path: P) -> Result<ArrayD<u8>> {
    read_u8_array(path, "FAZlabel")
}

/// 测试用的 level-5 文件构造工具.
#[cfg(test)]
pub(crate) mod fixture {
    use std::path::Path;

    const MI_INT8: u32 = 1;
    const MI_UINT8: u32 = 2;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;

    const MX_DOUBLE_CLASS: u32 = 6;
    const MX_UINT8_CLASS: u32 = 9;

    /// 写入一个数据元素 (标签 + 数据 + 8 字节对齐填充).
    fn element(out: &mut Vec<u8>, data_type: u32, bytes: &[u8]) {
        out.extend_from_slice(&data_type.to_le_bytes());
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(bytes);
        let pad = (8 - bytes.len() % 8) % 8;
        out.extend(std::iter::repeat(0).take(pad));
    }

    fn matrix(name: &str, dims: &[usize], class: u32, data_type: u32, real: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        let flags: Vec<u8> = [class, 0u32].iter().flat_map(|v| v.to_le_bytes()).collect();
        element(&mut body, MI_UINT32, &flags);
        let dims: Vec<u8> = dims.iter().flat_map(|d| (*d as i32).to_le_bytes()).collect();
        element(&mut body, MI_INT32, &dims);
        element(&mut body, MI_INT8, name.as_bytes());
        element(&mut body, data_type, real);

        let mut out = Vec::new();
        element(&mut out, MI_MATRIX, &body);
        out
    }

    fn header() -> Vec<u8> {
        let mut head = b"MATLAB 5.0 MAT-file, Platform: GLNXA64, Created on: test".to_vec();
        head.resize(116, b' ');
        head.extend_from_slice(&[0; 8]);
        head.extend_from_slice(&0x0100u16.to_le_bytes());
        head.extend_from_slice(b"IM");
        head
    }

    /// 变量的值, 按 MATLAB 列优先顺序给出.
    pub enum Values<'a> {
        Double(&'a [f64]),
        UInt8(&'a [u8]),
    }

    /// 写入只含若干变量的 level-5 文件.
    pub fn write_level5(path: &Path, vars: &[(&str, &[usize], Values<'_>)]) {
        let mut out = header();
        for (name, dims, values) in vars {
            let m = match values {
                Values::Double(v) => {
                    let bytes: Vec<u8> = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                    matrix(name, dims, MX_DOUBLE_CLASS, MI_DOUBLE, &bytes)
                }
                Values::UInt8(v) => matrix(name, dims, MX_UINT8_CLASS, MI_UINT8, v),
            };
            out.extend(m);
        }
        std::fs::write(path, out).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::{write_level5, Values};
    use super::*;
    use crate::consts::layer::LAYER_COUNT;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("octa_berry_mat_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_mat_version() {
        let path = temp_path("version.mat");
        write_level5(&path, &[("a", &[1, 1], Values::Double(&[1.0]))]);
        assert_eq!(mat_version(&path).unwrap(), MatVersion::Level5);

        let mut head = V73_HEADER_PREFIX.to_vec();
        head.resize(128, b' ');
        std::fs::write(&path, head).unwrap();
        assert_eq!(mat_version(&path).unwrap(), MatVersion::V73);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_column_major_order() {
        let path = temp_path("order.mat");
        // MATLAB: a = [1 3 5; 2 4 6]
        write_level5(
            &path,
            &[("a", &[2, 3], Values::Double(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))],
        );
        let a = read_f64_array(&path, "a").unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a[[0, 0]], 1.0);
        assert_eq!(a[[1, 0]], 2.0);
        assert_eq!(a[[0, 2]], 5.0);
        assert_eq!(a[[1, 2]], 6.0);
    }

    #[test]
    fn test_missing_variable() {
        let path = temp_path("missing.mat");
        write_level5(&path, &[("a", &[1, 1], Values::Double(&[1.0]))]);
        let err = read_f64_array(&path, "Layer").unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, Error::MissingVariable { name, .. } if name == "Layer"));
    }

    #[test]
    fn test_read_u8() {
        let path = temp_path("u8.mat");
        write_level5(
            &path,
            &[
                ("mask", &[2, 2], Values::UInt8(&[0, 1, 1, 0])),
                ("bad", &[1, 2], Values::Double(&[0.5, 1.0])),
            ],
        );
        let mask = read_u8_array(&path, "mask").unwrap();
        let bad = read_u8_array(&path, "bad");
        std::fs::remove_file(&path).ok();

        assert_eq!(mask[[1, 0]], 1);
        assert_eq!(mask[[1, 1]], 0);
        assert!(matches!(bad, Err(Error::MatConversion { target: "u8", .. })));
    }

    #[test]
    fn test_read_layer_boundaries() {
        let path = temp_path("layer.mat");
        let (nx, ny) = (2, 3);
        let ends = [3.0, 5.0, 8.0, 10.0, 12.0, 15.0];
        // (6, X, Y) 列优先: 第 0 维变化最快.
        let values: Vec<f64> = (0..nx * ny).flat_map(|_| ends).collect();
        write_level5(
            &path,
            &[("Layer", &[LAYER_COUNT, nx, ny], Values::Double(&values))],
        );
        let b = read_layer_boundaries(&path, 16).unwrap();
        let out_of_range = read_layer_boundaries(&path, 15);
        std::fs::remove_file(&path).ok();

        assert_eq!(b.shape(), (nx, ny));
        assert_eq!(b.depth(), 16);
        assert_eq!(b.ends((1, 2)).to_vec(), vec![3, 5, 8, 10, 12, 15]);
        assert!(matches!(out_of_range, Err(Error::Boundary(_))));
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn test_read_v73_reverses_axes() {
        use ndarray::Array3;
        use std::io::Write;

        let path = temp_path("v73_faz.mat");
        // HDF5 中按 (N, W, H) 行优先保存, 对应 MATLAB 中的 (H, W, N).
        let stored = Array3::from_shape_fn((4, 3, 2), |(k, j, i)| (k * 100 + j * 10 + i) as u8);
        {
            let file = hdf5::File::with_options()
                .with_fcpl(|p| p.userblock(512))
                .create(&path)
                .unwrap();
            let ds = file
                .new_dataset::<u8>()
                .shape((4, 3, 2))
                .create("FAZlabel")
                .unwrap();
            ds.write(&stored).unwrap();
        }
        let mut head = V73_HEADER_PREFIX.to_vec();
        head.resize(128, b' ');
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .write_all(&head)
            .unwrap();

        assert_eq!(mat_version(&path).unwrap(), MatVersion::V73);
        let faz = read_faz_mask(&path).unwrap();
        let missing = read_f64_array(&path, "Layer");
        std::fs::remove_file(&path).ok();

        assert_eq!(faz.shape(), &[2, 3, 4]);
        assert_eq!(faz[[1, 2, 3]], 321);
        assert_eq!(faz[[0, 1, 2]], stored[(2, 1, 0)]);
        assert!(faz
            .indexed_iter()
            .all(|(ix, &v)| v == stored[(ix[2], ix[1], ix[0])]));
        assert!(matches!(missing, Err(Error::MissingVariable { .. })));
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_v73_requires_feature() {
        let path = temp_path("v73.mat");
        let mut head = V73_HEADER_PREFIX.to_vec();
        head.resize(512, 0);
        std::fs::write(&path, head).unwrap();
        let err = read_faz_mask(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(!V73_SUPPORTED);
        assert!(matches!(err, Error::Mat { .. }));
    }
}
