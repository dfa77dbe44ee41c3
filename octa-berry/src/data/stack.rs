//! BMP 切片栈的加载.
//!
//! OCTA-500 中每位受试者的每种模态都是一个目录, 目录下的 `1.bmp`, `2.bmp`, ...
//! 依次为深度方向上的各个切片. 文件名中的数字需按整数比较, 否则 `10.bmp`
//! 会排在 `2.bmp` 前面.

use crate::{Error, Result};
use log::debug;
use ndarray::{s, Array3, ArrayView2};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// 自然序排序键的一个片段.
///
/// 排序键总以 `Text` 开始, 并与 `Number` 交替出现, 所以比较时同一位置的片段种类总是相同.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NaturalChunk {
    /// 不含数字的文本 (可能为空).
    Text(String),

    /// 一段连续的十进制数字, 已去掉前导零.
    Number(String),
}

impl Ord for NaturalChunk {
    fn cmp(&self, other: &Self) -> Ordering {
        use NaturalChunk::*;
        match (self, other) {
            (Text(a), Text(b)) => a.cmp(b),
            // 去掉前导零之后, 位数少的数更小.
            (Number(a), Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Text(_), Number(_)) => Ordering::Less,
            (Number(_), Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for NaturalChunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 求 `name` 的自然序排序键. 例如 `"slice10.bmp"` -> `["slice", 10, ".bmp"]`.
pub fn natural_key(name: &str) -> Vec<NaturalChunk> {
    let mut key = Vec::new();
    let mut rest = name;
    loop {
        let digits_at = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        key.push(NaturalChunk::Text(rest[..digits_at].to_owned()));
        rest = &rest[digits_at..];
        if rest.is_empty() {
            return key;
        }

        let text_at = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let digits = rest[..text_at].trim_start_matches('0');
        key.push(NaturalChunk::Number(digits.to_owned()));
        rest = &rest[text_at..];
    }
}

/// 一个目录下按自然序排列的 bmp 切片文件.
///
/// 只有文件名以 `.bmp` 结尾 (区分大小写) 的文件会被收集.
#[derive(Debug, Clone)]
pub struct SliceStack {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl SliceStack {
    /// 收集 `dir` 下的切片文件. 若目录无法读取, 或其中没有任何 bmp 文件, 则返回 `Err`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        let mut named = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".bmp") {
                named.push((natural_key(name), path.clone()));
            }
        }
        if named.is_empty() {
            return Err(Error::EmptyStack(dir));
        }

        named.sort_by(|a, b| a.0.cmp(&b.0));
        let files = named.into_iter().map(|(_, p)| p).collect();
        Ok(Self { dir, files })
    }

    /// 切片所在目录.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 切片个数, 即深度方向体素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// 切片栈是否为空. 由 [`SliceStack::open`] 得到的栈总是非空的.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 按深度升序排列的切片文件.
    #[inline]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// 解码全部切片并沿深度方向堆叠, 得到 (高, 宽, 深度) 组织的体数据.
    ///
    /// 第 `i` 张切片位于深度 `i`; 若 `z_inverse` 为 `true`, 则位于深度 `len - 1 - i`.
    /// 彩色图像会被转换为 8-bit 灰度. 切片大小与第一张不一致时返回 `Err`.
    pub fn into_volume(self, z_inverse: bool) -> Result<Array3<u8>> {
        let n = self.files.len();
        let mut volume: Option<Array3<u8>> = None;
        for (i, path) in self.files.into_iter().enumerate() {
            let img = image::open(&path)?.into_luma8();
            let found = (img.height() as usize, img.width() as usize);
            let volume = volume.get_or_insert_with(|| Array3::zeros((found.0, found.1, n)));
            let (h, w, _) = volume.dim();
            if found != (h, w) {
                return Err(Error::SliceShapeMismatch {
                    path,
                    expected: (h, w),
                    found,
                });
            }

            let z = if z_inverse { n - 1 - i } else { i };
            let pixels = ArrayView2::from_shape(found, img.as_raw().as_slice())?;
            volume.slice_mut(s![.., .., z]).assign(&pixels);
            debug!("loaded {path:?} at depth {z}");
        }
        volume.ok_or(Error::EmptyStack(self.dir))
    }
}

/// 加载 `dir` 下的 bmp 切片栈, 得到 (高, 宽, 深度) 组织的体数据.
///
/// 详见 [`SliceStack::open`] 和 [`SliceStack::into_volume`].
#[inline]
pub fn load_stack<P: AsRef<Path>>(dir: P, z_inverse: bool) -> Result<Array3<u8>> {
    SliceStack::open(dir)?.into_volume(z_inverse)
}
