//! 测试用的微型 OCTA-500 数据集.

use super::{Fov, GtTag, Modality, Octa500Layout};
use crate::consts::layer::LAYER_COUNT;
use crate::mat::fixture::{write_level5, Values};
use image::{GrayImage, Luma};
use std::fs;
use std::path::{Path, PathBuf};

/// 切片栈形状 (高, 宽, 切片数), 同时也是 FAZ 掩膜在 MATLAB 中的形状.
pub const FAKE_SHAPE: (usize, usize, usize) = (4, 3, 5);

/// 临时目录下的 3mm 数据集, 析构时删除.
pub struct FakeDataset {
    root: PathBuf,
}

impl FakeDataset {
    /// 在临时目录下创建名为 `name` 的数据集, 其中包含 `ids` 中的全部受试者.
    pub fn new(name: &str, ids: &[u32]) -> Self {
        let root = std::env::temp_dir().join(format!(
            "octa_berry_dataset_{}_{name}",
            std::process::id()
        ));
        fs::remove_dir_all(&root).ok();
        let ds = Self { root };
        for &id in ids {
            ds.write_subject(id);
        }
        ds
    }

    /// 数据集根目录.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 数据集布局.
    pub fn layout(&self, fov: Fov) -> Octa500Layout {
        Octa500Layout::new(&self.root, fov)
    }

    /// FAZ 掩膜在 MATLAB 下标 (i, j, k) 处的值.
    pub fn faz_value(&self, i: usize, j: usize, k: usize) -> u8 {
        ((i + 2 * j + 3 * k) % 2) as u8
    }

    fn write_subject(&self, id: u32) {
        let layout = self.layout(Fov::Mm3);
        let (h, w, n) = FAKE_SHAPE;

        for modality in Modality::ALL {
            let dir = layout.stack_dir(modality, id);
            fs::create_dir_all(&dir).unwrap();
            for i in 1..=n {
                let img = GrayImage::from_pixel(w as u32, h as u32, Luma([(i * 10) as u8]));
                img.save(dir.join(format!("{i}.bmp"))).unwrap();
            }
        }

        let faz_path = layout.faz3d_mat(id);
        fs::create_dir_all(faz_path.parent().unwrap()).unwrap();
        let mut faz = Vec::with_capacity(h * w * n);
        for k in 0..n {
            for j in 0..w {
                for i in 0..h {
                    faz.push(self.faz_value(i, j, k));
                }
            }
        }
        write_level5(&faz_path, &[("FAZlabel", &[h, w, n], Values::UInt8(&faz))]);

        // (6, X, Y), 每层均非空, 且最后一层到达最大深度.
        let layers_path = layout.layers_mat(id);
        fs::create_dir_all(layers_path.parent().unwrap()).unwrap();
        let mut ends = Vec::with_capacity(LAYER_COUNT * h * w);
        for y in 0..w {
            for x in 0..h {
                let top = (10 * x + y) as f64;
                ends.extend_from_slice(&[99.0 + top, 199.0, 299.0, 399.0, 499.0, 639.0]);
            }
        }
        write_level5(
            &layers_path,
            &[("Layer", &[LAYER_COUNT, h, w], Values::Double(&ends))],
        );

        for tag in GtTag::ALL {
            let path = layout.gt_2d(tag, id);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            GrayImage::from_pixel(w as u32, h as u32, Luma([255]))
                .save(&path)
                .unwrap();
        }
    }
}

impl Drop for FakeDataset {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.root).ok();
    }
}
