//! 输入数据集与导出目录的文件布局.

use super::{Fov, GtTag, Modality};
use std::path::{Path, PathBuf};

/// 导出目录中 OCT 体数据的文件名.
pub const VOL_OCT: &str = "vol_OCT.nii.gz";

/// 导出目录中 OCTA 体数据的文件名.
pub const VOL_OCTA: &str = "vol_OCTA.nii.gz";

/// 导出目录中 3D FAZ 标签的文件名.
pub const LABEL_3D_FAZ: &str = "label_3D_FAZ.nii.gz";

/// 导出目录中分层标签的文件名. 该文件最后写入, 其存在即表示受试者已完成导出.
pub const LABEL_3D_LAYERS: &str = "label_3D_Layers.nii.gz";

/// OCTA-500 数据集根目录下各输入文件的位置.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Octa500Layout {
    root: PathBuf,
    fov: Fov,
}

impl Octa500Layout {
    /// `root` 为数据集根目录 (其下有 `OCTA_3mm`, `Label` 等目录).
    pub fn new<P: AsRef<Path>>(root: P, fov: Fov) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            fov,
        }
    }

    /// 数据集根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 视场子集.
    #[inline]
    pub fn fov(&self) -> Fov {
        self.fov
    }

    /// `{root}/OCTA_{fov}/{OCT|OCTA}/{id}`, bmp 切片栈所在目录.
    pub fn stack_dir(&self, modality: Modality, id: u32) -> PathBuf {
        let mut ans = self.root.join(format!("OCTA_{}", self.fov.tag()));
        ans.push(modality.name());
        ans.push(id.to_string());
        ans
    }

    fn label_file(&self, dir: &str, id: u32, ext: &str) -> PathBuf {
        let mut ans = self.root.join("Label");
        ans.push(dir);
        ans.push(format!("{id}.{ext}"));
        ans
    }

    /// `{root}/Label/GT_FAZ3D/{id}.mat`.
    pub fn faz3d_mat(&self, id: u32) -> PathBuf {
        self.label_file("GT_FAZ3D", id, "mat")
    }

    /// `{root}/Label/GT_Layers/{id}.mat`.
    pub fn layers_mat(&self, id: u32) -> PathBuf {
        self.label_file("GT_Layers", id, "mat")
    }

    /// `{root}/Label/GT_{tag}/{id}.bmp`.
    pub fn gt_2d(&self, tag: GtTag, id: u32) -> PathBuf {
        self.label_file(&tag.dir_name(), id, "bmp")
    }
}

/// 导出目录下各输出文件的位置. 每位受试者一个子目录.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    root: PathBuf,
}

impl ExportLayout {
    /// 直接以 `root` 为导出根目录.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    /// 默认导出根目录 `{dataset_root}/OCTA500_MONAI_{fov}`.
    pub fn default_root<P: AsRef<Path>>(dataset_root: P, fov: Fov) -> PathBuf {
        dataset_root
            .as_ref()
            .join(format!("OCTA500_MONAI_{}", fov.tag()))
    }

    /// 导出根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{id}`.
    pub fn subject_dir(&self, id: u32) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// 灰度体数据的输出路径.
    pub fn volume(&self, modality: Modality, id: u32) -> PathBuf {
        let name = match modality {
            Modality::Oct => VOL_OCT,
            Modality::Octa => VOL_OCTA,
        };
        self.subject_dir(id).join(name)
    }

    /// 3D FAZ 标签的输出路径.
    pub fn faz_label(&self, id: u32) -> PathBuf {
        self.subject_dir(id).join(LABEL_3D_FAZ)
    }

    /// 分层标签的输出路径.
    pub fn layers_label(&self, id: u32) -> PathBuf {
        self.subject_dir(id).join(LABEL_3D_LAYERS)
    }

    /// 二维真值图的输出路径.
    pub fn gt_2d(&self, tag: GtTag, id: u32) -> PathBuf {
        self.subject_dir(id).join(tag.output_name())
    }

    /// 受试者是否已完成导出 (分层标签文件已存在).
    #[inline]
    pub fn is_complete(&self, id: u32) -> bool {
        self.layers_label(id).exists()
    }
}
