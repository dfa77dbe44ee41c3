//! 数据集操作.
//!
//! OCTA-500 的目录组织如下:
//!
//! ```text
//! OCTA-500/
//! ├── OCTA_3mm/
//! │   ├── OCT/10301/1.bmp, 2.bmp, ...
//! │   └── OCTA/10301/1.bmp, 2.bmp, ...
//! └── Label/
//!     ├── GT_FAZ3D/10301.mat
//!     ├── GT_Layers/10301.mat
//!     └── GT_Artery/10301.bmp, GT_Vein/10301.bmp, ...
//! ```

use crate::consts::{OCTA500_3MM_SUBJECTS, OCTA500_6MM_SUBJECTS};
use crate::VolumeGeometry;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

mod layout;
mod subject;

#[cfg(test)]
pub(crate) mod fixture;

pub use layout::{
    ExportLayout, Octa500Layout, LABEL_3D_FAZ, LABEL_3D_LAYERS, VOL_OCT, VOL_OCTA,
};
pub use subject::{subject_loader, LoadOptions, SubjectData, SubjectLoader};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 获取 `{用户主目录}/dataset/OCTA-500` 目录.
#[inline]
pub fn octa500_home_dir() -> Option<PathBuf> {
    home_dataset_dir_with(["OCTA-500"])
}

/// OCTA-500 的两个视场子集.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fov {
    /// 3mm * 3mm 视场, 受试者 10301 ~ 10500.
    #[default]
    Mm3,

    /// 6mm * 6mm 视场, 受试者 10001 ~ 10300.
    Mm6,
}

impl Fov {
    /// 目录名中使用的标记, 如 `"3mm"`.
    pub const fn tag(self) -> &'static str {
        match self {
            Fov::Mm3 => "3mm",
            Fov::Mm6 => "6mm",
        }
    }

    /// 对应的体数据几何参数.
    pub const fn geometry(self) -> VolumeGeometry {
        match self {
            Fov::Mm3 => VolumeGeometry::OCTA_3MM,
            Fov::Mm6 => VolumeGeometry::OCTA_6MM,
        }
    }

    /// 该子集的全部受试者编号.
    pub const fn subjects(self) -> RangeInclusive<u32> {
        match self {
            Fov::Mm3 => OCTA500_3MM_SUBJECTS,
            Fov::Mm6 => OCTA500_6MM_SUBJECTS,
        }
    }
}

impl fmt::Display for Fov {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 无法识别的视场名.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无法识别的视场 `{0}`, 应为 `3mm` 或 `6mm`")]
pub struct ParseFovError(String);

impl FromStr for Fov {
    type Err = ParseFovError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3mm" | "3" => Ok(Fov::Mm3),
            "6mm" | "6" => Ok(Fov::Mm6),
            _ => Err(ParseFovError(s.to_owned())),
        }
    }
}

/// 灰度体数据的模态.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Modality {
    /// 结构 OCT.
    Oct,

    /// OCT 血管造影.
    Octa,
}

impl Modality {
    /// 全部模态.
    pub const ALL: [Modality; 2] = [Modality::Oct, Modality::Octa];

    /// 数据集与输出文件名中的模态名.
    pub const fn name(self) -> &'static str {
        match self {
            Modality::Oct => "OCT",
            Modality::Octa => "OCTA",
        }
    }
}

/// 二维真值图的种类.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GtTag {
    /// 动脉.
    Artery,
    /// 毛细血管.
    Capillary,
    /// 毛细血管 + 动静脉 + FAZ.
    Cavf,
    /// 中心无血管区.
    Faz,
    /// 大血管.
    LargeVessel,
    /// 静脉.
    Vein,
}

impl GtTag {
    /// 全部二维真值种类.
    pub const ALL: [GtTag; 6] = [
        GtTag::Artery,
        GtTag::Capillary,
        GtTag::Cavf,
        GtTag::Faz,
        GtTag::LargeVessel,
        GtTag::Vein,
    ];

    /// 种类名, 如 `"LargeVessel"`.
    pub const fn name(self) -> &'static str {
        match self {
            GtTag::Artery => "Artery",
            GtTag::Capillary => "Capillary",
            GtTag::Cavf => "CAVF",
            GtTag::Faz => "FAZ",
            GtTag::LargeVessel => "LargeVessel",
            GtTag::Vein => "Vein",
        }
    }

    /// 数据集中的目录名, 如 `"GT_LargeVessel"`.
    pub fn dir_name(self) -> String {
        format!("GT_{}", self.name())
    }

    /// 导出目录中的文件名, 如 `"label_2D_LargeVessel.bmp"`.
    pub fn output_name(self) -> String {
        format!("label_2D_{}.bmp", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fov_from_str() {
        assert_eq!("3mm".parse::<Fov>().unwrap(), Fov::Mm3);
        assert_eq!(" 6MM ".parse::<Fov>().unwrap(), Fov::Mm6);
        assert_eq!("6".parse::<Fov>().unwrap(), Fov::Mm6);
        assert!("9mm".parse::<Fov>().is_err());
        assert_eq!(Fov::Mm6.to_string(), "6mm");
    }

    #[test]
    fn test_fov_presets() {
        assert_eq!(Fov::default(), Fov::Mm3);
        assert_eq!(Fov::Mm3.subjects().count(), 200);
        assert_eq!(Fov::Mm6.subjects().count(), 300);
        assert_eq!(Fov::Mm3.geometry().shape, (304, 304, 640));
        assert_eq!(Fov::Mm6.geometry().shape, (400, 400, 640));
    }

    #[test]
    fn test_gt_tag_names() {
        let outputs: Vec<String> = GtTag::ALL.iter().map(|t| t.output_name()).collect();
        assert_eq!(
            outputs,
            [
                "label_2D_Artery.bmp",
                "label_2D_Capillary.bmp",
                "label_2D_CAVF.bmp",
                "label_2D_FAZ.bmp",
                "label_2D_LargeVessel.bmp",
                "label_2D_Vein.bmp",
            ]
        );
        assert_eq!(GtTag::Cavf.dir_name(), "GT_CAVF");
    }

    #[test]
    fn test_home_dataset_dir_with() {
        if let Some(home) = home_dataset_dir() {
            assert_eq!(octa500_home_dir(), Some(home.join("OCTA-500")));
        }
    }
}
