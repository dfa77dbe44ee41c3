//! 单个受试者的全部输入数据, 以及迭代器风格的受试者加载器.

use super::{GtTag, Modality, Octa500Layout};
use crate::layers::{build_label_volume_with, UncoveredPolicy};
use crate::mat::{read_faz_mask, read_layer_boundaries};
use crate::{Error, NiftiHeaderAttr, OctaLabel, OctaScan, Result, VolumeGeometry};
use log::{debug, warn};
use ndarray::Ix3;
use std::path::PathBuf;

/// 受试者数据的加载选项.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadOptions {
    /// 是否反转切片栈的深度方向.
    pub z_inverse: bool,

    /// 是否将分层标签的顶层 (5) 并入背景 (0).
    pub remap_top_layer: bool,

    /// 最后一层以下未覆盖深度的处理方式.
    pub uncovered: UncoveredPolicy,
}

/// 一位受试者转换所需的全部数据.
#[derive(Debug, Clone)]
pub struct SubjectData {
    /// 受试者编号.
    pub id: u32,

    /// OCT 体数据, (高, 宽, 深度).
    pub oct: OctaScan,

    /// OCTA 体数据, (高, 宽, 深度).
    pub octa: OctaScan,

    /// 3D FAZ 掩膜. 维度顺序与 MATLAB 中相反.
    pub faz: OctaLabel,

    /// 由分层边界重建的标签体, (X, Y, 深度).
    pub layers: OctaLabel,

    /// 二维真值图, 按 [`GtTag::ALL`] 的顺序排列. 只检查存在性, 不解码.
    pub gt_2d: Vec<(GtTag, PathBuf)>,
}

fn require(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::MissingInput(path))
    }
}

fn warn_if_misfit<V: NiftiHeaderAttr>(id: u32, what: &str, v: &V, geometry: &VolumeGeometry) {
    if !v.fits(geometry) {
        warn!(
            "subject {id}: {what} has shape {:?}, expected {:?}",
            v.shape(),
            geometry.shape
        );
    }
}

impl SubjectData {
    /// 加载编号为 `id` 的受试者. 任一输入缺失或无法解析时返回 `Err`.
    ///
    /// 数据形状与视场几何参数不符时只记录警告.
    pub fn load(layout: &Octa500Layout, id: u32, opts: &LoadOptions) -> Result<Self> {
        let geometry = layout.fov().geometry();
        let load_scan = |modality: Modality| -> Result<OctaScan> {
            let dir = require(layout.stack_dir(modality, id))?;
            debug!("subject {id}: loading {} stack from {dir:?}", modality.name());
            let data = crate::stack::load_stack(dir, opts.z_inverse)?;
            OctaScan::from_array(data, &geometry)
        };
        let oct = load_scan(Modality::Oct)?;
        let octa = load_scan(Modality::Octa)?;

        let faz_path = require(layout.faz3d_mat(id))?;
        let faz = read_faz_mask(&faz_path)?
            .reversed_axes()
            .into_dimensionality::<Ix3>()?;
        let faz = OctaLabel::from_array(faz, &geometry)?;

        let layers_path = require(layout.layers_mat(id))?;
        let boundaries = read_layer_boundaries(&layers_path, geometry.depth())?;
        let layers = build_label_volume_with(&boundaries, opts.remap_top_layer, opts.uncovered)?;
        let layers = OctaLabel::from_array(layers, &geometry)?;

        let gt_2d = GtTag::ALL
            .into_iter()
            .map(|tag| require(layout.gt_2d(tag, id)).map(|p| (tag, p)))
            .collect::<Result<Vec<_>>>()?;

        warn_if_misfit(id, "OCT", &oct, &geometry);
        warn_if_misfit(id, "OCTA", &octa, &geometry);
        warn_if_misfit(id, "FAZ", &faz, &geometry);
        warn_if_misfit(id, "layers", &layers, &geometry);

        Ok(Self {
            id,
            oct,
            octa,
            faz,
            layers,
            gt_2d,
        })
    }
}

/// 从指定布局和受试者编号创建受试者数据 ([`SubjectData`]) 加载器.
///
/// 按 `ids` 的顺序迭代. 缺失或损坏的受试者在迭代时返回 `Result::Err`, 不影响后续受试者.
pub fn subject_loader<I: IntoIterator<Item = u32>>(
    layout: Octa500Layout,
    ids: I,
    opts: LoadOptions,
) -> SubjectLoader {
    let mut data: Vec<u32> = ids.into_iter().collect();
    data.reverse();

    SubjectLoader {
        layout,
        opts,
        data_rev: data,
    }
}

/// 受试者数据加载器.
#[derive(Debug)]
pub struct SubjectLoader {
    layout: Octa500Layout,
    opts: LoadOptions,
    data_rev: Vec<u32>,
}

impl SubjectLoader {
    /// 数据集布局.
    #[inline]
    pub fn layout(&self) -> &Octa500Layout {
        &self.layout
    }
}

impl Iterator for SubjectLoader {
    type Item = (u32, Result<SubjectData>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.data_rev.pop()?;
        Some((idx, SubjectData::load(&self.layout, idx, &self.opts)))
    }
}

impl ExactSizeIterator for SubjectLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::layer::*;
    use crate::dataset::fixture::{FakeDataset, FAKE_SHAPE};
    use crate::dataset::Fov;

    #[test]
    fn test_load_subject() {
        let ds = FakeDataset::new("load_subject", &[10301]);
        let layout = Octa500Layout::new(ds.root(), Fov::Mm3);
        let data = SubjectData::load(&layout, 10301, &LoadOptions::default()).unwrap();

        let (h, w, n) = FAKE_SHAPE;
        assert_eq!(data.oct.shape(), (h, w, n));
        assert_eq!(data.octa.shape(), (h, w, n));
        // MATLAB (h, w, n) -> (n, w, h)
        assert_eq!(data.faz.shape(), (n, w, h));
        assert_eq!(data.faz[(1, 0, 2)], ds.faz_value(2, 0, 1));
        assert_eq!(data.layers.shape(), (h, w, 640));
        assert_eq!(data.gt_2d.len(), 6);
        let spacing = VolumeGeometry::OCTA_3MM.spacing().map(|v| v as f32 as f64);
        assert_eq!(data.oct.pix_dim(), spacing);

        let stats = data.layers.layer_statistics();
        assert!(stats.iter().all(|&c| c > 0));
        assert!(data.layers.data().iter().all(|&p| is_layer(p)));
    }

    #[test]
    fn test_load_with_remap() {
        let ds = FakeDataset::new("load_remap", &[10301]);
        let layout = Octa500Layout::new(ds.root(), Fov::Mm3);
        let opts = LoadOptions {
            remap_top_layer: true,
            ..Default::default()
        };
        let data = SubjectData::load(&layout, 10301, &opts).unwrap();
        assert_eq!(data.layers.count(TOP_LAYER), 0);
    }

    #[test]
    fn test_missing_input() {
        let ds = FakeDataset::new("missing_input", &[10301]);
        std::fs::remove_file(ds.layout(Fov::Mm3).gt_2d(GtTag::Vein, 10301)).unwrap();
        let layout = Octa500Layout::new(ds.root(), Fov::Mm3);
        match SubjectData::load(&layout, 10301, &LoadOptions::default()) {
            Err(Error::MissingInput(p)) => assert!(p.ends_with("GT_Vein/10301.bmp")),
            other => panic!("unexpected result: {:?}", other.map(|d| d.id)),
        }
    }

    #[test]
    fn test_subject_loader() {
        let ds = FakeDataset::new("subject_loader", &[10301, 10302]);
        let loader = subject_loader(
            Octa500Layout::new(ds.root(), Fov::Mm3),
            [10302, 10301, 10303],
            LoadOptions::default(),
        );
        assert_eq!(loader.len(), 3);
        let results: Vec<(u32, bool)> = loader.map(|(id, r)| (id, r.is_ok())).collect();
        assert_eq!(results, [(10302, true), (10301, true), (10303, false)]);
    }
}
