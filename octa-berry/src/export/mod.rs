//! 批量导出: OCTA-500 受试者 -> MONAI Label 数据目录.
//!
//! 每位受试者输出到 `{output}/{id}/`:
//!
//! - `vol_OCT.nii.gz`, `vol_OCTA.nii.gz`: 灰度体数据;
//! - `label_3D_FAZ.nii.gz`: 3D FAZ 掩膜;
//! - `label_2D_{Tag}.bmp`: 6 张二维真值图, 原样复制;
//! - `label_3D_Layers.nii.gz`: 分层标签. **最后写入**, 其存在即表示该受试者已完成.
//!
//! 重复运行时已完成的受试者会被跳过, 因此中断后可直接重新运行.

use crate::dataset::{
    ExportLayout, Fov, LoadOptions, Modality, Octa500Layout, SubjectData, LABEL_3D_LAYERS,
};
use crate::Result;
use log::{debug, error, info};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod report;

pub use report::{Outcome, SubjectReport};

/// 批量导出的配置.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExportConfig {
    /// OCTA-500 数据集根目录.
    pub dataset_root: PathBuf,

    /// 导出根目录. 为 `None` 时使用 `{dataset_root}/OCTA500_MONAI_{fov}`.
    pub output_root: Option<PathBuf>,

    /// 视场子集.
    pub fov: Fov,

    /// 受试者编号范围. 为 `None` 时使用视场子集的全部受试者.
    pub subjects: Option<RangeInclusive<u32>>,

    /// 加载选项.
    pub load: LoadOptions,

    /// 遇到第一个失败的受试者时是否立即停止. 只对串行的 [`run`] 有效.
    pub fail_fast: bool,
}

impl ExportConfig {
    /// 以 `dataset_root` 为数据集根目录, 其余选项取默认值 (3mm 视场, 遇错即停).
    pub fn new<P: AsRef<Path>>(dataset_root: P) -> Self {
        Self {
            dataset_root: dataset_root.as_ref().to_owned(),
            output_root: None,
            fov: Fov::default(),
            subjects: None,
            load: LoadOptions::default(),
            fail_fast: true,
        }
    }

    /// 实际的导出根目录.
    pub fn output_root(&self) -> PathBuf {
        self.output_root
            .clone()
            .unwrap_or_else(|| ExportLayout::default_root(&self.dataset_root, self.fov))
    }

    /// 实际处理的受试者编号.
    pub fn subject_ids(&self) -> RangeInclusive<u32> {
        self.subjects.clone().unwrap_or_else(|| self.fov.subjects())
    }

    /// 输入布局.
    #[inline]
    pub fn input_layout(&self) -> Octa500Layout {
        Octa500Layout::new(&self.dataset_root, self.fov)
    }

    /// 输出布局.
    #[inline]
    pub fn output_layout(&self) -> ExportLayout {
        ExportLayout::new(self.output_root())
    }
}

/// 将已加载的受试者数据写入导出目录. 分层标签最后写入.
fn write_subject(output: &ExportLayout, data: &SubjectData) -> Result<()> {
    let id = data.id;
    fs::create_dir_all(output.subject_dir(id))?;

    data.oct.save(output.volume(Modality::Oct, id))?;
    data.octa.save(output.volume(Modality::Octa, id))?;
    data.faz.save(output.faz_label(id))?;
    for (tag, src) in &data.gt_2d {
        let dst = output.gt_2d(*tag, id);
        debug!("subject {id}: copying {src:?} -> {dst:?}");
        fs::copy(src, dst)?;
    }

    // 先写临时文件再改名, 完成标记不会以半成品的形式出现.
    let partial = output.subject_dir(id).join(format!(".partial.{LABEL_3D_LAYERS}"));
    data.layers.save(&partial)?;
    fs::rename(&partial, output.layers_label(id))?;
    Ok(())
}

/// 导出单个受试者.
///
/// 已完成的受试者直接返回 [`Outcome::Skipped`]. 全部输入加载成功之前不会写入任何文件.
pub fn export_subject(
    input: &Octa500Layout,
    output: &ExportLayout,
    id: u32,
    opts: &LoadOptions,
) -> Result<Outcome> {
    if output.is_complete(id) {
        debug!("subject {id}: already exported, skipping");
        return Ok(Outcome::Skipped);
    }
    let data = SubjectData::load(input, id, opts)?;
    write_subject(output, &data)?;
    Ok(Outcome::Exported)
}

fn timed_export(
    input: &Octa500Layout,
    output: &ExportLayout,
    id: u32,
    opts: &LoadOptions,
) -> SubjectReport {
    let start = Instant::now();
    let result = export_subject(input, output, id, opts);
    SubjectReport {
        id,
        result,
        elapsed: start.elapsed(),
    }
}

fn log_report(report: &SubjectReport, done: usize, total: usize) {
    let id = report.id;
    match &report.result {
        Ok(Outcome::Exported) => info!("finished subject {id} ({done} of {total})"),
        Ok(Outcome::Skipped) => info!("skipped subject {id} ({done} of {total})"),
        Err(e) => error!("subject {id} failed: {e}"),
    }
}

/// 按编号顺序串行导出全部受试者, 返回每位受试者的报告.
///
/// `fail_fast` 为 `true` 时在第一个失败的受试者处停止, 返回值以该失败报告结尾.
pub fn run(config: &ExportConfig) -> Vec<SubjectReport> {
    let input = config.input_layout();
    let output = config.output_layout();
    let ids = config.subject_ids();
    let total = ids.clone().count();
    info!(
        "exporting {total} subjects from {:?} to {:?}",
        input.root(),
        output.root()
    );

    let mut reports = Vec::with_capacity(total);
    for (i, id) in ids.enumerate() {
        let report = timed_export(&input, &output, id, &config.load);
        log_report(&report, i + 1, total);
        let failed = !report.is_ok();
        reports.push(report);
        if failed && config.fail_fast {
            error!("stopping at subject {id}");
            break;
        }
    }
    reports
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
        use std::sync::atomic::{AtomicUsize, Ordering};
    }
}

/// 借助 `rayon` 并行导出全部受试者. 报告按编号顺序返回.
///
/// 受试者之间互不影响, 因此忽略 `fail_fast`, 每位受试者都会被处理.
#[cfg(feature = "rayon")]
pub fn par_run(config: &ExportConfig) -> Vec<SubjectReport> {
    let input = config.input_layout();
    let output = config.output_layout();
    let ids: Vec<u32> = config.subject_ids().collect();
    let total = ids.len();
    info!(
        "exporting {total} subjects in parallel from {:?} to {:?}",
        input.root(),
        output.root()
    );

    let done = AtomicUsize::new(0);
    ids.into_par_iter()
        .map(|id| {
            let report = timed_export(&input, &output, id, &config.load);
            log_report(&report, done.fetch_add(1, Ordering::Relaxed) + 1, total);
            report
        })
        .collect()
}
