//! 程序运行函数.

use crate::result::ExportResult;
use crate::Args;
use anyhow::{bail, Context};
use log::{info, warn};
use octa_berry::dataset::LoadOptions;
use octa_berry::export::{self, ExportConfig};
use std::time::Instant;
use utils::loader;

/// 由命令行参数构造导出配置.
pub fn config_from_args(args: &Args) -> anyhow::Result<ExportConfig> {
    let dataset = match &args.dataset {
        Some(d) => d.clone(),
        None => loader::dataset_dir_from_env_or_home()
            .context("cannot locate the dataset, please pass `--dataset`")?,
    };

    let all = args.fov.subjects();
    let first = args.first.unwrap_or(*all.start());
    let last = args.last.unwrap_or(*all.end());
    if first > last {
        bail!("empty subject range {first}..={last}");
    }

    Ok(ExportConfig {
        output_root: Some(loader::output_dir_or_default(
            args.output.clone(),
            &dataset,
            args.fov,
        )),
        dataset_root: dataset,
        fov: args.fov,
        subjects: Some(first..=last),
        load: LoadOptions {
            z_inverse: args.z_inverse,
            remap_top_layer: args.remap_top_layer,
            uncovered: args.uncovered.into(),
        },
        fail_fast: !args.keep_going,
    })
}

/// 实际运行.
pub fn run(args: &Args) -> anyhow::Result<ExportResult> {
    let config = config_from_args(args)?;
    if !config.dataset_root.is_dir() {
        bail!("dataset directory {:?} does not exist", config.dataset_root);
    }

    if !octa_berry::mat::V73_SUPPORTED {
        warn!("built without the `hdf5` feature, MAT v7.3 FAZ files cannot be read");
    }

    let start = Instant::now();
    let reports = if args.parallel {
        info!("running on {} cores", utils::cpus());
        export::par_run(&config)
    } else {
        export::run(&config)
    };
    Ok(ExportResult::new(reports, start.elapsed()))
}
