//! 将 OCTA-500 数据集批量转换为 MONAI Label 可用的 nifti 数据目录.
//!
//! 已完成的受试者会被跳过, 因此中断后可直接重新运行.
//!
//! OCTA-500 的 `GT_FAZ3D/*.mat` 为 MAT v7.3 (HDF5) 文件, 读取它们需要以
//! `--features hdf5` 构建本程序 (需要系统 libhdf5). 否则每个受试者都会失败.

mod result;
mod runner;

use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use octa_berry::dataset::Fov;
use octa_berry::layers::UncoveredPolicy;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::process::ExitCode;

/// 最后一层边界以下的深度体素如何处理.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Uncovered {
    /// 填充为背景.
    Background,
    /// 视为最后一层的延伸.
    Extend,
    /// 视为该受试者失败.
    Reject,
}

impl From<Uncovered> for UncoveredPolicy {
    fn from(u: Uncovered) -> Self {
        match u {
            Uncovered::Background => UncoveredPolicy::Background,
            Uncovered::Extend => UncoveredPolicy::ExtendLastBand,
            Uncovered::Reject => UncoveredPolicy::Reject,
        }
    }
}

/// OCTA-500 -> MONAI Label 批量转换.
#[derive(Parser, Debug)]
#[command(
    name = "octa2monai",
    version,
    about,
    after_help = "读取 GT_FAZ3D 下的 MAT v7.3 文件需要以 `--features hdf5` 构建 (依赖系统 libhdf5)."
)]
pub struct Args {
    /// 数据集根目录. 默认为 `$OCTA500_DIR`, 其次为 `~/dataset/OCTA-500`.
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// 导出根目录. 默认为 `{dataset}/OCTA500_MONAI_{fov}`.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// 视场子集: `3mm` 或 `6mm`.
    #[arg(long, default_value = "3mm")]
    pub fov: Fov,

    /// 第一个受试者编号. 默认为视场子集的第一个受试者.
    #[arg(long)]
    pub first: Option<u32>,

    /// 最后一个受试者编号 (含). 默认为视场子集的最后一个受试者.
    #[arg(long)]
    pub last: Option<u32>,

    /// 反转切片栈的深度方向.
    #[arg(long)]
    pub z_inverse: bool,

    /// 将分层标签的顶层并入背景.
    #[arg(long)]
    pub remap_top_layer: bool,

    /// 最后一层边界以下的深度体素的处理方式.
    #[arg(long, value_enum, default_value_t = Uncovered::Background)]
    pub uncovered: Uncovered,

    /// 某个受试者失败后继续处理其余受试者.
    #[arg(long)]
    pub keep_going: bool,

    /// 并行处理受试者 (总是处理全部受试者).
    #[arg(long)]
    pub parallel: bool,

    /// 输出更详细的日志, 可重复.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    let result = runner::run(&args)?;
    result.analyze()?;

    Ok(if result.all_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
