//! MONAI Label 视网膜分层分割任务的配置解析.
//!
//! MONAI Label 以字符串键值对的形式传入任务配置. 本模块将其解析为类型化的任务计划:
//! 标签表, 模型文件路径, 预训练权重的处理方式, 网络超参数, 推理/训练参数,
//! 主动学习策略与打分方法. 网络本身的训练和推理不在本 crate 的范围内.
//!
//! 支持的配置项:
//!
//! | 键 | 类型 | 默认值 |
//! |---|---|---|
//! | `labels` | 逗号分隔的标签名 | 6 个视网膜分层标签 |
//! | `use_pretrained_model` | bool | `true` |
//! | `pretrained_path` | URL | [`DEFAULT_PRETRAINED_BASE`] |
//! | `epistemic_enabled` | bool | `false` |
//! | `epistemic_samples` | 整数 | `5` |
//! | `preload` | bool | `false` |

use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 预训练权重的默认下载地址前缀.
pub const DEFAULT_PRETRAINED_BASE: &str =
    "https://github.com/Project-MONAI/MONAILabel/releases/download/data";

/// 预训练权重文件名.
pub const PRETRAINED_WEIGHTS_FILE: &str = "radiology_segmentation_segresnet_multilabel.pt";

/// 默认标签表. 0 为背景.
pub const DEFAULT_LABELS: [(&str, u32); 6] = [
    ("ILM-IPL", 1),
    ("IPL-OPL", 2),
    ("OPL-ISOS", 3),
    ("ISOS-RPE", 4),
    ("RPE-BM", 5),
    ("sub-BM", 6),
];

/// 目标体素间距 (毫米).
pub const TARGET_SPACING: [f64; 3] = [0.01233552, 0.01233552, 0.00625];

/// 推理/训练时的 ROI 大小.
pub const ROI_SIZE: [usize; 3] = [128, 128, 128];

/// 训练任务的描述.
pub const TRAIN_DESCRIPTION: &str = "Train Segmentation Model";

/// 配置项取值不合法.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 无法解析为布尔值.
    #[error("配置项 `{key}` 的值 `{value}` 不是合法的布尔值")]
    InvalidBool {
        /// 配置项.
        key: String,
        /// 原始值.
        value: String,
    },

    /// 无法解析为非负整数.
    #[error("配置项 `{key}` 的值 `{value}` 不是合法的整数")]
    InvalidInt {
        /// 配置项.
        key: String,
        /// 原始值.
        value: String,
    },

    /// `labels` 中存在空的标签名.
    #[error("标签列表 `{0}` 中存在空的标签名")]
    EmptyLabel(String),

    /// `labels` 中存在重复的标签名.
    #[error("标签 `{0}` 重复出现")]
    DuplicateLabel(String),
}

/// 按 `strtobool` 的规则解析布尔值 (不区分大小写):
/// `y, yes, t, true, on, 1` 为真, `n, no, f, false, off, 0` 为假, 其余为 `None`.
pub fn strtobool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn conf_bool(
    conf: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match conf.get(key) {
        None => Ok(default),
        Some(v) => strtobool(v).ok_or_else(|| ConfigError::InvalidBool {
            key: key.to_owned(),
            value: v.clone(),
        }),
    }
}

fn conf_usize(
    conf: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match conf.get(key) {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_owned(),
            value: v.clone(),
        }),
    }
}

/// 解析逗号分隔的标签名, 编号从 1 开始. 标签名两端的空白会被去除.
fn parse_labels(raw: &str) -> Result<BTreeMap<String, u32>, ConfigError> {
    let mut labels = BTreeMap::new();
    for (name, idx) in raw.split(',').map(str::trim).zip(1..) {
        if name.is_empty() {
            return Err(ConfigError::EmptyLabel(raw.to_owned()));
        }
        if labels.insert(name.to_owned(), idx).is_some() {
            return Err(ConfigError::DuplicateLabel(name.to_owned()));
        }
    }
    Ok(labels)
}

/// SegResNet 网络的超参数.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegResNetSpec {
    /// 空间维数.
    pub spatial_dims: usize,
    /// 输入通道数.
    pub in_channels: usize,
    /// 输出通道数, 即标签个数加背景.
    pub out_channels: usize,
    /// 初始卷积核个数.
    pub init_filters: usize,
    /// 下采样各级的残差块个数.
    pub blocks_down: [usize; 4],
    /// 上采样各级的残差块个数.
    pub blocks_up: [usize; 3],
    /// dropout 概率.
    pub dropout_prob: f64,
}

impl SegResNetSpec {
    /// 对 `label_count` 个前景标签分割的网络.
    pub fn for_labels(label_count: usize) -> Self {
        Self {
            spatial_dims: 3,
            in_channels: 1,
            out_channels: label_count + 1,
            init_filters: 32,
            blocks_down: [1, 2, 2, 4],
            blocks_up: [1, 1, 1],
            dropout_prob: 0.2,
        }
    }
}

/// 模型文件路径.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelPaths {
    /// `{model_dir}/pretrained_{name}.pt`.
    pub pretrained: PathBuf,

    /// `{model_dir}/{name}.pt`.
    pub published: PathBuf,
}

/// 初始化时对预训练权重文件的处理.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PretrainedAction {
    /// 文件不存在时从 `url` 下载到 `dest`.
    Download {
        /// 下载地址.
        url: String,
        /// 保存路径.
        dest: PathBuf,
    },

    /// 删除该文件. 使用自定义标签时, 通用预训练权重的输出通道数与网络不符.
    Discard(PathBuf),

    /// 不做任何处理.
    Keep,
}

/// 推理任务的参数.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InferSpec {
    /// 依次尝试的模型文件.
    pub model_paths: [PathBuf; 2],
    /// 网络.
    pub network: SegResNetSpec,
    /// ROI 大小.
    pub roi_size: [usize; 3],
    /// 目标体素间距.
    pub target_spacing: [f64; 3],
    /// 标签表.
    pub labels: BTreeMap<String, u32>,
    /// 是否在启动时预加载模型.
    pub preload: bool,
    /// 后处理时是否只保留最大连通分量.
    pub largest_cc: bool,
}

/// 训练任务的参数.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainSpec {
    /// 训练输出目录 `{model_dir}/{name}`.
    pub output_dir: PathBuf,
    /// 网络.
    pub network: SegResNetSpec,
    /// ROI 大小.
    pub roi_size: [usize; 3],
    /// 目标体素间距.
    pub target_spacing: [f64; 3],
    /// 初始权重. 预训练文件存在时取之, 否则取已发布的模型.
    pub load_path: PathBuf,
    /// 训练结果的发布路径.
    pub publish_path: PathBuf,
    /// 任务描述.
    pub description: String,
    /// 标签表.
    pub labels: BTreeMap<String, u32>,
}

/// 主动学习策略.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// 按认知不确定性挑选待标注数据.
    Epistemic,
}

/// 打分方法.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScoringMethod {
    /// Dice 系数.
    Dice,

    /// 标签体素和.
    Sum,

    /// 多次 dropout 采样估计的认知不确定性.
    Epistemic {
        /// 依次尝试的模型文件.
        model_paths: [PathBuf; 2],
        /// 网络.
        network: SegResNetSpec,
        /// 采样次数.
        num_samples: usize,
    },
}

/// 预训练权重的下载能力, 由调用方提供.
pub trait WeightFetcher {
    /// 将 `url` 处的文件下载到 `dest`.
    fn fetch(&self, url: &str, dest: &Path) -> io::Result<()>;
}

/// 解析后的分割任务配置.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentationConfig {
    /// 任务名.
    pub name: String,
    /// 模型目录.
    pub model_dir: PathBuf,
    /// 标签表, 标签名 -> 编号.
    pub labels: BTreeMap<String, u32>,
    /// 标签表是否来自 `labels` 配置项.
    pub custom_labels: bool,
    /// 模型文件.
    pub paths: ModelPaths,
    /// 对预训练权重的处理.
    pub pretrained: PretrainedAction,
    /// 目标体素间距.
    pub target_spacing: [f64; 3],
    /// ROI 大小.
    pub roi_size: [usize; 3],
    /// 网络.
    pub network: SegResNetSpec,
    /// 是否启用 epistemic 主动学习.
    pub epistemic_enabled: bool,
    /// epistemic 采样次数.
    pub epistemic_samples: usize,
    /// 是否预加载模型.
    pub preload: bool,
}

impl SegmentationConfig {
    /// 解析任务 `name` 的配置. 模型文件位于 `model_dir` 下.
    ///
    /// `labels` 为空串时视为未设置.
    pub fn resolve<P: AsRef<Path>>(
        name: &str,
        model_dir: P,
        conf: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let model_dir = model_dir.as_ref().to_owned();
        let custom = conf.get("labels").filter(|s| !s.trim().is_empty());
        let labels = match custom {
            Some(raw) => parse_labels(raw)?,
            None => DEFAULT_LABELS
                .iter()
                .map(|&(name, idx)| (name.to_owned(), idx))
                .collect(),
        };

        let paths = ModelPaths {
            pretrained: model_dir.join(format!("pretrained_{name}.pt")),
            published: model_dir.join(format!("{name}.pt")),
        };

        let pretrained = if custom.is_some() {
            PretrainedAction::Discard(paths.pretrained.clone())
        } else if conf_bool(conf, "use_pretrained_model", true)? {
            let base = conf
                .get("pretrained_path")
                .map(String::as_str)
                .unwrap_or(DEFAULT_PRETRAINED_BASE);
            PretrainedAction::Download {
                url: format!("{base}/{PRETRAINED_WEIGHTS_FILE}"),
                dest: paths.pretrained.clone(),
            }
        } else {
            PretrainedAction::Keep
        };

        let epistemic_enabled = conf_bool(conf, "epistemic_enabled", false)?;
        let epistemic_samples = conf_usize(conf, "epistemic_samples", 5)?;
        let preload = conf_bool(conf, "preload", false)?;
        info!("epistemic enabled: {epistemic_enabled}; samples: {epistemic_samples}");

        Ok(Self {
            name: name.to_owned(),
            network: SegResNetSpec::for_labels(labels.len()),
            labels,
            custom_labels: custom.is_some(),
            model_dir,
            paths,
            pretrained,
            target_spacing: TARGET_SPACING,
            roi_size: ROI_SIZE,
            epistemic_enabled,
            epistemic_samples,
            preload,
        })
    }

    /// 两个模型文件, 预训练权重在前.
    #[inline]
    fn model_paths(&self) -> [PathBuf; 2] {
        [self.paths.pretrained.clone(), self.paths.published.clone()]
    }

    /// 执行预训练权重的处理: 下载 (目标已存在时跳过) 或删除.
    pub fn prepare(&self, fetcher: &dyn WeightFetcher) -> io::Result<()> {
        match &self.pretrained {
            PretrainedAction::Download { url, dest } => {
                if dest.exists() {
                    debug!("pretrained weights {dest:?} already exist");
                    return Ok(());
                }
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                info!("downloading {url} -> {dest:?}");
                fetcher.fetch(url, dest)
            }
            PretrainedAction::Discard(path) => match std::fs::remove_file(path) {
                Ok(()) => {
                    info!("removed pretrained weights {path:?} (custom labels)");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            },
            PretrainedAction::Keep => Ok(()),
        }
    }

    /// 推理任务参数. `largest_cc` 由调用方根据运行环境决定.
    pub fn infer_spec(&self, largest_cc: bool) -> InferSpec {
        InferSpec {
            model_paths: self.model_paths(),
            network: self.network.clone(),
            roi_size: self.roi_size,
            target_spacing: self.target_spacing,
            labels: self.labels.clone(),
            preload: self.preload,
            largest_cc,
        }
    }

    /// 训练任务参数. 初始权重的选择取决于调用时预训练文件是否存在.
    pub fn trainer_spec(&self) -> TrainSpec {
        let load_path = if self.paths.pretrained.exists() {
            self.paths.pretrained.clone()
        } else {
            self.paths.published.clone()
        };
        TrainSpec {
            output_dir: self.model_dir.join(&self.name),
            network: self.network.clone(),
            roi_size: self.roi_size,
            target_spacing: self.target_spacing,
            load_path,
            publish_path: self.paths.published.clone(),
            description: TRAIN_DESCRIPTION.to_owned(),
            labels: self.labels.clone(),
        }
    }

    /// 主动学习策略. 只在启用 epistemic 时非空.
    pub fn strategies(&self) -> BTreeMap<String, Strategy> {
        let mut ans = BTreeMap::new();
        if self.epistemic_enabled {
            ans.insert(format!("{}_epistemic", self.name), Strategy::Epistemic);
        }
        ans
    }

    /// 打分方法. 总是包含 `dice` 和 `sum`.
    pub fn scoring_methods(&self) -> BTreeMap<String, ScoringMethod> {
        let mut ans = BTreeMap::new();
        ans.insert("dice".to_owned(), ScoringMethod::Dice);
        ans.insert("sum".to_owned(), ScoringMethod::Sum);
        if self.epistemic_enabled {
            ans.insert(
                format!("{}_epistemic", self.name),
                ScoringMethod::Epistemic {
                    model_paths: self.model_paths(),
                    network: SegResNetSpec::for_labels(self.labels.len()),
                    num_samples: self.epistemic_samples,
                },
            );
        }
        ans
    }
}
