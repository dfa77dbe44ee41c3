//! 对 `octa-berry::dataset` 的更一层封装. 提供数据集目录的定位.

use octa_berry::dataset::{self, ExportLayout, Fov};
use std::env;
use std::path::{Path, PathBuf};

/// 指定数据集根目录的环境变量.
pub const DATASET_ENV: &str = "OCTA500_DIR";

/// 获取 OCTA-500 数据集根目录.
///
/// 1. 若环境变量 `$OCTA500_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/OCTA-500`;
/// 3. 无法确定用户主目录时返回 `None`.
pub fn dataset_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(DATASET_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::octa500_home_dir(),
    }
}

/// 获取导出根目录. 未指定时为 `{dataset}/OCTA500_MONAI_{fov}`.
pub fn output_dir_or_default<P: AsRef<Path>>(
    output: Option<PathBuf>,
    dataset: P,
    fov: Fov,
) -> PathBuf {
    output.unwrap_or_else(|| ExportLayout::default_root(dataset, fov))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_or_default() {
        assert_eq!(
            output_dir_or_default(None, "/d", Fov::Mm3),
            Path::new("/d/OCTA500_MONAI_3mm")
        );
        assert_eq!(
            output_dir_or_default(Some("/o".into()), "/d", Fov::Mm6),
            Path::new("/o")
        );
    }
}
