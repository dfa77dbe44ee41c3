//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{NiftiHeaderAttr, OctaLabel, OctaScan, VolumeGeometry};
pub use crate::layers::{
    build_label_volume, build_label_volume_with, LayerBoundaries, UncoveredPolicy,
};
pub use crate::stack::load_stack;

#[cfg(feature = "rayon")]
pub use crate::layers::par_build_label_volume_with;

pub use crate::consts::layer::{BACKGROUND, LAYER_COUNT, TOP_LAYER};
pub use crate::consts::{OCTA500_3MM_SUBJECTS, OCTA500_6MM_SUBJECTS, OCTA500_DEPTH};

pub use crate::dataset::{self, home_dataset_dir_with, octa500_home_dir, Fov, GtTag, Modality};
pub use crate::export::{self, ExportConfig, Outcome, SubjectReport};
pub use crate::monai::{SegmentationConfig, WeightFetcher};

pub use crate::{Error, Result};
