//! 🩻欢迎光临🦴
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx2d;
pub use crate::{Error, Result};

pub use crate::{BinaryMask, CtScan, CtWindow, DensityImage, ImgWriteVis, VisualImage};

#[cfg(feature = "plot")]
pub use crate::ImgDisplay;

pub use crate::consts::{AIR_HU, MODEL_PATH_ENV};

pub use crate::denoise::{
    default_model_path, BilateralParams, ClassicalFallback, DenoiseStrategy, Denoiser,
    DenoiserHandle, GaussianParams, NlMeansParams, ResidualModel,
};
pub use crate::overlay::{overlay, overlay_masks, OverlayStyle};
pub use crate::pipeline::{Flow, FlowOutput, Pipeline, PipelineConfig};
pub use crate::segment::{HuRange, SegmentConfig, SegmentStats, Segmenter, Tissue, TissueMasks};
