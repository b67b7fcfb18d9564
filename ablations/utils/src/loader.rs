//! 对 `ct-tissue` 外部适配层的更一层封装. 从环境变量或家目录定位输入输出.

use ct_tissue::denoise::{default_model_path, ClassicalFallback, DenoiserHandle};
use ct_tissue::denoise::{BilateralParams, GaussianParams, NlMeansParams};
use ct_tissue::pipeline::PipelineConfig;
use ct_tissue::{CtScan, DensityImage, Result};
use std::env;
use std::path::{Path, PathBuf};

/// 获取 CT 体数据路径.
///
/// 1. 若环境变量 `$CT_TISSUE_SCAN` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/ct/volume.nii`.
///
/// 两者都无法确定时返回 `None`.
pub fn scan_path_from_env_or_home() -> Option<PathBuf> {
    match env::var_os("CT_TISSUE_SCAN") {
        Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => dirs::home_dir().map(|h| h.join("dataset").join("ct").join("volume.nii")),
    }
}

/// 获取水平切片索引. 若环境变量 `$CT_TISSUE_Z` 不是合法的非负整数, 则返回 `None`.
pub fn slice_index_from_env() -> Option<usize> {
    env::var("CT_TISSUE_Z").ok()?.trim().parse().ok()
}

/// 获取输出目录. 若环境变量 `$CT_TISSUE_OUT` 非空, 则返回其值, 否则返回 `outputs/final`.
pub fn output_dir_from_env() -> PathBuf {
    match env::var_os("CT_TISSUE_OUT") {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from("outputs").join("final"),
    }
}

/// 打开体数据, 取出第 `z` 层切片. `z` 为 `None` 时取中间层.
pub fn load_slice<P: AsRef<Path>>(path: P, z: Option<usize>) -> Result<DensityImage> {
    let scan = CtScan::open(path)?;
    let z = z.unwrap_or(scan.len_z() / 2);
    log::info!("读取第 {z} 层切片 (共 {} 层)", scan.len_z());
    scan.slice_at(z)
}

/// 从 `$CT_TISSUE_MODEL` 或 `$HOME/models/dncnn_compatible.onnx` 加载去噪模型.
/// 加载失败时返回空句柄.
pub fn model_handle_from_env_or_home() -> DenoiserHandle {
    match default_model_path() {
        Some(p) => DenoiserHandle::load(p),
        None => {
            log::warn!("无法确定模型路径. 降级为经典滤波去噪");
            DenoiserHandle::absent()
        }
    }
}

/// 由环境变量调整默认的流程参数.
///
/// - `$CT_TISSUE_FALLBACK`: 经典回退滤波, `nlm` (默认), `bilateral` 或 `gaussian`;
/// - `$CT_TISSUE_EQUALIZE`: 为 `1` 或 `true` 时, 对窗口化结果做直方图均衡化.
pub fn pipeline_config_from_env() -> PipelineConfig {
    let fallback = match env::var("CT_TISSUE_FALLBACK").as_deref().map(str::trim) {
        Ok("bilateral") => ClassicalFallback::Bilateral(BilateralParams::default()),
        Ok("gaussian") => ClassicalFallback::GaussianSmooth(GaussianParams::VISUAL),
        Ok("nlm") | Err(_) => ClassicalFallback::NonLocalMeans(NlMeansParams::default()),
        Ok(other) => {
            log::warn!("未知的回退滤波 `{other}`, 使用非局部均值");
            ClassicalFallback::default()
        }
    };
    let equalize = env::var("CT_TISSUE_EQUALIZE").is_ok_and(|v| matches!(v.trim(), "1" | "true"));
    PipelineConfig {
        fallback,
        equalize,
        ..Default::default()
    }
}
