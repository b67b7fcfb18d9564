//! 残差去噪模型的句柄.

use crate::consts::{DEFAULT_MODEL_FILENAME, MODEL_PATH_ENV};
use crate::{Error, Result};
use ndarray::{Array3, ArrayView3};
use std::fmt;
use std::path::{Path, PathBuf};

/// 残差学习去噪模型: 输入含噪图像, 预测其中的噪声分量.
///
/// 输入形状为 `(通道, 高, 宽)`, 取值范围 \[0, 1\]. 返回的残差应与输入形状相同;
/// 形状不符, 输出为空或推理失败时, 调用方会回退到经典滤波.
///
/// 推理必须是输入的纯函数, 且可以被多个线程同时调用.
pub trait ResidualModel: Send + Sync {
    /// 预测残差.
    fn predict_residual(&self, input: ArrayView3<f32>) -> Result<Array3<f32>>;
}

/// 可能为空的残差模型句柄. 构造后只读.
///
/// 模型加载失败不是错误: [`DenoiserHandle::load`] 会记录一条警告并返回空句柄.
#[derive(Default)]
pub struct DenoiserHandle {
    model: Option<Box<dyn ResidualModel>>,
    source: Option<PathBuf>,
}

impl DenoiserHandle {
    /// 空句柄. 去噪器将直接使用经典滤波.
    #[inline]
    pub fn absent() -> Self {
        Self::default()
    }

    /// 包装一个已经就绪的模型.
    pub fn from_model<M: ResidualModel + 'static>(model: M) -> Self {
        Self {
            model: Some(Box::new(model)),
            source: None,
        }
    }

    /// 尝试从 `path` 加载 ONNX 模型. 任何失败都只记录一条警告, 并返回空句柄.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("{e}. 降级为经典滤波去噪");
                Self::absent()
            }
        }
    }

    /// 同 [`DenoiserHandle::load`], 但将失败原因作为 [`Error::ModelLoad`] 返回.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ModelLoad {
                path: path.to_path_buf(),
                reason: "文件不存在".to_string(),
            });
        }
        cfg_if::cfg_if! {
            if #[cfg(feature = "onnx")] {
                let model = super::onnx::OnnxResidualModel::open(path)?;
                log::info!("已加载残差去噪模型 {}", path.display());
                Ok(Self {
                    model: Some(Box::new(model)),
                    source: Some(path.to_path_buf()),
                })
            } else {
                Err(Error::ModelLoad {
                    path: path.to_path_buf(),
                    reason: "未启用 `onnx` feature".to_string(),
                })
            }
        }
    }

    /// 句柄是否持有模型?
    #[inline]
    pub fn is_present(&self) -> bool {
        self.model.is_some()
    }

    /// 模型文件路径. 由 [`DenoiserHandle::from_model`] 构建时为 `None`.
    #[inline]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    #[inline]
    pub(crate) fn model(&self) -> Option<&dyn ResidualModel> {
        self.model.as_deref()
    }
}

impl fmt::Debug for DenoiserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenoiserHandle")
            .field("present", &self.is_present())
            .field("source", &self.source)
            .finish()
    }
}

/// 默认的模型路径: 环境变量 `CT_TISSUE_MODEL`, 或 `~/models/dncnn_compatible.onnx`.
///
/// 两者都无法确定时返回 `None`.
pub fn default_model_path() -> Option<PathBuf> {
    match std::env::var_os(MODEL_PATH_ENV) {
        Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => dirs::home_dir().map(|home| home.join("models").join(DEFAULT_MODEL_FILENAME)),
    }
}
