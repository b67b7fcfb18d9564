//! 基于 ONNX Runtime 的残差去噪模型.
//!
//! # 注意
//!
//! 需要 `onnx` feature.

use super::ResidualModel;
use crate::{Error, Result};
use ndarray::{Array3, ArrayView3};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

/// DnCNN 风格的 ONNX 模型. 输入输出均为 `(1, C, H, W)` 的 `f32` 张量.
pub struct OnnxResidualModel {
    // `Session::run` 需要可变借用.
    session: Mutex<Session>,
}

impl OnnxResidualModel {
    /// 从文件加载模型. 模型必须至少有一个输入和一个输出.
    pub fn open(path: &Path) -> Result<Self> {
        let session = Session::builder()?.commit_from_file(path)?;
        if session.inputs.is_empty() || session.outputs.is_empty() {
            return Err(Error::ModelLoad {
                path: path.to_path_buf(),
                reason: "模型没有输入或输出".to_string(),
            });
        }
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl ResidualModel for OnnxResidualModel {
    fn predict_residual(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (c, h, w) = input.dim();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_array(([1usize, c, h, w], data))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("推理会话锁已失效".to_string()))?;
        let outputs = session.run(ort::inputs![tensor])?;
        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::Inference("模型没有输出".to_string()))?;

        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        if data.len() != c * h * w {
            return Err(Error::Inference(format!(
                "输出形状 {dims:?} 与输入 [1, {c}, {h}, {w}] 不符"
            )));
        }
        Ok(Array3::from_shape_vec((c, h, w), data.to_vec())?)
    }
}
