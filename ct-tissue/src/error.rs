//! 运行时错误.

use crate::Idx2d;
use std::path::PathBuf;
use thiserror::Error;

/// 本 crate 的统一错误类型.
///
/// 输入校验类错误 (前五项) 和参数错误表示调用方的编程或配置失误, 会一直传播给调用方;
/// 模型相关的错误会被去噪前端就地吸收并回退到经典滤波, 一般不会出现在公开接口的返回值中.
#[derive(Error, Debug)]
pub enum Error {
    /// 图像没有任何像素.
    #[error("图像为空")]
    EmptyImage,

    /// HU 图像中出现了 NaN 或无穷大.
    #[error("位置 {pos:?} 的 HU 值不是有限数: {value}")]
    NonFiniteDensity {
        /// 第一个出错像素的 (高, 宽) 索引.
        pos: Idx2d,
        /// 出错的值.
        value: f32,
    },

    /// 可视化图像的通道数既不是 1 也不是 3.
    #[error("不支持的通道数: {0}, 只允许 1 (灰度) 或 3 (RGB)")]
    UnsupportedChannels(usize),

    /// 二值掩膜中出现了 0 和 255 以外的值.
    #[error("位置 {pos:?} 的掩膜值为 {value}, 只允许 0 或 255")]
    NotBinary {
        /// 第一个出错像素的 (高, 宽) 索引.
        pos: Idx2d,
        /// 出错的值.
        value: u8,
    },

    /// 两张图像的分辨率 (高, 宽) 不一致.
    #[error("图像形状不一致: 期望 {expected:?}, 实际 {actual:?}")]
    ShapeMismatch {
        /// 期望的形状.
        expected: Idx2d,
        /// 实际的形状.
        actual: Idx2d,
    },

    /// 配置参数不合法.
    #[error("参数 `{name}` 不合法: {reason}")]
    InvalidParameter {
        /// 参数名.
        name: &'static str,
        /// 原因.
        reason: String,
    },

    /// 水平切片索引越界.
    #[error("水平切片索引 {z} 越界, 共有 {len} 层")]
    SliceOutOfRange {
        /// 请求的索引.
        z: usize,
        /// 切片总层数.
        len: usize,
    },

    /// 模型文件无法加载, 或加载后不可用.
    #[error("无法加载去噪模型 {path}: {reason}")]
    ModelLoad {
        /// 模型路径.
        path: PathBuf,
        /// 原因.
        reason: String,
    },

    /// 模型推理失败, 或输出不可用.
    #[error("模型推理失败: {0}")]
    Inference(String),

    /// ONNX Runtime 底层错误.
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime 错误: {0}")]
    Onnx(#[from] ort::Error),

    /// nifti 文件读取错误.
    #[error("nifti 读取错误: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 数组形状转换错误.
    #[error("数组形状错误: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// 图像编码/保存错误.
    #[error("图像保存错误: {0}")]
    Image(#[from] image::ImageError),

    /// IO 错误.
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 本 crate 的运行时结果类型.
pub type Result<T> = std::result::Result<T, Error>;
