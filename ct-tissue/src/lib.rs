#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 将单张 CT 水平切片 (HU 值) 转化为去噪后的、按组织分割并着色的可视化图像.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 只处理单张二维切片, 不做三维分割. 体数据的读取 ([`CtScan`])
//!   和窗口化 ([`CtWindow`]) 只是薄的外部适配层.
//! 2. 对于格式错误的输入 (空图像, 非有限 HU 值, 非法通道数),
//!   构造函数会直接返回 `Err`, 不会做任何隐式修正.
//! 3. 去噪模型缺失或推理失败不是错误: 程序会记录一条降级日志,
//!   然后使用经典滤波作为回退.
//!
//! # 功能概览
//!
//! ### 去噪前端 ✅
//!
//! 四种可互换策略: 残差学习网络 (DnCNN 风格, ONNX),
//! 非局部均值 (NLM), 双边滤波, 高斯平滑. 策略在构造时一次性选定.
//!
//! 实现位于 `ct-tissue/src/denoise`.
//!
//! ### 组织分割引擎 ✅
//!
//! 人体区域门控 → HU 区间分类 → 形态学清理 → 8-连通面积过滤 →
//! 层级排斥 (骨骼 > 肌肉/肌腱 > 脂肪). 三张掩膜由逐像素的组织标签投影得到,
//! 因此两两不相交.
//!
//! 实现位于 `ct-tissue/src/segment`.
//!
//! ### 二维形态学操作 ✅
//!
//! 椭圆结构元素 (与 OpenCV `MORPH_ELLIPSE` 同形) 的腐蚀、膨胀、开闭运算,
//! 空洞填充, 8-连通区域提取.
//!
//! 实现位于 `ct-tissue/src/morph`.
//!
//! ### 彩色叠加 ✅
//!
//! 实现位于 `ct-tissue/src/overlay.rs`.
//!
//! ### 三种对比流程 ✅
//!
//! 原始 / 经典 (高斯) / 进阶 (网络或 NLM). 可在 `rayon` feature 下并行运行.
//!
//! 实现位于 `ct-tissue/src/pipeline.rs`.

/// 二维索引 (高, 宽), 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 一个连通区域包含的全部像素索引.
type Area2d = Vec<Idx2d>;

/// 多个连通区域.
type Areas2d = Vec<Area2d>;

pub mod consts;

mod data;

pub use data::{
    BinaryMask, CtScan, CtWindow, DensityImage, ImgWriteVis, VisualImage,
};

#[cfg(feature = "plot")]
pub use data::ImgDisplay;

pub mod denoise;

mod error;

pub use error::{Error, Result};

pub mod morph;

pub mod overlay;

pub mod pipeline;

pub mod prelude;

pub mod segment;
