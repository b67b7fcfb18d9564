//! 三种对比流程: 原始, 经典 (高斯), 进阶 (网络或 NLM).
//!
//! | 流程         | 可视化图像                | 送入分割的 HU 图像                          |
//! |--------------|---------------------------|---------------------------------------------|
//! | `Original`   | 窗口化结果                | 原始 HU                                     |
//! | `Classic`    | 5x5, σ = 1 高斯平滑       | 5x5, σ = 1 高斯平滑                         |
//! | `Advanced`   | 去噪前端 (网络或 NLM)     | [`Denoiser::denoise_density`]               |
//!
//! 打开 [`PipelineConfig::equalize`] 时, 窗口化结果先做直方图均衡化, 再进入各流程.
//! 均衡化只影响可视化图像, 分割始终使用 HU 值.

use crate::denoise::{
    gaussian_blur, gaussian_blur_density, ClassicalFallback, DenoiseStrategy, Denoiser,
    DenoiserHandle, GaussianParams,
};
use crate::overlay::{overlay_masks, OverlayStyle};
use crate::segment::{SegmentConfig, SegmentStats, Segmenter, TissueMasks};
use crate::{CtWindow, DensityImage, Error, Result, VisualImage};
use std::borrow::Cow;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 处理流程.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Flow {
    /// 不做任何去噪.
    Original,
    /// 高斯平滑.
    Classic,
    /// 去噪前端.
    Advanced,
}

impl Flow {
    /// 全部流程, 按上表顺序.
    pub const ALL: [Flow; 3] = [Flow::Original, Flow::Classic, Flow::Advanced];

    /// 小写名称, 可用作文件名前缀.
    pub fn name(&self) -> &'static str {
        match self {
            Flow::Original => "original",
            Flow::Classic => "classic",
            Flow::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个流程的输出.
#[derive(Clone, Debug)]
pub struct FlowOutput {
    /// 所属流程.
    pub flow: Flow,
    /// 可视化 (可能已去噪) 图像.
    pub visual: VisualImage,
    /// 分割结果.
    pub masks: TissueMasks,
    /// 分割统计.
    pub stats: SegmentStats,
    /// 彩色叠加图.
    pub overlay: VisualImage,
}

/// 流程参数.
#[derive(PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipelineConfig {
    /// 可视化窗位.
    pub window_level: f32,
    /// 可视化窗宽.
    pub window_width: f32,
    /// 窗口化后是否做直方图均衡化.
    pub equalize: bool,
    /// 分割参数.
    pub segment: SegmentConfig,
    /// 叠加样式.
    pub overlay: OverlayStyle,
    /// 去噪前端的经典回退.
    pub fallback: ClassicalFallback,
    /// `Classic` 流程使用的高斯参数.
    pub classic_smooth: GaussianParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let window = CtWindow::from_soft_tissue();
        Self {
            window_level: window.level(),
            window_width: window.width(),
            equalize: false,
            segment: SegmentConfig::default(),
            overlay: OverlayStyle::default(),
            fallback: ClassicalFallback::default(),
            classic_smooth: GaussianParams::VISUAL,
        }
    }
}

impl PipelineConfig {
    /// 检查参数是否合法.
    pub fn validate(&self) -> Result<()> {
        self.window()?;
        self.segment.validate()?;
        self.overlay.validate()?;
        self.fallback.validate()?;
        self.classic_smooth.validate()
    }

    fn window(&self) -> Result<CtWindow> {
        CtWindow::new(self.window_level, self.window_width).ok_or_else(|| {
            Error::InvalidParameter {
                name: "window",
                reason: format!("窗位 {}, 窗宽 {}", self.window_level, self.window_width),
            }
        })
    }
}

/// 完整的处理流程. 构造后只读, 可在线程间共享.
#[derive(Debug)]
pub struct Pipeline {
    window: CtWindow,
    equalize: bool,
    segmenter: Segmenter,
    denoiser: Denoiser,
    overlay: OverlayStyle,
    classic_smooth: GaussianParams,
}

impl Pipeline {
    /// 校验参数并构建流程. 去噪模型句柄由调用方加载后注入.
    pub fn new(config: PipelineConfig, handle: DenoiserHandle) -> Result<Self> {
        config.validate()?;
        let window = config.window()?;
        Ok(Self {
            window,
            equalize: config.equalize,
            segmenter: Segmenter::new(config.segment)?,
            denoiser: Denoiser::new(handle, config.fallback)?,
            overlay: config.overlay,
            classic_smooth: config.classic_smooth,
        })
    }

    /// 去噪前端选定的策略.
    #[inline]
    pub fn strategy(&self) -> DenoiseStrategy {
        self.denoiser.strategy()
    }

    /// 分割器.
    #[inline]
    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// 去噪器.
    #[inline]
    pub fn denoiser(&self) -> &Denoiser {
        &self.denoiser
    }

    /// 运行单个流程.
    pub fn run(&self, scan: &DensityImage, flow: Flow) -> Result<FlowOutput> {
        let rendered = self.window.render(scan);
        let windowed = if self.equalize {
            rendered.equalize_hist()
        } else {
            rendered
        };
        let (visual, density) = match flow {
            Flow::Original => (windowed, Cow::Borrowed(scan)),
            Flow::Classic => (
                gaussian_blur(&windowed, &self.classic_smooth)?,
                Cow::Owned(gaussian_blur_density(scan, &self.classic_smooth)?),
            ),
            Flow::Advanced => (
                self.denoiser.denoise(&windowed),
                Cow::Owned(self.denoiser.denoise_density(scan)),
            ),
        };

        let (masks, stats) = self.segmenter.segment_with_stats(&density);
        let overlay = overlay_masks(&visual, &masks, &self.overlay)?;
        log::info!(
            "[{flow}] 骨骼 {} px, 肌肉 {} px, 脂肪 {} px",
            stats.kept.bone,
            stats.kept.muscle,
            stats.kept.fat
        );
        Ok(FlowOutput {
            flow,
            visual,
            masks,
            stats,
            overlay,
        })
    }

    /// 依次运行全部流程.
    pub fn run_all(&self, scan: &DensityImage) -> Result<Vec<FlowOutput>> {
        Flow::ALL.iter().map(|&flow| self.run(scan, flow)).collect()
    }

    /// 并行运行全部流程. 输出顺序与 [`Flow::ALL`] 相同.
    #[cfg(feature = "rayon")]
    pub fn par_run_all(&self, scan: &DensityImage) -> Result<Vec<FlowOutput>> {
        use rayon::prelude::*;

        Flow::ALL
            .par_iter()
            .map(|&flow| self.run(scan, flow))
            .collect()
    }
}
