//! 去噪前端.
//!
//! 三种可互换的策略在 [`Denoiser::new`] 时一次性选定:
//!
//! 1. 句柄持有模型时使用残差学习网络 ([`DenoiseStrategy::LearnedResidual`]);
//! 2. 否则使用配置的经典滤波: 非局部均值 (默认), 双边滤波或高斯平滑.
//!
//! 即使选定了网络, 单次推理失败 (出错, 形状不符, 空输出) 也只会记录一条警告,
//! 该次调用由经典滤波完成. 输出与输入的分辨率和通道数始终相同.

mod classic;
mod handle;
#[cfg(feature = "onnx")]
mod onnx;

pub use classic::{
    bilateral, gaussian_blur, gaussian_blur_density, nl_means, BilateralParams, GaussianParams,
    NlMeansParams,
};
pub use handle::{default_model_path, DenoiserHandle, ResidualModel};
#[cfg(feature = "onnx")]
pub use onnx::OnnxResidualModel;

use crate::{DensityImage, Error, Result, VisualImage};
use ndarray::{Array2, Array3, Axis, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 去噪策略.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DenoiseStrategy {
    /// 残差学习网络.
    LearnedResidual,
    /// 非局部均值.
    NonLocalMeans,
    /// 双边滤波.
    Bilateral,
    /// 高斯平滑.
    GaussianSmooth,
}

/// 没有模型 (或模型失败) 时使用的经典滤波.
#[derive(PartialEq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClassicalFallback {
    /// 非局部均值. 去噪效果更好, 但更慢.
    NonLocalMeans(NlMeansParams),
    /// 双边滤波. 保边平滑, 速度介于另外两者之间.
    Bilateral(BilateralParams),
    /// 高斯平滑.
    GaussianSmooth(GaussianParams),
}

impl Default for ClassicalFallback {
    #[inline]
    fn default() -> Self {
        Self::NonLocalMeans(NlMeansParams::default())
    }
}

impl ClassicalFallback {
    /// 对应的策略.
    #[inline]
    pub fn strategy(&self) -> DenoiseStrategy {
        match self {
            Self::NonLocalMeans(_) => DenoiseStrategy::NonLocalMeans,
            Self::Bilateral(_) => DenoiseStrategy::Bilateral,
            Self::GaussianSmooth(_) => DenoiseStrategy::GaussianSmooth,
        }
    }

    /// 检查参数是否合法.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::NonLocalMeans(p) => p.validate(),
            Self::Bilateral(p) => p.validate(),
            Self::GaussianSmooth(p) => p.validate(),
        }
    }

    fn apply(&self, img: &VisualImage) -> VisualImage {
        match self {
            Self::NonLocalMeans(p) => classic::nl_means_unchecked(img, p),
            Self::Bilateral(p) => classic::bilateral_unchecked(img, p),
            Self::GaussianSmooth(p) => classic::gaussian_blur_unchecked(img, p),
        }
    }
}

/// 去噪器. 构造后只读, 可在线程间共享.
#[derive(Debug)]
pub struct Denoiser {
    handle: DenoiserHandle,
    fallback: ClassicalFallback,
    strategy: DenoiseStrategy,
}

impl Denoiser {
    /// 构建去噪器, 并一次性选定策略.
    pub fn new(handle: DenoiserHandle, fallback: ClassicalFallback) -> Result<Self> {
        fallback.validate()?;
        let strategy = if handle.is_present() {
            DenoiseStrategy::LearnedResidual
        } else {
            log::info!("没有可用的去噪模型, 使用 {:?}", fallback.strategy());
            fallback.strategy()
        };
        Ok(Self {
            handle,
            fallback,
            strategy,
        })
    }

    /// 选定的策略. 若为经典滤波, 说明程序运行在降级模式.
    #[inline]
    pub fn strategy(&self) -> DenoiseStrategy {
        self.strategy
    }

    /// 经典滤波配置.
    #[inline]
    pub fn fallback(&self) -> &ClassicalFallback {
        &self.fallback
    }

    /// 去噪. 输出与输入的分辨率和通道数相同.
    pub fn denoise(&self, img: &VisualImage) -> VisualImage {
        let Some(model) = self.handle.model() else {
            return self.fallback.apply(img);
        };
        match residual_denoise(model, img) {
            Ok(out) => out,
            Err(e) => {
                log::warn!("{e}. 本次调用降级为 {:?}", self.fallback.strategy());
                self.fallback.apply(img)
            }
        }
    }

    /// 对 HU 图像去噪.
    ///
    /// 有模型时, 先按图像的最小/最大 HU 值线性映射到 8-bit, 去噪后将结果的最小/最大值
    /// 线性拉伸回原 HU 区间 (min-max 归一化). 去噪结果只有一种灰度时, 所有像素取原最小值;
    /// 没有模型或推理失败时, 使用 3x3, σ = 0.8 的高斯平滑.
    pub fn denoise_density(&self, scan: &DensityImage) -> DensityImage {
        let smooth = |scan: &DensityImage| {
            classic::gaussian_blur_density_unchecked(scan, &GaussianParams::DENSITY_LIGHT)
        };
        let Some(model) = self.handle.model() else {
            return smooth(scan);
        };

        let (lo, hi) = scan.min_max();
        let span = hi - lo;
        if span <= f32::EPSILON {
            return scan.clone();
        }
        let gray = scan.view().mapv(|hu| ((hu - lo) / span * 255.0).round() as u8);
        let img = VisualImage::from_trusted(gray.insert_axis(Axis(2)));
        match residual_denoise(model, &img) {
            Ok(out) => {
                let ch = out.channel(0);
                let (omin, omax) = ch
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(a, b), &v| (a.min(v), b.max(v)));
                let data = if omax > omin {
                    let scale = span / f32::from(omax - omin);
                    ch.mapv(|v| f32::from(v - omin) * scale + lo)
                } else {
                    Array2::from_elem(ch.dim(), lo)
                };
                DensityImage::from_trusted(data)
            }
            Err(e) => {
                log::warn!("{e}. 本次 HU 去噪降级为高斯平滑");
                smooth(scan)
            }
        }
    }
}

/// 残差学习: `clamp(x - model(x), 0, 1)`, 其中 `x` 为归一化到 \[0, 1\] 的输入.
fn residual_denoise(model: &dyn ResidualModel, img: &VisualImage) -> Result<VisualImage> {
    // (h, w, c) -> (c, h, w)
    let input = img
        .view()
        .permuted_axes([2, 0, 1])
        .mapv(|v| v as f32 / 255.0)
        .as_standard_layout()
        .into_owned();

    let residual = model.predict_residual(input.view())?;
    if residual.is_empty() {
        return Err(Error::Inference("模型输出为空".to_string()));
    }
    if residual.dim() != input.dim() {
        return Err(Error::Inference(format!(
            "残差形状 {:?} 与输入 {:?} 不符",
            residual.dim(),
            input.dim()
        )));
    }
    if residual.iter().any(|r| !r.is_finite()) {
        return Err(Error::Inference("残差包含非有限值".to_string()));
    }

    let mut out = Array3::<u8>::zeros(input.dim());
    Zip::from(&mut out)
        .and(&input)
        .and(&residual)
        .for_each(|o, &x, &r| *o = ((x - r).clamp(0.0, 1.0) * 255.0).round() as u8);

    // (c, h, w) -> (h, w, c)
    let out = out.permuted_axes([1, 2, 0]).as_standard_layout().into_owned();
    Ok(VisualImage::from_trusted(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3, ArrayView3};

    fn init_log() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    }

    /// 预测常数残差.
    struct ConstResidual(f32);

    impl ResidualModel for ConstResidual {
        fn predict_residual(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
            Ok(Array3::from_elem(input.dim(), self.0))
        }
    }

    struct Failing;

    impl ResidualModel for Failing {
        fn predict_residual(&self, _: ArrayView3<f32>) -> Result<Array3<f32>> {
            Err(Error::Inference("boom".to_string()))
        }
    }

    struct EmptyOutput;

    impl ResidualModel for EmptyOutput {
        fn predict_residual(&self, _: ArrayView3<f32>) -> Result<Array3<f32>> {
            Ok(Array3::zeros((0, 0, 0)))
        }
    }

    struct WrongShape;

    impl ResidualModel for WrongShape {
        fn predict_residual(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
            let (c, h, w) = input.dim();
            Ok(Array3::zeros((c, h + 1, w)))
        }
    }

    fn gradient(h: usize, w: usize) -> VisualImage {
        VisualImage::from_gray(Array2::from_shape_fn((h, w), |(i, j)| (i * 16 + j * 4) as u8))
            .unwrap()
    }

    fn gaussian() -> ClassicalFallback {
        ClassicalFallback::GaussianSmooth(GaussianParams::VISUAL)
    }

    #[test]
    fn test_absent_handle_uses_fallback() {
        init_log();
        let d = Denoiser::new(DenoiserHandle::absent(), ClassicalFallback::default()).unwrap();
        assert_eq!(d.strategy(), DenoiseStrategy::NonLocalMeans);
        let d = Denoiser::new(DenoiserHandle::absent(), gaussian()).unwrap();
        assert_eq!(d.strategy(), DenoiseStrategy::GaussianSmooth);

        let img = gradient(12, 10);
        let out = d.denoise(&img);
        assert_eq!(out.shape(), img.shape());
        assert_eq!(out.channels(), 1);
    }

    #[test]
    fn test_forced_load_failure() {
        init_log();
        let handle = DenoiserHandle::load("/definitely/not/here/dncnn.onnx");
        assert!(!handle.is_present());
        assert!(matches!(
            DenoiserHandle::try_load("/definitely/not/here/dncnn.onnx"),
            Err(Error::ModelLoad { .. })
        ));
        let d = Denoiser::new(handle, ClassicalFallback::default()).unwrap();
        assert_eq!(d.strategy(), DenoiseStrategy::NonLocalMeans);
    }

    #[test]
    fn test_zero_residual_is_identity() {
        let d = Denoiser::new(DenoiserHandle::from_model(ConstResidual(0.0)), gaussian()).unwrap();
        assert_eq!(d.strategy(), DenoiseStrategy::LearnedResidual);
        let img = gradient(8, 8);
        assert_eq!(d.denoise(&img), img);

        let rgb = img.to_rgb();
        assert_eq!(d.denoise(&rgb), rgb);
    }

    #[test]
    fn test_residual_is_clamped() {
        let img = gradient(8, 8);

        let d = Denoiser::new(DenoiserHandle::from_model(ConstResidual(2.0)), gaussian()).unwrap();
        assert!(d.denoise(&img).view().iter().all(|&v| v == 0));

        let d = Denoiser::new(DenoiserHandle::from_model(ConstResidual(-2.0)), gaussian()).unwrap();
        assert!(d.denoise(&img).view().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_bad_model_falls_back_per_call() {
        init_log();
        let img = gradient(10, 10);
        let expected = gaussian_blur(&img, &GaussianParams::VISUAL).unwrap();

        let d = Denoiser::new(DenoiserHandle::from_model(Failing), gaussian()).unwrap();
        assert_eq!(d.strategy(), DenoiseStrategy::LearnedResidual);
        assert_eq!(d.denoise(&img), expected);

        let d = Denoiser::new(DenoiserHandle::from_model(EmptyOutput), gaussian()).unwrap();
        assert_eq!(d.denoise(&img), expected);

        let d = Denoiser::new(DenoiserHandle::from_model(WrongShape), gaussian()).unwrap();
        assert_eq!(d.denoise(&img), expected);
    }

    #[test]
    fn test_bilateral_fallback() {
        let fallback = ClassicalFallback::Bilateral(BilateralParams::default());
        let d = Denoiser::new(DenoiserHandle::absent(), fallback).unwrap();
        assert_eq!(d.strategy(), DenoiseStrategy::Bilateral);

        let img = gradient(9, 12);
        let expected = bilateral(&img, &BilateralParams::default()).unwrap();
        assert_eq!(d.denoise(&img), expected);

        let d = Denoiser::new(DenoiserHandle::from_model(Failing), fallback).unwrap();
        assert_eq!(d.denoise(&img), expected);
    }

    #[test]
    fn test_invalid_fallback() {
        let bad = ClassicalFallback::GaussianSmooth(GaussianParams { ksize: 2, sigma: 1.0 });
        assert!(Denoiser::new(DenoiserHandle::absent(), bad).is_err());
    }

    #[test]
    fn test_denoise_density() {
        let scan = DensityImage::new(Array2::from_shape_fn((6, 6), |(i, j)| {
            -1000.0 + (i * 6 + j) as f32 * 40.0
        }))
        .unwrap();

        // 零残差: 仅有 8-bit 量化误差.
        let d = Denoiser::new(DenoiserHandle::from_model(ConstResidual(0.0)), gaussian()).unwrap();
        let out = d.denoise_density(&scan);
        let (lo, hi) = scan.min_max();
        let step = (hi - lo) / 255.0;
        for (pos, &hu) in scan.indexed_iter() {
            assert!((out[pos] - hu).abs() <= step);
        }

        // 没有模型时为 3x3 高斯平滑.
        let d = Denoiser::new(DenoiserHandle::absent(), gaussian()).unwrap();
        let expected = gaussian_blur_density(&scan, &GaussianParams::DENSITY_LIGHT).unwrap();
        assert_eq!(d.denoise_density(&scan), expected);

        // 推理失败时同样回退.
        let d = Denoiser::new(DenoiserHandle::from_model(Failing), gaussian()).unwrap();
        assert_eq!(d.denoise_density(&scan), expected);

        // 残差整体偏移后, 结果仍被拉伸回原 HU 区间.
        let d = Denoiser::new(DenoiserHandle::from_model(ConstResidual(0.1)), gaussian()).unwrap();
        let (out_lo, out_hi) = d.denoise_density(&scan).min_max();
        assert!((out_lo - lo).abs() < 1e-2);
        assert!((out_hi - hi).abs() < 1e-2);

        // 均匀图像保持不变.
        let flat = DensityImage::filled((4, 4), 35.0).unwrap();
        let d = Denoiser::new(DenoiserHandle::from_model(ConstResidual(0.3)), gaussian()).unwrap();
        assert_eq!(d.denoise_density(&flat), flat);
    }

    #[test]
    fn test_default_model_path() {
        let p = default_model_path();
        if std::env::var_os(crate::consts::MODEL_PATH_ENV).is_none() {
            if let Some(p) = p {
                assert!(p.ends_with("models/dncnn_compatible.onnx"));
            }
        }
    }
}
