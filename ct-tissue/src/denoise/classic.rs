//! 经典滤波: 高斯平滑, 双边滤波与非局部均值 (NLM). 边界一律按 reflect-101 (`dcb|abcd|cba`) 外推.

use crate::{DensityImage, Error, Result, VisualImage};
use itertools::iproduct;
use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 高斯平滑参数.
#[derive(PartialEq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GaussianParams {
    /// 核边长, 必须为正奇数.
    pub ksize: usize,
    /// 标准差, 必须为正有限数.
    pub sigma: f32,
}

impl GaussianParams {
    /// 5x5, σ = 1. 用于可视化图像.
    pub const VISUAL: Self = Self {
        ksize: 5,
        sigma: 1.0,
    };

    /// 3x3, σ = 0.8. 没有模型时用于 HU 图像的轻度平滑.
    pub const DENSITY_LIGHT: Self = Self {
        ksize: 3,
        sigma: 0.8,
    };

    /// 检查参数是否合法.
    pub fn validate(&self) -> Result<()> {
        if self.ksize % 2 == 0 {
            return Err(Error::InvalidParameter {
                name: "ksize",
                reason: format!("高斯核边长必须为正奇数, 实际为 {}", self.ksize),
            });
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(Error::InvalidParameter {
                name: "sigma",
                reason: format!("标准差必须为正有限数, 实际为 {}", self.sigma),
            });
        }
        Ok(())
    }

    /// 归一化的一维高斯核.
    fn kernel(&self) -> Vec<f32> {
        let c = (self.ksize / 2) as f32;
        let denom = 2.0 * self.sigma * self.sigma;
        let raw: Vec<f32> = (0..self.ksize)
            .map(|i| (-(i as f32 - c).powi(2) / denom).exp())
            .collect();
        let sum: f32 = raw.iter().sum();
        raw.into_iter().map(|k| k / sum).collect()
    }
}

impl Default for GaussianParams {
    #[inline]
    fn default() -> Self {
        Self::VISUAL
    }
}

/// 非局部均值参数.
#[derive(PartialEq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NlMeansParams {
    /// 滤波强度. 越大越平滑, 也越容易抹掉细节.
    pub h: f32,
    /// 比较块边长, 必须为正奇数.
    pub template_window: usize,
    /// 搜索窗边长, 必须为正奇数, 且不小于比较块边长.
    pub search_window: usize,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            h: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

/// 权重低于该值时视为 0.
const WEIGHT_THRESHOLD: f32 = 0.001;

impl NlMeansParams {
    /// 检查参数是否合法.
    pub fn validate(&self) -> Result<()> {
        if !(self.h.is_finite() && self.h > 0.0) {
            return Err(Error::InvalidParameter {
                name: "h",
                reason: format!("滤波强度必须为正有限数, 实际为 {}", self.h),
            });
        }
        for (name, v) in [
            ("template_window", self.template_window),
            ("search_window", self.search_window),
        ] {
            if v % 2 == 0 {
                return Err(Error::InvalidParameter {
                    name,
                    reason: format!("窗口边长必须为正奇数, 实际为 {v}"),
                });
            }
        }
        if self.template_window > self.search_window {
            return Err(Error::InvalidParameter {
                name: "template_window",
                reason: "比较块不能大于搜索窗".to_string(),
            });
        }
        Ok(())
    }
}

/// 双边滤波参数. 默认值为直径 5, 颜色域 σ = 25, 空间域 σ = 7.
#[derive(PartialEq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BilateralParams {
    /// 邻域直径, 必须为正奇数. 只使用以该直径为界的圆形邻域.
    pub diameter: usize,
    /// 灰度差的标准差. 越小越能保留边缘.
    pub sigma_color: f32,
    /// 空间距离的标准差.
    pub sigma_space: f32,
}

impl Default for BilateralParams {
    fn default() -> Self {
        Self {
            diameter: 5,
            sigma_color: 25.0,
            sigma_space: 7.0,
        }
    }
}

impl BilateralParams {
    /// 检查参数是否合法.
    pub fn validate(&self) -> Result<()> {
        if self.diameter % 2 == 0 {
            return Err(Error::InvalidParameter {
                name: "diameter",
                reason: format!("邻域直径必须为正奇数, 实际为 {}", self.diameter),
            });
        }
        for (name, v) in [
            ("sigma_color", self.sigma_color),
            ("sigma_space", self.sigma_space),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::InvalidParameter {
                    name,
                    reason: format!("标准差必须为正有限数, 实际为 {v}"),
                });
            }
        }
        Ok(())
    }
}

/// reflect-101 边界下, 将可能越界的索引 `i` 映射回 `0..n`.
#[inline]
pub(crate) fn reflect101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// 四周按 reflect-101 各扩充 `pad` 个像素.
fn pad_reflect(plane: ArrayView2<f32>, pad: usize) -> Array2<f32> {
    let (h, w) = plane.dim();
    let p = pad as isize;
    Array2::from_shape_fn((h + 2 * pad, w + 2 * pad), |(i, j)| {
        plane[(
            reflect101(i as isize - p, h),
            reflect101(j as isize - p, w),
        )]
    })
}

/// 对每个像素求值, 在 `rayon` feature 下并行.
fn fill_indexed<F>(out: &mut Array2<f32>, f: F)
where
    F: Fn((usize, usize)) -> f32 + Sync,
{
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            Zip::indexed(out).par_for_each(|pos, o| *o = f(pos));
        } else {
            Zip::indexed(out).for_each(|pos, o| *o = f(pos));
        }
    }
}

/// 可分离卷积, 先水平后垂直.
fn separable(plane: ArrayView2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = plane.dim();
    let r = (kernel.len() / 2) as isize;

    let mut tmp = Array2::zeros((h, w));
    fill_indexed(&mut tmp, |(i, j)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, c)| c * plane[(i, reflect101(j as isize + k as isize - r, w))])
            .sum()
    });

    let mut out = Array2::zeros((h, w));
    fill_indexed(&mut out, |(i, j)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, c)| c * tmp[(reflect101(i as isize + k as isize - r, h), j)])
            .sum()
    });
    out
}

#[inline]
fn saturate_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// 对每个通道分别处理.
fn per_channel<F>(img: &VisualImage, f: F) -> VisualImage
where
    F: Fn(ArrayView2<f32>) -> Array2<f32>,
{
    let (h, w) = img.shape();
    let mut out = Array3::zeros((h, w, img.channels()));
    for (c, mut plane) in out.axis_iter_mut(Axis(2)).enumerate() {
        let src = img.channel(c).mapv(f32::from);
        Zip::from(&mut plane)
            .and(&f(src.view()))
            .for_each(|o, &v| *o = saturate_u8(v));
    }
    VisualImage::from_trusted(out)
}

/// 高斯平滑. 输出与输入分辨率, 通道数相同.
pub fn gaussian_blur(img: &VisualImage, params: &GaussianParams) -> Result<VisualImage> {
    params.validate()?;
    Ok(gaussian_blur_unchecked(img, params))
}

pub(crate) fn gaussian_blur_unchecked(img: &VisualImage, params: &GaussianParams) -> VisualImage {
    let kernel = params.kernel();
    per_channel(img, |plane| separable(plane, &kernel))
}

/// 对 HU 图像做高斯平滑, 保持浮点精度.
pub fn gaussian_blur_density(scan: &DensityImage, params: &GaussianParams) -> Result<DensityImage> {
    params.validate()?;
    Ok(gaussian_blur_density_unchecked(scan, params))
}

pub(crate) fn gaussian_blur_density_unchecked(
    scan: &DensityImage,
    params: &GaussianParams,
) -> DensityImage {
    // 加权平均不会产生非有限值.
    DensityImage::from_trusted(separable(scan.view(), &params.kernel()))
}

/// 双边滤波. 输出与输入分辨率, 通道数相同.
///
/// 邻点权重为 `exp(-s^2 / 2σs^2) * exp(-d^2 / 2σc^2)`, 其中 `s` 为空间距离,
/// `d` 为各通道灰度差绝对值之和. 多通道图像共享同一组权重.
pub fn bilateral(img: &VisualImage, params: &BilateralParams) -> Result<VisualImage> {
    params.validate()?;
    Ok(bilateral_unchecked(img, params))
}

pub(crate) fn bilateral_unchecked(img: &VisualImage, params: &BilateralParams) -> VisualImage {
    let (h, w) = img.shape();
    let cn = img.channels();
    let r = params.diameter / 2;
    let color_coeff = -0.5 / (params.sigma_color * params.sigma_color);
    let space_coeff = -0.5 / (params.sigma_space * params.sigma_space);

    let ri = r as isize;
    let offsets: Vec<(usize, usize, f32)> = iproduct!(-ri..=ri, -ri..=ri)
        .filter(|(dy, dx)| dy * dy + dx * dx <= ri * ri)
        .map(|(dy, dx)| {
            let dist2 = (dy * dy + dx * dx) as f32;
            ((dy + ri) as usize, (dx + ri) as usize, (dist2 * space_coeff).exp())
        })
        .collect();
    let planes: Vec<Array2<f32>> = (0..cn)
        .map(|c| pad_reflect(img.channel(c).mapv(f32::from).view(), r))
        .collect();

    let mut acc = Array3::<f32>::zeros((h, w, cn));
    let offsets = &offsets;
    let planes = &planes;
    let step = |(i, j): (usize, usize), mut px: ndarray::ArrayViewMut1<f32>| {
        let mut wsum = 0.0f32;
        for &(oy, ox, space_weight) in offsets {
            let (y, x) = (i + oy, j + ox);
            let d: f32 = planes
                .iter()
                .map(|p| (p[(y, x)] - p[(i + r, j + r)]).abs())
                .sum();
            let weight = space_weight * (d * d * color_coeff).exp();
            for (slot, p) in px.iter_mut().zip(planes) {
                *slot += weight * p[(y, x)];
            }
            wsum += weight;
        }
        // 中心点的权重恒为 1.
        px.mapv_inplace(|v| v / wsum);
    };
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            Zip::indexed(acc.lanes_mut(Axis(2))).par_for_each(step);
        } else {
            Zip::indexed(acc.lanes_mut(Axis(2))).for_each(step);
        }
    }
    VisualImage::from_trusted(acc.mapv(saturate_u8))
}

/// 非局部均值去噪. 输出与输入分辨率, 通道数相同.
///
/// 两个比较块的距离为逐像素平方差在块内及所有通道上的均值 `d`, 权重为
/// `exp(-d / h^2)`, 低于 0.001 的权重被忽略. 多通道图像共享同一组权重.
pub fn nl_means(img: &VisualImage, params: &NlMeansParams) -> Result<VisualImage> {
    params.validate()?;
    Ok(nl_means_unchecked(img, params))
}

pub(crate) fn nl_means_unchecked(img: &VisualImage, params: &NlMeansParams) -> VisualImage {
    let (h, w) = img.shape();
    let cn = img.channels();
    let tr = params.template_window / 2;
    let sr = params.search_window / 2;
    let pad = tr + sr;
    let t_side = 2 * tr + 1;
    let norm = 1.0 / ((t_side * t_side * cn) as f32 * params.h * params.h);

    let planes: Vec<Array2<f32>> = (0..cn)
        .map(|c| pad_reflect(img.channel(c).mapv(f32::from).view(), pad))
        .collect();

    // 比较块距离所需的平方差区域, 比原图每边多出 `tr`.
    let (dh, dw) = (h + 2 * tr, w + 2 * tr);
    let mut integral = Array2::<f64>::zeros((dh + 1, dw + 1));
    let mut acc = Array3::<f32>::zeros((h, w, cn));
    let mut wsum = Array2::<f32>::zeros((h, w));

    let r = sr as isize;
    for (oy, ox) in iproduct!(-r..=r, -r..=r) {
        // 平方差的积分图.
        for y in 0..dh {
            let mut row = 0.0f64;
            for x in 0..dw {
                let (ay, ax) = (y + sr, x + sr);
                let (by, bx) = ((ay as isize + oy) as usize, (ax as isize + ox) as usize);
                let d: f32 = planes
                    .iter()
                    .map(|p| (p[(ay, ax)] - p[(by, bx)]).powi(2))
                    .sum();
                row += d as f64;
                integral[(y + 1, x + 1)] = integral[(y, x + 1)] + row;
            }
        }

        let integral = integral.view();
        let planes = &planes;
        let step = |(i, j): (usize, usize), mut px: ndarray::ArrayViewMut1<f32>, ws: &mut f32| {
            let (i1, j1) = (i + t_side, j + t_side);
            let ssd = integral[(i1, j1)] - integral[(i, j1)] - integral[(i1, j)]
                + integral[(i, j)];
            let weight = (-(ssd as f32) * norm).exp();
            if weight < WEIGHT_THRESHOLD {
                return;
            }
            let (by, bx) = (
                (i as isize + pad as isize + oy) as usize,
                (j as isize + pad as isize + ox) as usize,
            );
            for (slot, p) in px.iter_mut().zip(planes) {
                *slot += weight * p[(by, bx)];
            }
            *ws += weight;
        };
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                Zip::indexed(acc.lanes_mut(Axis(2)))
                    .and(&mut wsum)
                    .par_for_each(step);
            } else {
                Zip::indexed(acc.lanes_mut(Axis(2)))
                    .and(&mut wsum)
                    .for_each(step);
            }
        }
    }

    // 中心偏移 (0, 0) 的权重恒为 1, `wsum` 不会为 0.
    let mut out = Array3::<u8>::zeros((h, w, cn));
    Zip::from(out.lanes_mut(Axis(2)))
        .and(acc.lanes(Axis(2)))
        .and(&wsum)
        .for_each(|mut o, a, &ws| {
            for (o, a) in o.iter_mut().zip(a) {
                *o = saturate_u8(a / ws);
            }
        });
    VisualImage::from_trusted(out)
}
