use crate::consts::{SOFT_TISSUE_LEVEL, SOFT_TISSUE_WIDTH};
use crate::{DensityImage, VisualImage};

/// CT 窗口, 包含窗位 (window level) 和窗宽 (window width).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct CtWindow {
    level: f32,
    width: f32,
}

impl CtWindow {
    /// 构建 CT 窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<CtWindow> {
        if (-1e5..=1e5).contains(&level) && 0.0 < width && width <= 1e5 {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 构建常规的软组织窗. 该窗口的窗位为 40, 窗宽为 400.
    #[inline]
    pub const fn from_soft_tissue() -> CtWindow {
        Self {
            level: SOFT_TISSUE_LEVEL,
            width: SOFT_TISSUE_WIDTH,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前 CT 窗设置下, `ct` HU 值对应的灰度图像素整数值 (0 <= value <= 255),
    /// 四舍五入.
    ///
    /// 如果 `ct` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, ct: f32) -> Option<u8> {
        self.eval_f32(ct).map(|v| v.round() as u8)
    }

    /// 求在当前 CT 窗设置下, `ct` HU 值对应的灰度图像素分布点 (0.0 <= value <= 255.0).
    ///
    /// 如果 `ct` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval_f32(&self, ct: f32) -> Option<f32> {
        if !ct.is_finite() {
            return None;
        }
        let lb = self.lower_bound();
        let ub = self.upper_bound();
        if ct <= lb {
            Some(0.0)
        } else if ct >= ub {
            Some(255.0)
        } else {
            Some((ct - lb) / self.width() * 255.0)
        }
    }

    /// 将整张 HU 图像按当前窗口映射为单通道 8-bit 图像.
    pub fn render(&self, scan: &DensityImage) -> VisualImage {
        // `DensityImage` 保证所有值都有限, `eval` 不会返回 `None`.
        let gray = scan.view().mapv(|hu| self.eval(hu).unwrap_or_default());
        VisualImage::from_trusted(gray.insert_axis(ndarray::Axis(2)))
    }
}

impl Default for CtWindow {
    #[inline]
    fn default() -> Self {
        Self::from_soft_tissue()
    }
}
