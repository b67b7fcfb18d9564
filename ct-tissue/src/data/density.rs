use crate::{Error, Idx2d, Result};
use ndarray::{Array2, ArrayView2};
use std::ops::Index;

/// 拥有所有权的二维 CT HU 值图像, 每个像素一个 `f32`.
///
/// 该结构保证:
///
/// 1. 图像非空;
/// 2. 所有像素值都是有限数 (没有 NaN 和无穷大).
///
/// 这两条性质在构造时检查, 之后图像只读, 因此下游算法不需要再次校验.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityImage {
    data: Array2<f32>,
}

impl DensityImage {
    /// 校验并构建 HU 图像.
    ///
    /// 如果 `data` 为空则返回 [`Error::EmptyImage`];
    /// 如果存在非有限值, 则返回指向第一个 (行优先) 非法像素的
    /// [`Error::NonFiniteDensity`].
    pub fn new(data: Array2<f32>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyImage);
        }
        if let Some((pos, &value)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteDensity { pos, value });
        }
        Ok(Self { data })
    }

    /// 构建一个分辨率为 `shape`, 所有像素值均为 `hu` 的图像.
    pub fn filled(shape: Idx2d, hu: f32) -> Result<Self> {
        Self::new(Array2::from_elem(shape, hu))
    }

    /// 内部构造. 调用方保证 `data` 满足不变量.
    #[inline]
    pub(crate) fn from_trusted(data: Array2<f32>) -> Self {
        debug_assert!(!data.is_empty());
        debug_assert!(data.iter().all(|v| v.is_finite()));
        Self { data }
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView2<f32> {
        self.data.view()
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 获得图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 获取给定位置 (高, 宽) 的 HU 值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, CT HU 值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }

    /// 获得图像中最小和最大的 HU 值.
    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<f32> {
        self.data
    }
}

impl Index<Idx2d> for DensityImage {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl TryFrom<Array2<f32>> for DensityImage {
    type Error = Error;

    #[inline]
    fn try_from(value: Array2<f32>) -> Result<Self> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DensityImage;
    use crate::Error;
    use ndarray::{array, Array2};

    #[test]
    fn test_reject_empty() {
        let e = DensityImage::new(Array2::zeros((0, 4))).unwrap_err();
        assert!(matches!(e, Error::EmptyImage));
    }

    #[test]
    fn test_reject_non_finite() {
        let e = DensityImage::new(array![[0.0, 1.0], [f32::NAN, 2.0]]).unwrap_err();
        assert!(matches!(e, Error::NonFiniteDensity { pos: (1, 0), .. }));

        let e = DensityImage::new(array![[f32::INFINITY]]).unwrap_err();
        assert!(matches!(e, Error::NonFiniteDensity { pos: (0, 0), .. }));
    }

    #[test]
    fn test_min_max() {
        let img = DensityImage::new(array![[-1000.0, 40.0], [700.0, 3.5]]).unwrap();
        assert_eq!(img.min_max(), (-1000.0, 700.0));
        assert_eq!(img.shape(), (2, 2));
        assert_eq!(img[(1, 0)], 700.0);
    }
}
