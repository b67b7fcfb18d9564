use crate::{Error, Idx2d, Result};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};

/// 拥有所有权的 8-bit 可视化图像, 单通道 (灰度) 或三通道 (RGB).
///
/// 数据按 `(高, 宽, 通道)` 存储.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualImage {
    data: Array3<u8>,
}

impl VisualImage {
    /// 校验并构建可视化图像. `data` 的形状为 `(高, 宽, 通道)`.
    ///
    /// 空图像返回 [`Error::EmptyImage`]; 通道数不是 1 或 3 时返回
    /// [`Error::UnsupportedChannels`].
    pub fn new(data: Array3<u8>) -> Result<Self> {
        let (_, _, c) = data.dim();
        if c != 1 && c != 3 {
            return Err(Error::UnsupportedChannels(c));
        }
        if data.is_empty() {
            return Err(Error::EmptyImage);
        }
        Ok(Self { data })
    }

    /// 从二维灰度数据构建单通道图像.
    #[inline]
    pub fn from_gray(data: Array2<u8>) -> Result<Self> {
        Self::new(data.insert_axis(Axis(2)))
    }

    /// 内部构造. 调用方保证 `data` 满足不变量.
    #[inline]
    pub(crate) fn from_trusted(data: Array3<u8>) -> Self {
        debug_assert!(!data.is_empty());
        debug_assert!(matches!(data.dim().2, 1 | 3));
        Self { data }
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView3<u8> {
        self.data.view()
    }

    /// 获得第 `c` 个通道的二维视图.
    ///
    /// 当 `c` 越界时 panic.
    #[inline]
    pub fn channel(&self, c: usize) -> ArrayView2<u8> {
        self.data.index_axis(Axis(2), c)
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let (h, w, _) = self.data.dim();
        (h, w)
    }

    /// 通道数, 1 或 3.
    #[inline]
    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// 是否为单通道灰度图?
    #[inline]
    pub fn is_gray(&self) -> bool {
        self.channels() == 1
    }

    /// 获得 `pos` 处所有通道的像素值.
    ///
    /// 当 `pos` 越界时 panic.
    #[inline]
    pub fn pixel(&self, (h, w): Idx2d) -> ArrayView1<u8> {
        self.data.slice(s![h, w, ..])
    }

    /// 获得三通道版本. 如果已经是三通道, 则直接克隆; 灰度图会被复制到三个通道.
    pub fn to_rgb(&self) -> VisualImage {
        if !self.is_gray() {
            return self.clone();
        }
        let (h, w) = self.shape();
        let mut out = Array3::<u8>::zeros((h, w, 3));
        for mut plane in out.axis_iter_mut(Axis(2)) {
            plane.assign(&self.channel(0));
        }
        Self { data: out }
    }

    /// 直方图均衡化, 各通道独立处理.
    ///
    /// 最小灰度映射为 0, 其余灰度按累积直方图线性拉伸到 255. 只有一种灰度的通道保持不变.
    pub fn equalize_hist(&self) -> VisualImage {
        let mut out = self.data.clone();
        for mut plane in out.axis_iter_mut(Axis(2)) {
            let mut hist = [0usize; 256];
            plane.iter().for_each(|&v| hist[v as usize] += 1);
            let total = plane.len();
            let Some(first) = hist.iter().position(|&n| n > 0) else {
                continue;
            };
            if hist[first] == total {
                continue;
            }

            let scale = 255.0 / (total - hist[first]) as f32;
            let mut lut = [0u8; 256];
            let mut sum = 0;
            for (l, &n) in lut.iter_mut().zip(&hist).skip(first + 1) {
                sum += n;
                *l = (sum as f32 * scale).round().min(255.0) as u8;
            }
            plane.mapv_inplace(|v| lut[v as usize]);
        }
        Self { data: out }
    }

    /// 转换为 `image` crate 的图像对象.
    pub fn to_dynamic_image(&self) -> DynamicImage {
        let (h, w) = self.shape();
        let (h, w) = (h as u32, w as u32);
        let d = &self.data;
        if self.is_gray() {
            DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
                Luma([d[(y as usize, x as usize, 0)]])
            }))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                let (y, x) = (y as usize, x as usize);
                Rgb([d[(y, x, 0)], d[(y, x, 1)], d[(y, x, 2)]])
            }))
        }
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::VisualImage;
    use crate::Error;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn test_reject_bad_channels() {
        let e = VisualImage::new(Array3::zeros((2, 2, 2))).unwrap_err();
        assert!(matches!(e, Error::UnsupportedChannels(2)));
        let e = VisualImage::new(Array3::zeros((0, 2, 1))).unwrap_err();
        assert!(matches!(e, Error::EmptyImage));
    }

    #[test]
    fn test_gray_to_rgb() {
        let g = VisualImage::from_gray(array![[1, 2], [3, 4]]).unwrap();
        assert!(g.is_gray());
        let rgb = g.to_rgb();
        assert_eq!(rgb.channels(), 3);
        assert_eq!(rgb.shape(), (2, 2));
        for c in 0..3 {
            assert_eq!(rgb.channel(c), g.channel(0));
        }
        assert_eq!(rgb.pixel((1, 0)), array![3, 3, 3]);
    }

    #[test]
    fn test_equalize_hist() {
        let g = VisualImage::from_gray(array![[10, 10], [20, 30]]).unwrap();
        assert_eq!(g.equalize_hist().channel(0), array![[0, 0], [128, 255]]);

        let flat = VisualImage::from_gray(Array2::from_elem((3, 3), 90)).unwrap();
        assert_eq!(flat.equalize_hist(), flat);

        let rgb = VisualImage::new(Array3::from_shape_fn((4, 4, 3), |(i, j, c)| {
            (i * 4 + j + c * 50) as u8
        }))
        .unwrap();
        let eq = rgb.equalize_hist();
        for c in 0..3 {
            let ch = eq.channel(c);
            assert_eq!(ch[(0, 0)], 0);
            assert_eq!(ch[(3, 3)], 255);
        }
    }

    #[test]
    fn test_to_dynamic_image() {
        let g = VisualImage::from_gray(array![[1, 2, 3], [4, 5, 6]]).unwrap();
        let img = g.to_dynamic_image().into_luma8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [6]);
    }
}
