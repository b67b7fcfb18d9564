//! 图片展示模块, 主要用于调试.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use crate::{BinaryMask, DensityImage, Idx2d, VisualImage};
use ndarray::ArrayView2;
use opencv::core::{Scalar, Size, Vec3b, CV_8UC1, CV_8UC3};
use opencv::highgui::{imshow, wait_key};
use opencv::prelude::{Mat, MatTrait};
use std::time::Duration;

/// 表明一个可以在窗口中可视化的对象.
pub trait ImgDisplay {
    /// 展示对象.
    fn show(&self) -> opencv::Result<()>;

    /// 同 `show()`, 但在之后自动等待一次用户按键输入.
    fn show_and_wait(&self) -> opencv::Result<i32> {
        self.show()?;
        wait_key(0)
    }

    /// 同 `show()`, 但在之后自动等待给定时间.
    fn show_and_wait_for(&self, d: Duration) -> opencv::Result<i32> {
        self.show()?;
        let ms = d.as_millis().min(i32::MAX as u128);
        wait_key(ms as i32)
    }
}

fn blank_mat((h, w): Idx2d, typ: i32) -> opencv::Result<Mat> {
    Mat::new_size_with_default(Size::new(w as i32, h as i32), typ, Scalar::from(0))
}

/// 将单通道数据按行优先格式存储为矩阵.
fn gray_to_opencv_mat(data: ArrayView2<u8>) -> opencv::Result<Mat> {
    let mut mat = blank_mat(data.dim(), CV_8UC1)?;
    for ((h, w), &pix) in data.indexed_iter() {
        *mat.at_2d_mut::<u8>(h as i32, w as i32)? = pix;
    }
    Ok(mat)
}

/// RGB 图像转换为 OpenCV 惯用的 BGR 矩阵.
fn rgb_to_opencv_mat(img: &VisualImage) -> opencv::Result<Mat> {
    let mut mat = blank_mat(img.shape(), CV_8UC3)?;
    let (height, width) = img.shape();
    for h in 0..height {
        for w in 0..width {
            let p = img.pixel((h, w));
            *mat.at_2d_mut::<Vec3b>(h as i32, w as i32)? = Vec3b::from([p[2], p[1], p[0]]);
        }
    }
    Ok(mat)
}

impl ImgDisplay for VisualImage {
    fn show(&self) -> opencv::Result<()> {
        let mat = if self.is_gray() {
            gray_to_opencv_mat(self.channel(0))?
        } else {
            rgb_to_opencv_mat(self)?
        };
        imshow("Image", &mat)
    }
}

/// 成员像素显示为白色.
impl ImgDisplay for BinaryMask {
    fn show(&self) -> opencv::Result<()> {
        imshow("Image", &gray_to_opencv_mat(self.view())?)
    }
}

/// 以软组织窗 (窗位 40, 窗宽 400) 可视化扫描.
impl ImgDisplay for DensityImage {
    fn show(&self) -> opencv::Result<()> {
        let img = crate::CtWindow::from_soft_tissue().render(self);
        imshow("Image", &gray_to_opencv_mat(img.channel(0))?)
    }
}
