//! 图像的持久化存储.

use crate::{BinaryMask, DensityImage, VisualImage};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 图像将以 "可视化友好" 的方式保存, 而不是 "as is" 的方式: 对于
/// [`DensityImage`] 这类以 CT HU 值存储的扫描, 在保存时会用软组织窗规范化.
/// 文件格式由 `path` 的扩展名决定.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 单通道图像存为灰度图, 三通道图像存为 RGB 图.
impl ImgWriteVis for VisualImage {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_dynamic_image().save(path)
    }
}

macro_rules! impl_gray_vis {
    ($($img: ty => $doc: literal, |$this: ident| $to_gray: expr);+ $(;)?) => {
        $(
            #[doc = $doc]
            impl ImgWriteVis for $img {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let $this = self;
                    let gray = $to_gray;
                    let (height, width) = gray.dim();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in gray.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_gray_vis!(
    BinaryMask => "成员像素为白色, 其余为黑色.", |m| m.view();
    DensityImage => "窗位 40, 窗宽 400.", |d| d.view().mapv(|hu| {
        const WINDOW: crate::CtWindow = crate::CtWindow::from_soft_tissue();
        WINDOW.eval(hu).unwrap_or_default()
    });
);

#[cfg(test)]
mod tests {
    use super::ImgWriteVis;
    use crate::{BinaryMask, DensityImage, VisualImage};
    use ndarray::{array, Array3};

    #[test]
    fn test_save_png() {
        let dir = std::env::temp_dir().join(format!("ct-tissue-save-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mask = BinaryMask::new(array![[0, 255], [255, 0]]).unwrap();
        mask.save(dir.join("mask.png")).unwrap();
        let back = image::open(dir.join("mask.png")).unwrap().into_luma8();
        assert_eq!(back.get_pixel(1, 0).0, [255]);
        assert_eq!(back.get_pixel(1, 1).0, [0]);

        let scan = DensityImage::new(array![[-1000.0, 40.0]]).unwrap();
        scan.save(dir.join("scan.png")).unwrap();
        let back = image::open(dir.join("scan.png")).unwrap().into_luma8();
        assert_eq!(back.get_pixel(1, 0).0, [128]);

        let mut rgb = Array3::zeros((2, 3, 3));
        rgb[(1, 2, 0)] = 200;
        VisualImage::new(rgb).unwrap().save(dir.join("rgb.png")).unwrap();
        let back = image::open(dir.join("rgb.png")).unwrap().into_rgb8();
        assert_eq!(back.get_pixel(2, 1).0, [200, 0, 0]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
