use std::path::Path;

use ndarray::{Array3, ArrayView3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{DensityImage, Error, Idx2d, Result};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// nii 格式 3D CT 扫描, 包括 header 和 CT 扫描 (HU). HU 值以 `f32` 保存.
///
/// 数据按 `(z, 高, 宽)` 访问.
#[derive(Debug, Clone)]
pub struct CtScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl CtScan {
    /// 打开 nii 文件格式的 3D CT 扫描. `path` 为 nii 文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        let data = obj.into_volume().into_ndarray::<f32>()?;
        if data.ndim() != 3 {
            return Err(Error::InvalidParameter {
                name: "volume",
                reason: format!("只支持三维体数据, 实际为 {} 维", data.ndim()),
            });
        }

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = data
            .permuted_axes([2, 1, 0].as_slice())
            .into_dimensionality::<Ix3>()?
            .as_standard_layout()
            .into_owned();

        Ok(Self { header, data })
    }

    /// 由内存中按 `(z, 高, 宽)` 组织的体数据直接构建扫描. header 为默认值.
    ///
    /// 空数据返回 [`Error::EmptyImage`].
    pub fn from_array(data: Array3<f32>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyImage);
        }
        Ok(Self {
            header: BoxedHeader::default(),
            data,
        })
    }

    /// 获取 header 部分.
    #[inline]
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.data.dim();
        (h, w)
    }

    /// 获取 width 方向 (自然 2D 图像的水平方向) 体素分辨率, 以毫米为单位.
    #[inline]
    pub fn width_mm(&self) -> f64 {
        self.header.pixdim[1] as f64
    }

    /// 获取 height 方向 (自然 2D 图像的垂直方向) 体素分辨率, 以毫米为单位.
    #[inline]
    pub fn height_mm(&self) -> f64 {
        self.header.pixdim[2] as f64
    }

    /// 复制 3D 扫描 z 空间的第 `z` 层切片, 作为独立的 HU 图像.
    ///
    /// `z` 越界时返回 [`Error::SliceOutOfRange`]; 切片包含非有限值时返回
    /// [`Error::NonFiniteDensity`].
    pub fn slice_at(&self, z: usize) -> Result<DensityImage> {
        let len = self.len_z();
        if z >= len {
            return Err(Error::SliceOutOfRange { z, len });
        }
        DensityImage::new(self.data.index_axis(Axis(0), z).to_owned())
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }
}

#[cfg(test)]
mod tests {
    use super::CtScan;
    use crate::Error;
    use ndarray::{Array3, Axis};

    fn scan() -> CtScan {
        let mut data = Array3::from_elem((3, 4, 5), -1024.0);
        data.index_axis_mut(Axis(0), 1).fill(40.0);
        CtScan::from_array(data).unwrap()
    }

    #[test]
    fn test_slice_at() {
        let s = scan();
        assert_eq!(s.len_z(), 3);
        assert_eq!(s.slice_shape(), (4, 5));

        let sli = s.slice_at(1).unwrap();
        assert_eq!(sli.shape(), (4, 5));
        assert_eq!(sli.min_max(), (40.0, 40.0));
    }

    #[test]
    fn test_slice_out_of_range() {
        let e = scan().slice_at(3).unwrap_err();
        assert!(matches!(e, Error::SliceOutOfRange { z: 3, len: 3 }));
    }

    #[test]
    fn test_empty_volume() {
        let e = CtScan::from_array(Array3::zeros((0, 4, 4))).unwrap_err();
        assert!(matches!(e, Error::EmptyImage));
    }
}
