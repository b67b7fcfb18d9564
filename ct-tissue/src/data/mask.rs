use crate::consts::gray::*;
use crate::{Error, Idx2d, Result};
use ndarray::{Array2, ArrayView2, Zip};
use std::ops::Index;

/// 拥有所有权的二维二值掩膜. 像素值只能是 [`MASK_OFF`] (0) 或 [`MASK_ON`] (255).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    data: Array2<u8>,
}

impl BinaryMask {
    /// 校验并构建掩膜.
    ///
    /// 空掩膜返回 [`Error::EmptyImage`]; 存在 0 和 255 以外的值时,
    /// 返回指向第一个 (行优先) 非法像素的 [`Error::NotBinary`].
    pub fn new(data: Array2<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyImage);
        }
        if let Some((pos, &value)) = data.indexed_iter().find(|(_, p)| !is_binary(**p)) {
            return Err(Error::NotBinary { pos, value });
        }
        Ok(Self { data })
    }

    /// 全为 [`MASK_OFF`] 的掩膜.
    #[inline]
    pub fn zeros(shape: Idx2d) -> Self {
        Self {
            data: Array2::from_elem(shape, MASK_OFF),
        }
    }

    /// 由布尔图构建掩膜, `true` 映射为 [`MASK_ON`].
    pub fn from_bools(flags: ArrayView2<bool>) -> Self {
        Self {
            data: flags.mapv(|b| if b { MASK_ON } else { MASK_OFF }),
        }
    }

    /// 转换为布尔图, [`MASK_ON`] 映射为 `true`.
    pub fn to_bools(&self) -> Array2<bool> {
        self.data.mapv(is_on)
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView2<u8> {
        self.data.view()
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 判断 `pos` 是否是掩膜成员. 越界时返回 `false`.
    #[inline]
    pub fn is_set(&self, pos: Idx2d) -> bool {
        self.data.get(pos).copied().is_some_and(is_on)
    }

    /// 统计成员像素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| is_on(**p)).count()
    }

    /// 该掩膜是否没有任何成员?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_off)
    }

    /// 两张掩膜是否不存在共同成员?
    ///
    /// 如果两者形状不同, 程序 panic.
    pub fn is_disjoint(&self, other: &BinaryMask) -> bool {
        assert_eq!(self.shape(), other.shape(), "掩膜形状不符");
        Zip::from(&self.data)
            .and(&other.data)
            .all(|&a, &b| !(is_on(a) && is_on(b)))
    }

    /// 交集. 形状不同时返回 [`Error::ShapeMismatch`].
    pub fn and(&self, other: &BinaryMask) -> Result<BinaryMask> {
        self.zip_with(other, |a, b| a && b)
    }

    /// 并集. 形状不同时返回 [`Error::ShapeMismatch`].
    pub fn or(&self, other: &BinaryMask) -> Result<BinaryMask> {
        self.zip_with(other, |a, b| a || b)
    }

    /// 差集 `self ∧ ¬other`. 形状不同时返回 [`Error::ShapeMismatch`].
    pub fn and_not(&self, other: &BinaryMask) -> Result<BinaryMask> {
        self.zip_with(other, |a, b| a && !b)
    }

    /// 补集.
    pub fn complement(&self) -> BinaryMask {
        Self {
            data: self.data.mapv(|p| if is_on(p) { MASK_OFF } else { MASK_ON }),
        }
    }

    fn zip_with(&self, other: &BinaryMask, f: impl Fn(bool, bool) -> bool) -> Result<BinaryMask> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| if f(is_on(a), is_on(b)) { MASK_ON } else { MASK_OFF });
        Ok(Self { data })
    }

    /// 获取所有成员像素的索引, 按行优先排列.
    pub fn positions<B: FromIterator<Idx2d>>(&self) -> B {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| is_on(*p).then_some(pos))
            .collect()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u8> {
        self.data
    }
}

impl Index<Idx2d> for BinaryMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use super::BinaryMask;
    use crate::Error;
    use ndarray::array;

    #[test]
    fn test_reject_non_binary() {
        let e = BinaryMask::new(array![[0, 255], [1, 0]]).unwrap_err();
        assert!(matches!(e, Error::NotBinary { pos: (1, 0), value: 1 }));
    }

    #[test]
    fn test_disjoint() {
        let a = BinaryMask::new(array![[255, 0], [0, 0]]).unwrap();
        let b = BinaryMask::new(array![[0, 255], [255, 0]]).unwrap();
        let c = BinaryMask::new(array![[255, 255], [0, 0]]).unwrap();
        assert!(a.is_disjoint(&b));
        assert!(!a.is_disjoint(&c));
        assert!(!b.is_disjoint(&c));
        assert_eq!(c.count(), 2);
        assert_eq!(b.positions::<Vec<_>>(), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_bools_round() {
        let flags = array![[true, false], [false, true]];
        let m = BinaryMask::from_bools(flags.view());
        assert!(m.is_set((1, 1)));
        assert!(!m.is_set((0, 1)));
        assert!(!m.is_set((9, 9)));
        assert_eq!(m.to_bools(), flags);
        assert!(BinaryMask::zeros((3, 3)).is_background());
    }

    #[test]
    fn test_logic_ops() {
        let a = BinaryMask::new(array![[255, 255], [0, 0]]).unwrap();
        let b = BinaryMask::new(array![[0, 255], [255, 0]]).unwrap();
        assert_eq!(a.and(&b).unwrap().into_raw(), array![[0, 255], [0, 0]]);
        assert_eq!(a.or(&b).unwrap().into_raw(), array![[255, 255], [255, 0]]);
        assert_eq!(a.and_not(&b).unwrap().into_raw(), array![[255, 0], [0, 0]]);
        assert_eq!(a.complement().into_raw(), array![[0, 0], [255, 255]]);

        let c = BinaryMask::zeros((3, 2));
        assert!(matches!(a.and(&c), Err(Error::ShapeMismatch { .. })));
    }
}
