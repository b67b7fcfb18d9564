//! 二维二值形态学操作. 所有函数都以 `bool` 图作为输入和输出, 不修改输入.
//!
//! 越界的邻居一律被忽略: 腐蚀时视作前景, 膨胀时视作背景.
//! 这与 OpenCV 默认的边界处理方式一致.

mod areas;

pub use areas::{areas, remove_small_areas};

use crate::Idx2d;
use ndarray::{Array2, ArrayView2, Zip};
use std::collections::VecDeque;

/// 获得 `(h, w)` 的 4-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour4((h, w): Idx2d) -> [Idx2d; 4] {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
}

/// 获得 `(h, w)` 的 8-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour8((h, w): Idx2d) -> [Idx2d; 8] {
    [
        (h.wrapping_sub(1), w.wrapping_sub(1)),
        (h.wrapping_sub(1), w),
        (h.wrapping_sub(1), w.saturating_add(1)),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
        (h.saturating_add(1), w.wrapping_sub(1)),
        (h.saturating_add(1), w),
        (h.saturating_add(1), w.saturating_add(1)),
    ]
}

/// 椭圆 (圆盘) 结构元素, 以相对中心的偏移 `(dh, dw)` 表示.
///
/// 形状与 OpenCV `getStructuringElement(MORPH_ELLIPSE, (2r+1, 2r+1))` 一致:
/// 第 `dh` 行覆盖 `|dw| <= round(sqrt(r^2 - dh^2))`. 例如半径 1 为十字形,
/// 半径 2 为 5x5 方阵去掉首末两行除中心以外的像素.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructElem {
    radius: usize,
    offsets: Vec<(isize, isize)>,
}

impl StructElem {
    /// 构建半径为 `radius` 的椭圆结构元素. 半径 0 只包含中心像素.
    pub fn ellipse(radius: usize) -> Self {
        let r = radius as isize;
        let mut offsets = Vec::with_capacity((2 * radius + 1).pow(2));
        for dh in -r..=r {
            let dx = if r == 0 {
                0
            } else {
                (((r * r - dh * dh) as f64).sqrt()).round() as isize
            };
            offsets.extend((-dx..=dx).map(|dw| (dh, dw)));
        }
        Self { radius, offsets }
    }

    /// 半径.
    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// 覆盖的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.offsets.len()
    }

    /// 以 `(2r+1, 2r+1)` 布尔矩阵的形式导出.
    pub fn to_array(&self) -> Array2<bool> {
        let r = self.radius as isize;
        let side = 2 * self.radius + 1;
        let mut out = Array2::from_elem((side, side), false);
        for &(dh, dw) in &self.offsets {
            out[((dh + r) as usize, (dw + r) as usize)] = true;
        }
        out
    }

    /// 以 `pos` 为中心, 迭代所有未越界的覆盖位置.
    #[inline]
    fn around(&self, (h, w): Idx2d, (height, width): Idx2d) -> impl Iterator<Item = Idx2d> + '_ {
        self.offsets.iter().filter_map(move |&(dh, dw)| {
            let nh = h.checked_add_signed(dh)?;
            let nw = w.checked_add_signed(dw)?;
            (nh < height && nw < width).then_some((nh, nw))
        })
    }
}

/// 对每个像素求值, 在 `rayon` feature 下并行.
fn map_indexed<F>(shape: Idx2d, f: F) -> Array2<bool>
where
    F: Fn(Idx2d) -> bool + Sync,
{
    let mut out = Array2::from_elem(shape, false);
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            Zip::indexed(&mut out).par_for_each(|pos, o| *o = f(pos));
        } else {
            Zip::indexed(&mut out).for_each(|pos, o| *o = f(pos));
        }
    }
    out
}

/// 膨胀: 结构元素覆盖范围内任一像素为前景, 则中心为前景.
pub fn dilate(img: ArrayView2<bool>, se: &StructElem) -> Array2<bool> {
    let shape = img.dim();
    map_indexed(shape, |pos| se.around(pos, shape).any(|p| img[p]))
}

/// 腐蚀: 结构元素覆盖范围内所有 (未越界) 像素均为前景, 中心才为前景.
pub fn erode(img: ArrayView2<bool>, se: &StructElem) -> Array2<bool> {
    let shape = img.dim();
    map_indexed(shape, |pos| img[pos] && se.around(pos, shape).all(|p| img[p]))
}

/// 开运算: 先腐蚀后膨胀. 去除小于结构元素的孤立前景.
pub fn open(img: ArrayView2<bool>, se: &StructElem) -> Array2<bool> {
    dilate(erode(img, se).view(), se)
}

/// 闭运算: 先膨胀后腐蚀. 弥合前景中的细小缝隙.
pub fn close(img: ArrayView2<bool>, se: &StructElem) -> Array2<bool> {
    erode(dilate(img, se).view(), se)
}

/// 填充被前景包围的背景空洞.
///
/// 从图像边界上的所有背景像素出发做 4-连通泛洪, 所有未被到达的背景像素都视作空洞,
/// 并被置为前景.
pub fn fill_holes(img: ArrayView2<bool>) -> Array2<bool> {
    let (height, width) = img.dim();
    if img.is_empty() {
        return img.to_owned();
    }
    let mut outside = Array2::from_elem((height, width), false);
    let mut bfs_q = VecDeque::with_capacity(2 * (height + width));

    let border = (0..height)
        .flat_map(|h| [(h, 0), (h, width - 1)])
        .chain((0..width).flat_map(|w| [(0, w), (height - 1, w)]));
    for pos in border {
        if !img[pos] && !outside[pos] {
            outside[pos] = true;
            bfs_q.push_back(pos);
        }
    }

    while let Some(cur) = bfs_q.pop_front() {
        for next in neighbour4(cur) {
            if next.0 < height && next.1 < width && !img[next] && !outside[next] {
                outside[next] = true;
                bfs_q.push_back(next);
            }
        }
    }

    outside.mapv(|o| !o)
}

/// 内边界: `img ∧ ¬erode(img, r)`.
pub fn boundary(img: ArrayView2<bool>, se: &StructElem) -> Array2<bool> {
    let mut eroded = erode(img, se);
    Zip::from(&mut eroded).and(img).for_each(|e, &i| *e = i && !*e);
    eroded
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};

    fn to_bools(a: Array2<u8>) -> Array2<bool> {
        a.mapv(|v| v != 0)
    }

    #[test]
    fn test_ellipse_shapes() {
        assert_eq!(StructElem::ellipse(0).to_array(), array![[true]]);
        assert_eq!(
            StructElem::ellipse(1).to_array(),
            to_bools(array![[0, 1, 0], [1, 1, 1], [0, 1, 0]])
        );
        assert_eq!(
            StructElem::ellipse(2).to_array(),
            to_bools(array![
                [0, 0, 1, 0, 0],
                [1, 1, 1, 1, 1],
                [1, 1, 1, 1, 1],
                [1, 1, 1, 1, 1],
                [0, 0, 1, 0, 0],
            ])
        );
        assert_eq!(
            StructElem::ellipse(3).to_array(),
            to_bools(array![
                [0, 0, 0, 1, 0, 0, 0],
                [0, 1, 1, 1, 1, 1, 0],
                [1, 1, 1, 1, 1, 1, 1],
                [1, 1, 1, 1, 1, 1, 1],
                [1, 1, 1, 1, 1, 1, 1],
                [0, 1, 1, 1, 1, 1, 0],
                [0, 0, 0, 1, 0, 0, 0],
            ])
        );
        assert_eq!(StructElem::ellipse(3).size(), 1 + 5 + 7 + 7 + 7 + 5 + 1);
    }

    #[test]
    fn test_dilate_erode_point() {
        let mut img = Array2::from_elem((5, 5), false);
        img[(2, 2)] = true;
        let se = StructElem::ellipse(1);
        let d = dilate(img.view(), &se);
        assert_eq!(d.iter().filter(|b| **b).count(), 5);
        assert!(d[(1, 2)] && d[(2, 1)] && !d[(1, 1)]);
        assert_eq!(erode(d.view(), &se), img);
    }

    #[test]
    fn test_border_ignored() {
        let img = Array2::from_elem((4, 4), true);
        let se = StructElem::ellipse(2);
        assert_eq!(erode(img.view(), &se), img);
        assert_eq!(open(img.view(), &se), img);
    }

    #[test]
    fn test_open_removes_speck() {
        let mut img = Array2::from_elem((9, 9), false);
        img.slice_mut(s![2..7, 2..7]).fill(true);
        img[(0, 8)] = true;
        let opened = open(img.view(), &StructElem::ellipse(1));
        assert!(!opened[(0, 8)]);
        assert!(opened[(4, 4)]);
    }

    #[test]
    fn test_close_bridges_gap() {
        let mut img = Array2::from_elem((7, 9), false);
        img.slice_mut(s![2..5, 1..4]).fill(true);
        img.slice_mut(s![2..5, 5..8]).fill(true);
        let closed = close(img.view(), &StructElem::ellipse(1));
        assert!(closed[(3, 4)]);
        assert!(!closed[(0, 0)]);
    }

    #[test]
    fn test_fill_holes() {
        let mut img = Array2::from_elem((7, 7), false);
        img.slice_mut(s![1..6, 1..6]).fill(true);
        img.slice_mut(s![2..5, 2..5]).fill(false);
        let filled = fill_holes(img.view());
        assert!(filled[(3, 3)]);
        assert!(!filled[(0, 0)]);
        assert_eq!(filled.iter().filter(|b| **b).count(), 25);

        // 与边界相连的凹口不是空洞.
        img[(3, 1)] = false;
        img[(3, 0)] = false;
        let filled = fill_holes(img.view());
        assert!(!filled[(3, 3)]);
    }

    #[test]
    fn test_boundary() {
        let mut img = Array2::from_elem((5, 5), false);
        img.slice_mut(s![1..4, 1..4]).fill(true);
        let b = boundary(img.view(), &StructElem::ellipse(1));
        assert!(!b[(2, 2)]);
        assert_eq!(b.iter().filter(|b| **b).count(), 8);
    }
}
