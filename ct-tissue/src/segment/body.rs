//! 人体区域门控.

use crate::morph::{close, fill_holes, StructElem};
use ndarray::{Array2, ArrayView2};

/// 计算人体区域: `HU > threshold`, 再以 `se` 闭运算, 最后填充被包围的空洞.
///
/// 扫描床, 衣物等细小的高于门限的结构通常会被保留; 它们几乎不落在任何组织区间内,
/// 不影响后续分类.
pub(crate) fn body_gate(scan: ArrayView2<f32>, threshold: f32, se: &StructElem) -> Array2<bool> {
    let raw = scan.mapv(|hu| hu > threshold);
    let closed = close(raw.view(), se);
    fill_holes(closed.view())
}

#[cfg(test)]
mod tests {
    use super::body_gate;
    use crate::morph::StructElem;
    use ndarray::{s, Array2};

    #[test]
    fn test_lung_is_inside_body() {
        let mut scan = Array2::from_elem((32, 32), -1024.0f32);
        scan.slice_mut(s![4..28, 4..28]).fill(30.0);
        // 肺部空气被软组织包围.
        scan.slice_mut(s![10..20, 10..20]).fill(-850.0);

        let body = body_gate(scan.view(), -500.0, &StructElem::ellipse(3));
        assert!(body[(15, 15)]);
        assert!(body[(4, 4)]);
        assert!(!body[(0, 0)]);
        assert!(!body[(3, 16)]);
        assert_eq!(body.iter().filter(|b| **b).count(), 24 * 24);
    }
}
