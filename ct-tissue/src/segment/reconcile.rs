//! 层级排斥: 将三张候选掩膜合并为逐像素唯一的组织标签.

use super::{SegmentStats, Tissue};
use ndarray::{Array2, ArrayView2, Zip};

/// 清理后的三张候选掩膜. 它们之间可以相互重叠.
pub(crate) struct Candidates {
    pub(crate) fat: Array2<bool>,
    pub(crate) muscle: Array2<bool>,
    pub(crate) bone: Array2<bool>,
}

/// 对每个像素只做一次决策. 人体区域外一律为背景.
///
/// `bone_core` 是腐蚀后的骨骼掩膜. 骨芯内的像素总是骨骼, 其中的软组织候选被抑制;
/// 骨骼外环 (骨骼 ∧ ¬骨芯) 上存在软组织候选时, 像素归属该软组织, 否则仍为骨骼.
/// 骨骼以外的像素按肌肉/肌腱 > 脂肪决定.
pub(crate) fn reconcile(
    body: ArrayView2<bool>,
    cand: &Candidates,
    bone_core: ArrayView2<bool>,
    stats: &mut SegmentStats,
) -> Array2<Tissue> {
    let mut tags = Array2::from_elem(body.dim(), Tissue::Background);
    Zip::from(&mut tags)
        .and(body)
        .and(&cand.fat)
        .and(&cand.muscle)
        .and(&cand.bone)
        .and(bone_core)
        .for_each(|t, &inside, &fat, &muscle, &bone, &core| {
            if !inside {
                return;
            }
            *t = match (bone, core, fat || muscle) {
                (true, true, has_soft) => {
                    if has_soft {
                        stats.suppressed_by_core += 1;
                    }
                    Tissue::Bone
                }
                (true, false, false) => Tissue::Bone,
                (true, false, true) => {
                    stats.reclaimed_from_ring += 1;
                    soft_tissue(fat, muscle, stats)
                }
                (false, _, _) => soft_tissue(fat, muscle, stats),
            };
        });
    tags
}

/// 肌肉/肌腱 > 脂肪.
#[inline]
fn soft_tissue(fat: bool, muscle: bool, stats: &mut SegmentStats) -> Tissue {
    match (muscle, fat) {
        (true, true) => {
            stats.fat_yielded_to_muscle += 1;
            Tissue::Muscle
        }
        (true, false) => Tissue::Muscle,
        (false, true) => Tissue::Fat,
        (false, false) => Tissue::Background,
    }
}
