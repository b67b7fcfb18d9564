//! 基于规则的组织分割引擎.
//!
//! 输入一张 HU 图像, 输出脂肪, 肌肉/肌腱, 骨骼三张二值掩膜. 算法流程依次为:
//!
//! 1. 人体区域门控: `HU > body_threshold`, 闭运算, 填充空洞. 人体区域过小时直接返回空掩膜.
//! 2. 按 HU 区间分类, 并限制在人体区域内.
//! 3. 逐组织的形态学清理:
//!   - 骨骼: 半径 1 闭运算 (不填洞, 保留骨髓腔);
//!   - 肌肉: 半径 1 开运算, 半径 2 闭运算, 填洞;
//!   - 脂肪: 半径 1 开运算.
//! 4. 8-连通面积过滤, 各组织使用不同的最小面积.
//! 5. 层级排斥: 逐像素决定唯一的组织标签, 三张掩膜由标签投影得到, 因此两两不相交.
//!   骨骼按 `bone_guard_radius` 腐蚀得到骨芯, 骨芯内只保留骨骼; 骨骼外环上的软组织候选
//!   优先于骨骼, 避免骨骼边界侵入相邻软组织.
//!   只有位于人体区域内且 `HU > body_threshold` 的像素才可能获得组织标签.
//!
//! 整个过程是纯函数, 相同输入总是得到逐位相同的输出.

mod body;
mod range;
mod reconcile;

pub use range::HuRange;

use crate::morph::{self, StructElem};
use crate::{BinaryMask, DensityImage, Error, Result};
use ndarray::{Array2, ArrayView2, Zip};
use reconcile::Candidates;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 像素的组织类别. 变体按优先级从低到高排列.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Tissue {
    /// 背景 (包括人体外部和未分类的组织).
    #[default]
    Background,

    /// 脂肪.
    Fat,

    /// 肌肉/肌腱.
    Muscle,

    /// 骨骼.
    Bone,
}

/// 分割结果: 三张两两不相交的二值掩膜, 分辨率与输入相同.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TissueMasks {
    /// 脂肪.
    pub fat: BinaryMask,
    /// 肌肉/肌腱.
    pub muscle: BinaryMask,
    /// 骨骼.
    pub bone: BinaryMask,
}

impl TissueMasks {
    /// 三张全空的掩膜.
    pub fn empty(shape: crate::Idx2d) -> Self {
        Self {
            fat: BinaryMask::zeros(shape),
            muscle: BinaryMask::zeros(shape),
            bone: BinaryMask::zeros(shape),
        }
    }

    /// 由逐像素的组织标签投影得到三张掩膜.
    pub fn from_tags(tags: ArrayView2<Tissue>) -> Self {
        let project = |t: Tissue| BinaryMask::from_bools(tags.mapv(|x| x == t).view());
        Self {
            fat: project(Tissue::Fat),
            muscle: project(Tissue::Muscle),
            bone: project(Tissue::Bone),
        }
    }

    /// 三张掩膜是否两两不相交?
    pub fn is_disjoint(&self) -> bool {
        self.fat.is_disjoint(&self.muscle)
            && self.fat.is_disjoint(&self.bone)
            && self.muscle.is_disjoint(&self.bone)
    }

    /// 获取 `tissue` 对应的掩膜. 背景没有对应掩膜, 返回 `None`.
    pub fn get(&self, tissue: Tissue) -> Option<&BinaryMask> {
        match tissue {
            Tissue::Background => None,
            Tissue::Fat => Some(&self.fat),
            Tissue::Muscle => Some(&self.muscle),
            Tissue::Bone => Some(&self.bone),
        }
    }
}

/// 每种组织各一个计数.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TissueCounts {
    /// 脂肪.
    pub fat: usize,
    /// 肌肉/肌腱.
    pub muscle: usize,
    /// 骨骼.
    pub bone: usize,
}

/// 一次分割过程的统计信息.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentStats {
    /// 人体区域的像素个数.
    pub body_pixels: usize,

    /// 人体区域过小, 直接返回了空掩膜.
    pub degenerate: bool,

    /// HU 区间分类后 (清理前) 各组织的像素个数.
    pub classified: TissueCounts,

    /// 面积过滤删除的连通区域个数.
    pub removed_areas: TissueCounts,

    /// 最终各组织的像素个数.
    pub kept: TissueCounts,

    /// 落在骨芯内, 被抑制的软组织候选像素个数.
    pub suppressed_by_core: usize,

    /// 落在骨骼外环上, 最终归属软组织的像素个数.
    pub reclaimed_from_ring: usize,

    /// 让位于肌肉的脂肪候选像素个数.
    pub fat_yielded_to_muscle: usize,
}

/// 分割参数. 所有门限单位均为 HU, 半径单位为像素.
///
/// 默认值只是一种常见取值, 并非金标准.
#[derive(PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentConfig {
    /// 人体门限, 高于该值的像素才可能属于人体.
    pub body_threshold: f32,
    /// 人体区域闭运算半径.
    pub body_close_radius: usize,
    /// 人体区域的最小像素个数, 不足时返回空掩膜.
    pub min_body_pixels: usize,

    /// 脂肪 HU 区间.
    pub fat: HuRange,
    /// 肌肉/肌腱 HU 区间.
    pub muscle: HuRange,
    /// 骨骼 HU 区间.
    pub bone: HuRange,

    /// 骨骼闭运算半径.
    pub bone_close_radius: usize,
    /// 肌肉开运算半径.
    pub muscle_open_radius: usize,
    /// 肌肉闭运算半径.
    pub muscle_close_radius: usize,
    /// 脂肪开运算半径.
    pub fat_open_radius: usize,

    /// 骨骼连通区域最小面积.
    pub min_bone_area: usize,
    /// 肌肉连通区域最小面积.
    pub min_muscle_area: usize,
    /// 脂肪连通区域最小面积.
    pub min_fat_area: usize,

    /// 求骨芯时的腐蚀半径.
    pub bone_guard_radius: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            body_threshold: -500.0,
            body_close_radius: 3,
            min_body_pixels: 1000,
            fat: HuRange::new(-190.0, -30.0),
            muscle: HuRange::new(10.0, 120.0),
            bone: HuRange::at_least(200.0),
            bone_close_radius: 1,
            muscle_open_radius: 1,
            muscle_close_radius: 2,
            fat_open_radius: 1,
            min_bone_area: 40,
            min_muscle_area: 25,
            min_fat_area: 10,
            bone_guard_radius: 3,
        }
    }
}

/// 形态学半径的上限. 更大的结构元素对单层切片没有意义.
const MAX_RADIUS: usize = 32;

impl SegmentConfig {
    /// 检查参数是否合法.
    pub fn validate(&self) -> Result<()> {
        if !self.body_threshold.is_finite() {
            return Err(Error::InvalidParameter {
                name: "body_threshold",
                reason: format!("必须是有限数, 实际为 {}", self.body_threshold),
            });
        }
        self.fat.validate("fat")?;
        self.muscle.validate("muscle")?;
        self.bone.validate("bone")?;

        let radii = [
            ("body_close_radius", self.body_close_radius),
            ("bone_close_radius", self.bone_close_radius),
            ("muscle_open_radius", self.muscle_open_radius),
            ("muscle_close_radius", self.muscle_close_radius),
            ("fat_open_radius", self.fat_open_radius),
            ("bone_guard_radius", self.bone_guard_radius),
        ];
        if let Some((name, r)) = radii.into_iter().find(|(_, r)| *r > MAX_RADIUS) {
            return Err(Error::InvalidParameter {
                name,
                reason: format!("半径 {r} 超过上限 {MAX_RADIUS}"),
            });
        }

        if self.min_bone_area < self.min_muscle_area || self.min_muscle_area < self.min_fat_area {
            return Err(Error::InvalidParameter {
                name: "min_area",
                reason: format!(
                    "最小面积必须满足 骨骼 >= 肌肉 >= 脂肪, 实际为 {} / {} / {}",
                    self.min_bone_area, self.min_muscle_area, self.min_fat_area
                ),
            });
        }
        Ok(())
    }
}

/// 预先构建好的结构元素.
#[derive(Clone, Debug)]
struct Elements {
    body_close: StructElem,
    bone_close: StructElem,
    muscle_open: StructElem,
    muscle_close: StructElem,
    fat_open: StructElem,
    bone_guard: StructElem,
}

/// 组织分割器. 构造后只读, 可在线程间共享.
#[derive(Clone, Debug)]
pub struct Segmenter {
    config: SegmentConfig,
    se: Elements,
}

impl Segmenter {
    /// 校验参数并构建分割器.
    pub fn new(config: SegmentConfig) -> Result<Self> {
        config.validate()?;
        let se = Elements {
            body_close: StructElem::ellipse(config.body_close_radius),
            bone_close: StructElem::ellipse(config.bone_close_radius),
            muscle_open: StructElem::ellipse(config.muscle_open_radius),
            muscle_close: StructElem::ellipse(config.muscle_close_radius),
            fat_open: StructElem::ellipse(config.fat_open_radius),
            bone_guard: StructElem::ellipse(config.bone_guard_radius),
        };
        Ok(Self { config, se })
    }

    /// 获取参数.
    #[inline]
    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// 分割 `scan`, 得到三张两两不相交的掩膜. 所有掩膜成员都位于人体区域内,
    /// 且 HU 值高于人体门限.
    #[inline]
    pub fn segment(&self, scan: &DensityImage) -> TissueMasks {
        self.segment_with_stats(scan).0
    }

    /// 同 [`Segmenter::segment`], 但先校验裸数据.
    pub fn segment_raw(&self, scan: ArrayView2<f32>) -> Result<TissueMasks> {
        let scan = DensityImage::new(scan.to_owned())?;
        Ok(self.segment(&scan))
    }

    /// 同 [`Segmenter::segment`], 但额外返回统计信息.
    pub fn segment_with_stats(&self, scan: &DensityImage) -> (TissueMasks, SegmentStats) {
        let (tags, stats) = self.classify(scan);
        (TissueMasks::from_tags(tags.view()), stats)
    }

    /// 计算人体区域.
    pub fn body_mask(&self, scan: &DensityImage) -> BinaryMask {
        let body = body::body_gate(scan.view(), self.config.body_threshold, &self.se.body_close);
        BinaryMask::from_bools(body.view())
    }

    /// 为每个像素计算唯一的组织标签.
    pub fn classify(&self, scan: &DensityImage) -> (Array2<Tissue>, SegmentStats) {
        let cfg = &self.config;
        let mut stats = SegmentStats::default();

        let body = body::body_gate(scan.view(), cfg.body_threshold, &self.se.body_close);
        stats.body_pixels = body.iter().filter(|b| **b).count();
        if stats.body_pixels < cfg.min_body_pixels {
            stats.degenerate = true;
            log::debug!(
                "人体区域只有 {} 个像素 (< {}), 返回空掩膜",
                stats.body_pixels,
                cfg.min_body_pixels
            );
            return (Array2::from_elem(scan.shape(), Tissue::Background), stats);
        }

        let in_range = |range: &HuRange| {
            Zip::from(scan.view())
                .and(&body)
                .map_collect(|&hu, &inside| inside && range.contains(hu))
        };
        let bone = in_range(&cfg.bone);
        let muscle = in_range(&cfg.muscle);
        let fat = in_range(&cfg.fat);
        stats.classified = TissueCounts {
            fat: count(&fat),
            muscle: count(&muscle),
            bone: count(&bone),
        };

        let ((bone, bone_removed), ((muscle, muscle_removed), (fat, fat_removed))) = join(
            || self.clean_bone(bone),
            || join(|| self.clean_muscle(muscle), || self.clean_fat(fat)),
        );
        stats.removed_areas = TissueCounts {
            fat: fat_removed,
            muscle: muscle_removed,
            bone: bone_removed,
        };

        // 被填充的空洞本身不属于任何组织.
        let eligible = Zip::from(scan.view())
            .and(&body)
            .map_collect(|&hu, &inside| inside && hu > cfg.body_threshold);
        let bone_core = morph::erode(bone.view(), &self.se.bone_guard);
        let cand = Candidates { fat, muscle, bone };
        let tags = reconcile::reconcile(eligible.view(), &cand, bone_core.view(), &mut stats);

        stats.kept = tags.iter().fold(TissueCounts::default(), |mut c, t| {
            match t {
                Tissue::Fat => c.fat += 1,
                Tissue::Muscle => c.muscle += 1,
                Tissue::Bone => c.bone += 1,
                Tissue::Background => {}
            }
            c
        });
        log::debug!("分割完成: {stats:?}");
        (tags, stats)
    }

    fn clean_bone(&self, raw: Array2<bool>) -> (Array2<bool>, usize) {
        let closed = morph::close(raw.view(), &self.se.bone_close);
        morph::remove_small_areas(closed.view(), self.config.min_bone_area)
    }

    fn clean_muscle(&self, raw: Array2<bool>) -> (Array2<bool>, usize) {
        let opened = morph::open(raw.view(), &self.se.muscle_open);
        let closed = morph::close(opened.view(), &self.se.muscle_close);
        let filled = morph::fill_holes(closed.view());
        morph::remove_small_areas(filled.view(), self.config.min_muscle_area)
    }

    fn clean_fat(&self, raw: Array2<bool>) -> (Array2<bool>, usize) {
        let opened = morph::open(raw.view(), &self.se.fat_open);
        morph::remove_small_areas(opened.view(), self.config.min_fat_area)
    }
}

#[inline]
fn count(img: &Array2<bool>) -> usize {
    img.iter().filter(|b| **b).count()
}

/// 在 `rayon` feature 下并行执行两个任务.
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            rayon::join(a, b)
        } else {
            (a(), b())
        }
    }
}
