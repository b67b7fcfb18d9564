//! 彩色叠加. 该模块不做任何决策, 只按掩膜着色.

use crate::consts::rgb;
use crate::morph::{self, StructElem};
use crate::segment::TissueMasks;
use crate::{BinaryMask, Error, Result, VisualImage};
use ndarray::{Array2, Axis, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 叠加样式.
#[derive(PartialEq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OverlayStyle {
    /// 颜色层权重, 底图权重恒为 1. 允许范围 \[0.3, 0.7\].
    pub alpha: f32,
    /// 是否用暗色描出每种组织的内边界.
    pub accent_boundary: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            alpha: 0.65,
            accent_boundary: false,
        }
    }
}

impl OverlayStyle {
    /// 检查参数是否合法.
    pub fn validate(&self) -> Result<()> {
        if !(0.3..=0.7).contains(&self.alpha) {
            return Err(Error::InvalidParameter {
                name: "alpha",
                reason: format!("必须位于 [0.3, 0.7], 实际为 {}", self.alpha),
            });
        }
        Ok(())
    }
}

/// 将三张掩膜以固定颜色叠加到 `base` 上, 返回三通道 RGB 图像.
///
/// 单通道底图先扩展为三通道. 按脂肪 (柠檬黄), 肌肉 (洋红), 骨骼 (青色) 的顺序,
/// 在掩膜成员像素上计算 `base + alpha * color` 并截断到 255; 其他像素保持不变,
/// 因此空掩膜会原样复现底图.
///
/// 掩膜与底图分辨率不同时返回 [`Error::ShapeMismatch`].
pub fn overlay(
    base: &VisualImage,
    fat: &BinaryMask,
    muscle: &BinaryMask,
    bone: &BinaryMask,
    style: &OverlayStyle,
) -> Result<VisualImage> {
    style.validate()?;
    let layers = [(fat, rgb::FAT), (muscle, rgb::MUSCLE), (bone, rgb::BONE)];
    for (mask, _) in &layers {
        if mask.shape() != base.shape() {
            return Err(Error::ShapeMismatch {
                expected: base.shape(),
                actual: mask.shape(),
            });
        }
    }

    let mut out = base.to_rgb().into_raw();
    let ring = StructElem::ellipse(1);
    for (mask, color) in layers {
        if mask.is_background() {
            continue;
        }
        let members = mask.to_bools();
        blend(&mut out, &members, color, style.alpha);
        if style.accent_boundary {
            let edge = morph::boundary(members.view(), &ring);
            let mut thick = morph::dilate(edge.view(), &ring);
            Zip::from(&mut thick).and(&members).for_each(|t, &m| *t &= m);
            stamp(&mut out, &thick, rgb::darker(color));
        }
    }
    Ok(VisualImage::from_trusted(out))
}

/// 同 [`overlay`], 参数为分割结果.
#[inline]
pub fn overlay_masks(
    base: &VisualImage,
    masks: &TissueMasks,
    style: &OverlayStyle,
) -> Result<VisualImage> {
    overlay(base, &masks.fat, &masks.muscle, &masks.bone, style)
}

fn blend(out: &mut ndarray::Array3<u8>, members: &Array2<bool>, color: [u8; 3], alpha: f32) {
    Zip::from(out.lanes_mut(Axis(2)))
        .and(members)
        .for_each(|mut px, &m| {
            if m {
                for (p, c) in px.iter_mut().zip(color) {
                    *p = (*p as f32 + alpha * c as f32).round().min(255.0) as u8;
                }
            }
        });
}

fn stamp(out: &mut ndarray::Array3<u8>, members: &Array2<bool>, color: [u8; 3]) {
    Zip::from(out.lanes_mut(Axis(2)))
        .and(members)
        .for_each(|mut px, &m| {
            if m {
                px.iter_mut().zip(color).for_each(|(p, c)| *p = c);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2};

    fn base() -> VisualImage {
        VisualImage::from_gray(Array2::from_elem((8, 8), 100)).unwrap()
    }

    fn block(r: std::ops::Range<usize>, c: std::ops::Range<usize>) -> BinaryMask {
        let mut m = Array2::from_elem((8, 8), false);
        m.slice_mut(s![r, c]).fill(true);
        BinaryMask::from_bools(m.view())
    }

    #[test]
    fn test_zero_masks_reproduce_base() {
        let z = BinaryMask::zeros((8, 8));
        let out = overlay(&base(), &z, &z, &z, &OverlayStyle::default()).unwrap();
        assert_eq!(out, base().to_rgb());

        let rgb = base().to_rgb();
        assert_eq!(overlay(&rgb, &z, &z, &z, &OverlayStyle::default()).unwrap(), rgb);
    }

    #[test]
    fn test_colors_and_saturation() {
        let z = BinaryMask::zeros((8, 8));
        let bone = block(0..2, 0..2);
        let fat = block(4..6, 4..6);
        let out = overlay(&base(), &fat, &z, &bone, &OverlayStyle::default()).unwrap();

        // 100 + 0.65 * 255 = 265.75 -> 255.
        assert_eq!(out.pixel((0, 0)).to_vec(), vec![100, 255, 255]);
        assert_eq!(out.pixel((4, 4)).to_vec(), vec![255, 255, 100]);
        assert_eq!(out.pixel((7, 7)).to_vec(), vec![100, 100, 100]);

        let muscle = block(2..4, 6..8);
        let out = overlay(&base(), &z, &muscle, &z, &OverlayStyle::default()).unwrap();
        // 100 + 0.65 * 128 = 183.2 -> 183.
        assert_eq!(out.pixel((3, 7)).to_vec(), vec![255, 100, 183]);
    }

    #[test]
    fn test_accent_boundary() {
        let z = BinaryMask::zeros((8, 8));
        let bone = block(1..7, 1..7);
        let style = OverlayStyle {
            accent_boundary: true,
            ..Default::default()
        };
        let out = overlay(&base(), &z, &z, &bone, &style).unwrap();
        assert_eq!(out.pixel((1, 1)).to_vec(), rgb::darker(rgb::BONE).to_vec());
        assert_eq!(out.pixel((0, 0)).to_vec(), vec![100, 100, 100]);
        assert_eq!(out.pixel((4, 4)).to_vec(), vec![100, 255, 255]);
    }

    #[test]
    fn test_invalid_input() {
        let z = BinaryMask::zeros((8, 8));
        let bad = BinaryMask::zeros((8, 9));
        assert!(matches!(
            overlay(&base(), &z, &bad, &z, &OverlayStyle::default()),
            Err(Error::ShapeMismatch { .. })
        ));
        let style = OverlayStyle {
            alpha: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            overlay(&base(), &z, &z, &z, &style),
            Err(Error::InvalidParameter { name: "alpha", .. })
        ));
    }
}
