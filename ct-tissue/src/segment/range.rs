use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// CT HU 值闭区间 \[lo, hi\]. `hi` 可以为 `+inf`, 表示左闭右开的 \[lo, +inf).
///
/// 构造时不做检查, 由 [`SegmentConfig::validate`](super::SegmentConfig::validate) 统一校验.
#[derive(PartialEq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HuRange {
    lo: f32,
    hi: f32,
}

impl HuRange {
    /// 构建 \[lo, hi\] 闭区间.
    #[inline]
    pub const fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    /// 构建 \[lo, +inf) 区间.
    #[inline]
    pub const fn at_least(lo: f32) -> Self {
        Self {
            lo,
            hi: f32::INFINITY,
        }
    }

    /// 区间下限.
    #[inline]
    pub fn lo(&self) -> f32 {
        self.lo
    }

    /// 区间上限.
    #[inline]
    pub fn hi(&self) -> f32 {
        self.hi
    }

    /// 判断 `hu` 是否落在区间内.
    #[inline]
    pub fn contains(&self, hu: f32) -> bool {
        self.lo <= hu && hu <= self.hi
    }

    /// 下限必须有限, 上限不能是 NaN, 且 `lo <= hi`.
    pub(crate) fn validate(&self, name: &'static str) -> Result<()> {
        if !self.lo.is_finite() || self.hi.is_nan() || self.lo > self.hi {
            return Err(Error::InvalidParameter {
                name,
                reason: format!("非法 HU 区间 [{}, {}]", self.lo, self.hi),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HuRange;

    #[test]
    fn test_closed_bounds() {
        let r = HuRange::new(-190.0, -30.0);
        assert!(r.contains(-190.0));
        assert!(r.contains(-30.0));
        assert!(!r.contains(-29.9));
        assert!(!r.contains(-1024.0));

        let bone = HuRange::at_least(200.0);
        assert!(bone.contains(200.0));
        assert!(bone.contains(3071.0));
        assert!(!bone.contains(199.0));
    }

    #[test]
    fn test_validate() {
        assert!(HuRange::new(10.0, 120.0).validate("muscle").is_ok());
        assert!(HuRange::at_least(200.0).validate("bone").is_ok());
        assert!(HuRange::new(120.0, 10.0).validate("muscle").is_err());
        assert!(HuRange::new(f32::NEG_INFINITY, 0.0).validate("fat").is_err());
        assert!(HuRange::new(0.0, f32::NAN).validate("fat").is_err());
    }
}
