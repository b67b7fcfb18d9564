//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 二值掩膜中, 非成员像素的值.
    pub const MASK_OFF: u8 = 0;

    /// 二值掩膜中, 成员像素的值.
    pub const MASK_ON: u8 = 255;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素是否是掩膜成员?
    #[inline]
    pub const fn is_on(p: u8) -> bool {
        matches!(p, MASK_ON)
    }

    /// 像素是否是掩膜的非成员?
    #[inline]
    pub const fn is_off(p: u8) -> bool {
        matches!(p, MASK_OFF)
    }

    /// 像素值是否为合法的二值掩膜取值 (0 或 255)?
    #[inline]
    pub const fn is_binary(p: u8) -> bool {
        matches!(p, MASK_OFF | MASK_ON)
    }
}

/// RGB 三通道颜色. 叠加图按 RGB 顺序存储.
pub mod rgb {
    /// 骨骼: 亮青色.
    pub const BONE: [u8; 3] = [0, 255, 255];

    /// 肌肉/肌腱: 洋红/亮粉色, 与青色对比明显.
    pub const MUSCLE: [u8; 3] = [255, 0, 128];

    /// 脂肪: 柠檬黄.
    pub const FAT: [u8; 3] = [255, 255, 0];

    /// 将颜色变暗一半, 用于描边.
    #[inline]
    pub const fn darker([r, g, b]: [u8; 3]) -> [u8; 3] {
        [r / 2, g / 2, b / 2]
    }
}

/// 软组织窗的窗位 (HU).
pub const SOFT_TISSUE_LEVEL: f32 = 40.0;

/// 软组织窗的窗宽 (HU).
pub const SOFT_TISSUE_WIDTH: f32 = 400.0;

/// 空气的 HU 值. 常用于填充扫描视野以外的区域.
pub const AIR_HU: f32 = -1024.0;

/// 默认的残差去噪模型文件名.
pub const DEFAULT_MODEL_FILENAME: &str = "dncnn_compatible.onnx";

/// 指定残差去噪模型路径的环境变量.
pub const MODEL_PATH_ENV: &str = "CT_TISSUE_MODEL";
