//! 单层 CT 切片相关的基础数据结构, 以及与外部协作方 (体数据, 窗口化, 持久化, 显示) 的适配层.

mod density;
mod mask;
mod save;
mod visual;
mod volume;
mod window;

pub use density::DensityImage;
pub use mask::BinaryMask;
pub use save::ImgWriteVis;
pub use visual::VisualImage;
pub use volume::CtScan;
pub use window::CtWindow;

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        mod plot;

        pub use plot::ImgDisplay;
    }
}
