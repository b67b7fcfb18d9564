//! 对比实验依赖的通用组件.

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}
