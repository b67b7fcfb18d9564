//! 流程运行统计.

use ct_tissue::pipeline::Flow;
use ct_tissue::segment::SegmentStats;
use std::time::{Duration, Instant};

/// 计时器. 初始化时即开始计时.
#[derive(Clone, Debug)]
struct Timer {
    since: Instant,
}

impl Timer {
    #[inline]
    fn new() -> Self {
        Self {
            since: Instant::now(),
        }
    }

    #[inline]
    fn elapsed(&self) -> Duration {
        self.since.elapsed()
    }
}

/// 单个流程的运行统计.
#[derive(Clone, Debug)]
pub struct Profile {
    flow: Flow,
    timer: Timer,

    /// 流程本身 (去噪, 分割, 叠加) 花费的时间.
    compute: Duration,

    /// 包括保存图像在内的总时间.
    total: Duration,

    stats: SegmentStats,
}

impl Profile {
    /// 初始化, 并开始计时.
    #[inline]
    pub fn start(flow: Flow) -> Self {
        Self {
            flow,
            timer: Timer::new(),
            compute: Duration::ZERO,
            total: Duration::ZERO,
            stats: SegmentStats::default(),
        }
    }

    /// 记录流程计算完成.
    #[inline]
    pub fn computed(&mut self, stats: SegmentStats) {
        self.compute = self.timer.elapsed();
        self.stats = stats;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.total = self.timer.elapsed();
        self
    }

    /// 流程.
    #[inline]
    pub fn flow(&self) -> Flow {
        self.flow
    }

    /// 以微秒为单位获得计算时间.
    #[inline]
    pub fn get_compute_us(&self) -> u64 {
        self.compute.as_micros() as u64
    }

    /// 以微秒为单位获得总时间.
    #[inline]
    pub fn get_total_us(&self) -> u64 {
        self.total.as_micros() as u64
    }

    /// 分割统计.
    #[inline]
    pub fn stats(&self) -> &SegmentStats {
        &self.stats
    }
}
