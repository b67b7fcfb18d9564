//! 原始 / 经典 / 进阶三种流程的对比实验.
//!
//! 环境变量:
//!
//! - `CT_TISSUE_SCAN`: nii 体数据路径, 默认 `$HOME/dataset/ct/volume.nii`;
//! - `CT_TISSUE_Z`: 切片索引, 默认取中间层;
//! - `CT_TISSUE_MODEL`: ONNX 去噪模型路径, 默认 `$HOME/models/dncnn_compatible.onnx`;
//! - `CT_TISSUE_OUT`: 输出目录, 默认 `outputs/final`;
//! - `CT_TISSUE_FALLBACK`: 没有模型时的经典滤波, `nlm`, `bilateral` 或 `gaussian`;
//! - `CT_TISSUE_EQUALIZE`: 为 `1` 时对可视化图像做直方图均衡化.

mod profile;
mod result;
mod runner;

use std::process::ExitCode;

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .expect("logger initialized twice");

    log::info!("使用 {} 个核心", utils::cpus());
    match runner::run() {
        Ok(result) => {
            if let Err(e) = result.analyze_into(std::io::stdout().lock()) {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
