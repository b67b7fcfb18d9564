//! 程序运行函数.

use crate::profile::Profile;
use crate::result::FlowsResult;
use ct_tissue::pipeline::{Flow, Pipeline};
use ct_tissue::{DensityImage, ImgWriteVis, Result};
use std::path::Path;
use std::thread;
use utils::loader;

/// 运行单个流程, 并将可视化图像和叠加图保存到 `out_dir`.
fn run_flow(
    pipeline: &Pipeline,
    scan: &DensityImage,
    flow: Flow,
    out_dir: &Path,
) -> Result<Profile> {
    let mut profile = Profile::start(flow);
    let out = pipeline.run(scan, flow)?;
    profile.computed(out.stats);

    out.visual.save(out_dir.join(format!("{flow}_visual.png")))?;
    out.overlay.save(out_dir.join(format!("{flow}_overlay.png")))?;
    Ok(profile.finish())
}

/// 实际运行.
pub fn run() -> Result<FlowsResult> {
    let scan_path = loader::scan_path_from_env_or_home().ok_or_else(|| {
        ct_tissue::Error::InvalidParameter {
            name: "CT_TISSUE_SCAN",
            reason: "无法确定体数据路径".to_string(),
        }
    })?;
    let scan = loader::load_slice(&scan_path, loader::slice_index_from_env())?;
    let (lo, hi) = scan.min_max();
    log::info!("切片 {:?}, HU 范围 [{lo}, {hi}]", scan.shape());

    let out_dir = loader::output_dir_from_env();
    std::fs::create_dir_all(&out_dir)?;

    let pipeline = Pipeline::new(
        loader::pipeline_config_from_env(),
        loader::model_handle_from_env_or_home(),
    )?;

    utils::sep();
    println!("Running flows...");
    let profiles = thread::scope(|s| {
        let (pipeline, scan, out_dir) = (&pipeline, &scan, out_dir.as_path());
        let handles =
            Flow::ALL.map(|flow| s.spawn(move || run_flow(pipeline, scan, flow, out_dir)));
        handles
            .into_iter()
            .map(|th| th.join().expect("Thread joining error"))
            .collect::<Result<Vec<_>>>()
    })?;

    log::info!("结果已保存到 {}", out_dir.display());
    Ok(FlowsResult::new(pipeline.strategy(), profiles))
}
