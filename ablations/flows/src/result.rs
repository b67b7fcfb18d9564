//! 实验结果.

use crate::profile::Profile;
use ct_tissue::denoise::DenoiseStrategy;
use std::io::{self, Write};

/// 将 `p` 的结果写进 `w` 中.
fn describe_into<W: Write>(p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let s = p.stats();
    writeln!(w, "Flow `{}`:", p.flow())?;
    writeln!(w, "{S4}Compute time: {} us", p.get_compute_us())?;
    writeln!(w, "{S4}Total time (with saving): {} us", p.get_total_us())?;
    writeln!(w, "{S4}Body pixels: {}", s.body_pixels)?;
    if s.degenerate {
        return write!(w, "{S4}Body region too small, all masks empty");
    }
    writeln!(
        w,
        "{S4}Kept pixels (bone / muscle / fat): {} / {} / {}",
        s.kept.bone, s.kept.muscle, s.kept.fat
    )?;
    writeln!(
        w,
        "{S4}Small areas removed (bone / muscle / fat): {} / {} / {}",
        s.removed_areas.bone, s.removed_areas.muscle, s.removed_areas.fat
    )?;
    writeln!(w, "{S4}Soft tissue suppressed by bone core: {}", s.suppressed_by_core)?;
    writeln!(w, "{S4}Bone ring reclaimed by soft tissue: {}", s.reclaimed_from_ring)?;
    write!(w, "{S4}Fat yielded to muscle: {}", s.fat_yielded_to_muscle)?;
    Ok(())
}

/// 对比实验最终结果.
pub struct FlowsResult {
    strategy: DenoiseStrategy,
    data: Vec<Profile>,
}

impl FlowsResult {
    pub fn new<I: IntoIterator<Item = Profile>>(strategy: DenoiseStrategy, it: I) -> Self {
        Self {
            strategy,
            data: it.into_iter().collect(),
        }
    }

    /// 将运行结果写进 `w` 中.
    pub fn analyze_into<W: Write>(&self, mut w: W) -> io::Result<()> {
        utils::sep_to(&mut w)?;
        writeln!(w, "Denoise strategy: {:?}", self.strategy)?;
        utils::sep_to(&mut w)?;
        for profile in self.data.iter() {
            describe_into(profile, &mut w)?;
            writeln!(w)?;
            utils::sep_to(&mut w)?;
        }
        Ok(())
    }
}
