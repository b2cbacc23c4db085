// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage 4: memory alignment (`spec.md` §4.3).
//!
//! Architecture-specific, injected as a callback — `spec.md` §9 points
//! out this is exactly how `mpu_alignment`/`task_memory_alignment` are
//! dispatched off the build target in `xtask::config`, so `Aligner` is
//! the trait seam that lets RISC-V or another family plug in later
//! without touching `place` or `mpu`.

use crate::error::{GenError, Result};
use crate::model::{Addr, MemorySegment};

pub trait Aligner {
    /// Aligns one segment in place. For a concrete `start`, validates it;
    /// for `Auto`, fills in `align` and rounds `size` down to a multiple
    /// of it, leaving `start` as `Auto` for `place` to resolve.
    fn align(&self, seg: &mut MemorySegment) -> Result<()>;
}

pub struct ArmV7M;

const ARMV7M_FIXED_ALIGN: u32 = 32;

impl Aligner for ArmV7M {
    fn align(&self, seg: &mut MemorySegment) -> Result<()> {
        match seg.start {
            Addr::Concrete(start) => {
                if start % ARMV7M_FIXED_ALIGN != 0 || !seg.size.is_multiple_of(ARMV7M_FIXED_ALIGN) {
                    return Err(GenError::placement(format!(
                        "segment at {start:#010x} size {:#x} is not 32-byte aligned",
                        seg.size
                    )));
                }
                seg.align = ARMV7M_FIXED_ALIGN;
            }
            Addr::Auto => {
                let p = smallest_pow2_at_least(seg.size);
                let subregion_align = p / 8;
                seg.align = subregion_align;
                seg.size = (seg.size / subregion_align) * subregion_align;
                if seg.size == 0 {
                    return Err(GenError::placement(
                        "Auto segment rounds to zero size under MPU subregion granularity",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn smallest_pow2_at_least(size: u32) -> u32 {
    if size <= 1 {
        return 1;
    }
    1u32 << (32 - (size - 1).leading_zeros())
}

pub fn align_all(aligner: &dyn Aligner, segments: &mut [MemorySegment]) -> Result<()> {
    for seg in segments {
        aligner.align(seg)?;
    }
    Ok(())
}
