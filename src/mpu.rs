// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage 6: page-table synthesis (`spec.md` §4.5), the ARMv7-M exemplar.
//!
//! No direct teacher precedent exists for the recursive subregion tree:
//! `xtask::config` only ever computes a *flat* MPU alignment/size for a
//! single task region (`mpu_alignment`, `suggest_memory_region_size`),
//! because Hubris gives each task one MPU region per memory kind and
//! never needs to cover a list of same-kind segments with a tree. This
//! module is original, written in the teacher's idiom (small
//! `Result`-returning free functions, `bail!`-style aborts via
//! `GenError::placement`).

use std::ops::Range;

use crate::error::{GenError, Result};
use crate::model::MemAttrs;

#[derive(Debug, Clone)]
pub enum Subregion {
    Mapped(MemAttrs),
    Disabled,
    Child(Box<MpuNode>),
}

#[derive(Debug, Clone)]
pub struct MpuNode {
    /// log2 of the total region size in bytes.
    pub size_order: u32,
    /// log2 of the subregion count (0..=3, i.e. 1..=8 subregions).
    pub num_order: u32,
    /// Base address of this node's box.
    pub base: u32,
    pub subregions: Vec<Subregion>,
}

impl MpuNode {
    /// Every address byte covered by a `Mapped` leaf, paired with its
    /// attributes — used by tests to check coverage equals input.
    #[cfg(test)]
    pub fn mapped_ranges(&self) -> Vec<(Range<u64>, MemAttrs)> {
        let mut out = Vec::new();
        let sub_size = 1u64 << self.size_order;
        for (i, sub) in self.subregions.iter().enumerate() {
            let sub_start = self.base as u64 + i as u64 * sub_size;
            match sub {
                Subregion::Mapped(attrs) => out.push((sub_start..sub_start + sub_size, *attrs)),
                Subregion::Disabled => {}
                Subregion::Child(child) => out.extend(child.mapped_ranges()),
            }
        }
        out
    }
}

type Seg = (Range<u64>, MemAttrs);

pub fn synthesize(segments: &[Seg], max_total_order: u32) -> Result<MpuNode> {
    if segments.is_empty() {
        return Err(GenError::placement("cannot synthesize an MPU tree for zero segments"));
    }

    let lo = segments.iter().map(|(r, _)| r.start).min().unwrap();
    let hi = segments.iter().map(|(r, _)| r.end).max().unwrap();

    let total_order = smallest_containing_order(lo, hi, max_total_order)?;
    let base = (lo >> total_order) << total_order;

    // Step 2: directly mappable.
    if total_order >= 3 {
        let granularity = 1u64 << (total_order - 3);
        let first_attrs = segments[0].1;
        let uniform = segments.iter().all(|(_, a)| *a == first_attrs);
        let aligned = segments
            .iter()
            .all(|(r, _)| r.start % granularity == 0 && (r.end - r.start) % granularity == 0);
        if uniform && aligned {
            return Ok(MpuNode {
                size_order: total_order - 3,
                num_order: 3,
                base: base as u32,
                subregions: vec![Subregion::Mapped(first_attrs); 8],
            });
        }
    }

    // Step 3: pick num_order, preferring the coarsest (smallest) split
    // whose subregions each land fully inside one segment (or stay
    // empty) — finer splits than necessary just waste subregions.
    let num_order = pick_num_order(segments, base, total_order);
    let size_order = total_order - num_order;
    let sub_size = 1u64 << size_order;
    let count = 1usize << num_order;

    let mut subregions = Vec::with_capacity(count);
    for i in 0..count {
        let sub_start = base + i as u64 * sub_size;
        let sub_end = sub_start + sub_size;
        subregions.push(build_subregion(segments, sub_start, sub_end, size_order)?);
    }

    Ok(MpuNode {
        size_order,
        num_order,
        base: base as u32,
        subregions,
    })
}

fn smallest_containing_order(lo: u64, hi: u64, max_total_order: u32) -> Result<u32> {
    let mut order = 8u32;
    loop {
        let box_start = (lo >> order) << order;
        let box_end = box_start + (1u64 << order);
        if box_end >= hi {
            if order > max_total_order {
                return Err(GenError::placement(format!(
                    "page-table bounding box order {order} exceeds cap {max_total_order}"
                )));
            }
            return Ok(order);
        }
        order += 1;
        if order > 32 {
            return Err(GenError::placement("bounding box does not fit in 32 bits"));
        }
    }
}

fn pick_num_order(segments: &[Seg], base: u64, total_order: u32) -> u32 {
    for num_order in [1u32, 2, 3] {
        if num_order > total_order {
            break;
        }
        let sub_size = 1u64 << (total_order - num_order);
        let count = 1u64 << num_order;
        let clean = (0..count).all(|i| {
            let sub_start = base + i * sub_size;
            let sub_end = sub_start + sub_size;
            let covering = segments
                .iter()
                .filter(|(r, _)| r.start <= sub_start && r.end >= sub_end)
                .count();
            let straddles = segments
                .iter()
                .any(|(r, _)| r.start < sub_end && r.end > sub_start && !(r.start <= sub_start && r.end >= sub_end));
            covering <= 1 && !straddles
        });
        if clean {
            return num_order;
        }
    }
    1
}

fn build_subregion(
    segments: &[Seg],
    sub_start: u64,
    sub_end: u64,
    size_order: u32,
) -> Result<Subregion> {
    let covering: Vec<&Seg> = segments
        .iter()
        .filter(|(r, _)| r.start <= sub_start && r.end >= sub_end)
        .collect();
    let partial: Vec<&Seg> = segments
        .iter()
        .filter(|(r, _)| r.start < sub_end && r.end > sub_start && !(r.start <= sub_start && r.end >= sub_end))
        .collect();

    if covering.len() == 1 && partial.is_empty() {
        return Ok(Subregion::Mapped(covering[0].1));
    }
    if covering.is_empty() && partial.is_empty() {
        return Ok(Subregion::Disabled);
    }

    // first-wins: segments matching the first covering segment's
    // attributes need no further subdivision; the rest (including all
    // partials) get clipped and recursed.
    let first_attrs = covering.first().map(|(_, a)| *a);
    let mut recurse: Vec<Seg> = Vec::new();
    for (r, attrs) in covering.into_iter().chain(partial) {
        if first_attrs == Some(*attrs) && r.start <= sub_start && r.end >= sub_end {
            continue;
        }
        let start = r.start.max(sub_start);
        let end = r.end.min(sub_end);
        recurse.push((start..end, *attrs));
    }

    if recurse.is_empty() {
        return Ok(Subregion::Mapped(first_attrs.unwrap()));
    }

    let child = synthesize(&recurse, size_order)?;
    Ok(Subregion::Child(Box::new(child)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(bits: u8) -> MemAttrs {
        MemAttrs::from_bits_truncate(bits)
    }

    #[test]
    fn single_uniform_segment_maps_directly() {
        let rx = attrs(0b0000_0101); // R|X
        let segs = vec![(0x0801_0000u64..0x0801_1000, rx)];
        let node = synthesize(&segs, 32).unwrap();
        assert_eq!(node.num_order, 3);
        assert!(node.subregions.iter().all(|s| matches!(s, Subregion::Mapped(a) if *a == rx)));
    }

    #[test]
    fn two_differently_attributed_segments_pick_finer_num_order() {
        // Two 1 KiB code segments with a gap between them, differing
        // attrs -> scenario #4 from spec.md §8: expects num_order=2
        // (four 1 KiB subregions), not the finer num_order=3 split.
        let rx = attrs(0b0000_0101);
        let rw = attrs(0b0000_0011);
        let segs = vec![
            (0x0801_0000u64..0x0801_0400, rx),
            (0x0801_0C00u64..0x0801_1000, rw),
        ];
        let node = synthesize(&segs, 32).unwrap();
        assert_eq!(node.num_order, 2);
    }

    #[test]
    fn coverage_equals_input() {
        let rx = attrs(0b0000_0101);
        let rw = attrs(0b0000_0011);
        let segs = vec![
            (0x0801_0000u64..0x0801_0300, rx),
            (0x0801_0300u64..0x0801_0800, rw),
        ];
        let node = synthesize(&segs, 32).unwrap();
        let mapped = node.mapped_ranges();
        // Every input byte must be covered by exactly the right attrs.
        for (r, a) in &segs {
            let covered: u64 = mapped
                .iter()
                .filter(|(mr, ma)| ma == a && mr.start < r.end && mr.end > r.start)
                .map(|(mr, _)| mr.end.min(r.end) - mr.start.max(r.start))
                .sum();
            assert_eq!(covered, r.end - r.start);
        }
    }

    #[test]
    fn bounding_box_over_cap_fails() {
        let rx = attrs(0b0000_0101);
        let segs = vec![(0u64..0x1000, rx)];
        assert!(synthesize(&segs, 8).is_err());
    }
}
