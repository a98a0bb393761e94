use rif_core::Frame;

use crate::error::{MatchError, MatchResult};

/// Uniform grid over frame positions for constant-time proximity lookup.
///
/// Each frame is registered in its own bin and the 8 surrounding bins, so a
/// lookup returns every frame within one bin of the query's position.
#[derive(Debug, Clone)]
pub struct FeatureHash {
    log2_bin: u32,
    table_width: usize,
    table_height: usize,
    bins: Vec<Vec<usize>>,
}

impl FeatureHash {
    /// Bins are `2^ceil(log2(bin_size))` pixels wide
    pub fn new(width: usize, height: usize, bin_size: usize, frames: &[Frame]) -> MatchResult<Self> {
        if bin_size == 0 {
            return Err(MatchError::InvalidBinSize(bin_size));
        }
        let log2_bin = bin_size.next_power_of_two().trailing_zeros();
        let table_width = (width >> log2_bin) + 1;
        let table_height = (height >> log2_bin) + 1;

        let mut hash = Self {
            log2_bin,
            table_width,
            table_height,
            bins: vec![Vec::new(); table_width * table_height],
        };

        for (index, frame) in frames.iter().enumerate() {
            let Some((bx, by)) = hash.bin_of(frame) else {
                continue;
            };
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if let Some(bin) = hash.bin_index(bx + dx, by + dy) {
                        hash.bins[bin].push(index);
                    }
                }
            }
        }

        log::trace!(
            "Feature hash {}x{} bins of {} px over {} frames",
            table_width,
            table_height,
            1usize << log2_bin,
            frames.len()
        );
        Ok(hash)
    }

    pub fn bin_size(&self) -> usize {
        1 << self.log2_bin
    }

    pub fn table_size(&self) -> (usize, usize) {
        (self.table_width, self.table_height)
    }

    /// Candidate frame indices near `frame`; empty outside the table
    pub fn neighbors(&self, frame: &Frame) -> &[usize] {
        match self.bin_of(frame).and_then(|(bx, by)| self.bin_index(bx, by)) {
            Some(bin) => &self.bins[bin],
            None => &[],
        }
    }

    fn bin_of(&self, frame: &Frame) -> Option<(i64, i64)> {
        if !frame.x.is_finite() || !frame.y.is_finite() {
            return None;
        }
        Some((
            (frame.x.floor() as i64) >> self.log2_bin,
            (frame.y.floor() as i64) >> self.log2_bin,
        ))
    }

    fn bin_index(&self, bx: i64, by: i64) -> Option<usize> {
        if bx < 0 || by < 0 {
            return None;
        }
        let (bx, by) = (bx as usize, by as usize);
        if bx >= self.table_width || by >= self.table_height {
            return None;
        }
        Some(by * self.table_width + bx)
    }
}
