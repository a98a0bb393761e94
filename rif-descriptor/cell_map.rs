use std::f64::consts::PI;

use crate::error::{DescriptorError, DescriptorResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the polar cell layout over a square patch
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellConfig {
    pub patch_size: usize,
    pub num_radii: usize,
    pub num_angles: usize,
    pub radius_overlap: f32,
    pub angle_overlap: f32,
    /// Radius warp, `r = (dist / half_size)^exponent`
    pub exponent: f32,
    /// Keep only pixels with `(i + j) % (skip + 1) == 0`
    pub skip: usize,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self::annuli4_patch35_skip()
    }
}

impl CellConfig {
    pub const PRESET_NAMES: [&'static str; 4] = [
        "Annuli4Patch35Skip",
        "Annuli4Patch35",
        "Polar3x6Patch31Skip",
        "Polar3x6Patch31",
    ];

    pub fn annuli4_patch35_skip() -> Self {
        Self {
            patch_size: 35,
            num_radii: 4,
            num_angles: 1,
            radius_overlap: 0.0,
            angle_overlap: 0.0,
            exponent: 1.2,
            skip: 1,
        }
    }

    pub fn annuli4_patch35() -> Self {
        Self {
            skip: 0,
            ..Self::annuli4_patch35_skip()
        }
    }

    pub fn polar3x6_patch31_skip() -> Self {
        Self {
            patch_size: 31,
            num_radii: 3,
            num_angles: 6,
            radius_overlap: 0.0,
            angle_overlap: 0.0,
            exponent: 1.2,
            skip: 1,
        }
    }

    pub fn polar3x6_patch31() -> Self {
        Self {
            skip: 0,
            ..Self::polar3x6_patch31_skip()
        }
    }

    /// Look up a named preset
    pub fn from_name(name: &str) -> DescriptorResult<Self> {
        match name {
            "Annuli4Patch35Skip" => Ok(Self::annuli4_patch35_skip()),
            "Annuli4Patch35" => Ok(Self::annuli4_patch35()),
            "Polar3x6Patch31Skip" => Ok(Self::polar3x6_patch31_skip()),
            "Polar3x6Patch31" => Ok(Self::polar3x6_patch31()),
            other => Err(DescriptorError::UnknownCellConfig(other.to_string())),
        }
    }

    /// Centre cell plus `num_angles` sectors in every outer ring
    pub fn num_cells(&self) -> usize {
        (self.num_radii - 1) * self.num_angles + 1
    }

    pub fn validate(&self) -> DescriptorResult<()> {
        if self.patch_size < 3 || self.num_radii == 0 || self.num_angles == 0 {
            return Err(DescriptorError::InvalidGeometry {
                patch_size: self.patch_size,
                num_radii: self.num_radii,
                num_angles: self.num_angles,
            });
        }
        Ok(())
    }
}

/// Pixel-to-cell assignment for one [`CellConfig`].
///
/// Pixel `(i, j)` is column `i`, row `j` of the patch. Under overlap a pixel
/// may belong to several cells; pixels removed by `skip` or outside every
/// ring belong to none.
#[derive(Debug, Clone)]
pub struct CellMap {
    config: CellConfig,
    /// Row-major by `i * patch_size + j`
    pixel_cells: Vec<Vec<usize>>,
    cells: Vec<Vec<(usize, usize)>>,
    num_pixels: usize,
}

impl CellMap {
    pub fn new(config: CellConfig) -> DescriptorResult<Self> {
        config.validate()?;

        let patch = config.patch_size;
        let num_cells = config.num_cells();
        let mut pixel_cells = vec![Vec::new(); patch * patch];
        let mut cells = vec![Vec::new(); num_cells];
        let mut num_pixels = 0;

        let center = (patch as f64 - 1.0) / 2.0;
        let half_size = patch as f64 - center;
        let num_radii = config.num_radii as f64;
        let num_angles = config.num_angles as f64;
        let radius_thresh = 0.5 / num_radii * (1.0 + config.radius_overlap as f64);
        let angle_thresh = 0.5 / num_angles * (1.0 + config.angle_overlap as f64);

        for i in 0..patch {
            for j in 0..patch {
                if config.skip > 0 && (i + j) % (config.skip + 1) != 0 {
                    continue;
                }

                let x = i as f64 - center;
                let y = j as f64 - center;
                let radius = ((x * x + y * y).sqrt() / half_size).powf(config.exponent as f64);
                let theta = 1.0 - (y.atan2(x) / PI / 2.0) % 1.0;

                let mut cell = 0;
                for m in 0..config.num_radii {
                    let center_radius = m as f64 / num_radii;
                    let in_radius = (radius - center_radius).abs() <= radius_thresh;

                    // The innermost ring is a single undivided cell
                    let sectors = if m == 0 { 1 } else { config.num_angles };
                    for n in 0..sectors {
                        let in_angle = m == 0 || {
                            let center_theta = n as f64 / num_angles;
                            let d0 = (theta - center_theta).abs();
                            let d1 = (theta - 1.0 - center_theta).abs();
                            d0.min(d1) <= angle_thresh
                        };

                        if in_angle && in_radius {
                            pixel_cells[i * patch + j].push(cell);
                            cells[cell].push((i, j));
                            num_pixels += 1;
                        }
                        cell += 1;
                    }
                }
            }
        }

        log::trace!(
            "Cell map {}x{}: {} cells over {} pixel memberships",
            patch,
            patch,
            num_cells,
            num_pixels
        );

        Ok(Self {
            config,
            pixel_cells,
            cells,
            num_pixels,
        })
    }

    pub fn from_name(name: &str) -> DescriptorResult<Self> {
        Self::new(CellConfig::from_name(name)?)
    }

    pub fn config(&self) -> &CellConfig {
        &self.config
    }

    pub fn patch_size(&self) -> usize {
        self.config.patch_size
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total pixel memberships across all cells
    pub fn num_pixels(&self) -> usize {
        self.num_pixels
    }

    /// Cells containing patch pixel `(i, j)`
    pub fn cells_at(&self, i: usize, j: usize) -> &[usize] {
        &self.pixel_cells[i * self.config.patch_size + j]
    }

    /// Pixels of cell `index`
    pub fn cell(&self, index: usize) -> &[(usize, usize)] {
        &self.cells[index]
    }

    pub fn cells(&self) -> impl Iterator<Item = &[(usize, usize)]> {
        self.cells.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_inverse_maps(map: &CellMap) {
        let patch = map.patch_size();
        for (c, pixels) in map.cells().enumerate() {
            for &(i, j) in pixels {
                assert!(map.cells_at(i, j).contains(&c));
            }
        }
        for i in 0..patch {
            for j in 0..patch {
                for &c in map.cells_at(i, j) {
                    assert!(map.cell(c).contains(&(i, j)));
                }
            }
        }
    }

    #[test]
    fn test_presets() {
        for name in CellConfig::PRESET_NAMES {
            let map = CellMap::from_name(name).unwrap();
            assert_eq!(map.len(), map.config().num_cells());
            assert!(map.cells().all(|c| !c.is_empty()), "empty cell in {}", name);
            assert_inverse_maps(&map);
        }
        assert_eq!(CellMap::from_name("Annuli4Patch35").unwrap().len(), 4);
        assert_eq!(CellMap::from_name("Polar3x6Patch31").unwrap().len(), 13);
    }

    #[test]
    fn test_unknown_preset() {
        let result = CellMap::from_name("Hexagonal");
        assert!(matches!(result, Err(DescriptorError::UnknownCellConfig(_))));
    }

    #[test]
    fn test_invalid_geometry() {
        let config = CellConfig {
            num_radii: 0,
            ..CellConfig::default()
        };
        assert!(matches!(
            CellMap::new(config),
            Err(DescriptorError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_center_pixel_in_center_cell() {
        let map = CellMap::from_name("Annuli4Patch35").unwrap();
        assert_eq!(map.cells_at(17, 17), &[0]);
    }

    #[test]
    fn test_skip_halves_density() {
        let full = CellMap::from_name("Annuli4Patch35").unwrap();
        let skip = CellMap::from_name("Annuli4Patch35Skip").unwrap();
        assert!(skip.num_pixels() < full.num_pixels());
        for i in 0..35 {
            for j in 0..35 {
                if (i + j) % 2 != 0 {
                    assert!(skip.cells_at(i, j).is_empty());
                }
            }
        }
    }

    #[test]
    fn test_patch_corners_outside_rings() {
        let map = CellMap::from_name("Annuli4Patch35").unwrap();
        assert!(map.cells_at(0, 0).is_empty());
        assert!(map.cells_at(34, 34).is_empty());
    }

    proptest! {
        #[test]
        fn prop_cell_count_and_inverse_maps(
            half in 2usize..20,
            num_radii in 1usize..6,
            num_angles in 1usize..9,
            radius_overlap in 0.0f32..0.5,
            angle_overlap in 0.0f32..0.5,
            exponent in 0.5f32..2.0,
            skip in 0usize..3,
        ) {
            let config = CellConfig {
                patch_size: 2 * half + 1,
                num_radii,
                num_angles,
                radius_overlap,
                angle_overlap,
                exponent,
                skip,
            };
            let map = CellMap::new(config).unwrap();
            prop_assert_eq!(map.len(), (num_radii - 1) * num_angles + 1);

            let memberships: usize = map.cells().map(<[_]>::len).sum();
            prop_assert_eq!(memberships, map.num_pixels());
            assert_inverse_maps(&map);
        }
    }
}
