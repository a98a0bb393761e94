use rif_match::AffineModel;

/// Outline of a recognised reference image in current-frame coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPolygon {
    /// Index of the reference image in the database
    pub reference: usize,
    pub label: String,
    pub corners: [(f32, f32); 4],
}

impl TrackedPolygon {
    /// Reference image bounds `(0,0) (w-1,0) (w-1,h-1) (0,h-1)` mapped by `model`
    pub fn from_reference(reference: usize, label: &str, size: (usize, usize), model: &AffineModel) -> Self {
        let w = size.0.saturating_sub(1) as f32;
        let h = size.1.saturating_sub(1) as f32;
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(x, y)| model.transform(x, y));
        Self {
            reference,
            label: label.to_string(),
            corners,
        }
    }

    pub fn transform(&mut self, model: &AffineModel) {
        for corner in &mut self.corners {
            *corner = model.transform(corner.0, corner.1);
        }
    }

    pub fn centroid(&self) -> (f32, f32) {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
        (sx / 4.0, sy / 4.0)
    }

    /// Closed outline as consecutive corner pairs
    pub fn edges(&self) -> impl Iterator<Item = ((f32, f32), (f32, f32))> + '_ {
        (0..4).map(move |i| (self.corners[i], self.corners[(i + 1) % 4]))
    }
}

/// Keeps reference outlines locked onto the scene between database queries
#[derive(Debug, Clone, Default)]
pub struct PolygonTracker {
    polygons: Vec<TrackedPolygon>,
}

impl PolygonTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polygons(&self) -> &[TrackedPolygon] {
        &self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn is_tracking(&self, reference: usize) -> bool {
        self.polygons.iter().any(|p| p.reference == reference)
    }

    /// Move every outline by the per-frame camera motion
    pub fn propagate(&mut self, transform: &AffineModel) {
        for polygon in &mut self.polygons {
            polygon.transform(transform);
        }
    }

    /// Start tracking each reference that has a model and is not yet tracked.
    ///
    /// `models`, `sizes` and `labels` are indexed by reference image.
    pub fn update_polygons(&mut self, models: &[Option<AffineModel>], sizes: &[(usize, usize)], labels: &[String]) {
        for (reference, model) in models.iter().enumerate() {
            let Some(model) = model else {
                continue;
            };
            if self.is_tracking(reference) {
                continue;
            }
            let (Some(&size), Some(label)) = (sizes.get(reference), labels.get(reference)) else {
                log::warn!("No size or label for reference image {}", reference);
                continue;
            };
            log::info!("Locked onto reference {} ({})", reference, label);
            self.polygons
                .push(TrackedPolygon::from_reference(reference, label, size, model));
        }
    }

    pub fn reset(&mut self) {
        if !self.polygons.is_empty() {
            log::debug!("Dropping {} tracked polygons", self.polygons.len());
        }
        self.polygons.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("CD {:02}", i)).collect()
    }

    #[test]
    fn test_reference_corners() {
        let polygon = TrackedPolygon::from_reference(0, "a", (100, 50), &AffineModel::identity());
        assert_eq!(polygon.corners, [(0.0, 0.0), (99.0, 0.0), (99.0, 49.0), (0.0, 49.0)]);
        assert_eq!(polygon.centroid(), (49.5, 24.5));
        assert_eq!(polygon.edges().count(), 4);
    }

    #[test]
    fn test_update_adds_untracked_only() {
        let mut tracker = PolygonTracker::new();
        let models = vec![
            Some(AffineModel::from_translation(10.0, 0.0)),
            None,
            Some(AffineModel::identity()),
        ];
        let sizes = vec![(20, 20); 3];
        tracker.update_polygons(&models, &sizes, &labels(3));
        assert_eq!(tracker.len(), 2);
        assert!(tracker.is_tracking(0));
        assert!(!tracker.is_tracking(1));
        assert_eq!(tracker.polygons()[0].corners[0], (10.0, 0.0));
        assert_eq!(tracker.polygons()[1].label, "CD 02");

        // Already tracked references keep their propagated outline
        let moved = vec![Some(AffineModel::from_translation(50.0, 50.0)), None, None];
        tracker.update_polygons(&moved, &sizes, &labels(3));
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.polygons()[0].corners[0], (10.0, 0.0));
    }

    #[test]
    fn test_propagate_and_reset() {
        let mut tracker = PolygonTracker::new();
        tracker.update_polygons(&[Some(AffineModel::identity())], &[(11, 11)], &labels(1));
        tracker.propagate(&AffineModel::from_rotation(std::f64::consts::FRAC_PI_2, 0.0, 0.0));
        let (x, y) = tracker.polygons()[0].corners[1];
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(y, 10.0, epsilon = 1e-5);

        tracker.reset();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_missing_metadata_skipped() {
        let mut tracker = PolygonTracker::new();
        tracker.update_polygons(&[Some(AffineModel::identity())], &[], &[]);
        assert!(tracker.is_empty());
    }

    proptest! {
        #[test]
        fn prop_centroid_follows_translation(
            w in 2usize..400,
            h in 2usize..400,
            tx in -200.0f64..200.0,
            ty in -200.0f64..200.0,
        ) {
            let mut polygon = TrackedPolygon::from_reference(0, "a", (w, h), &AffineModel::identity());
            let (cx, cy) = polygon.centroid();
            polygon.transform(&AffineModel::from_translation(tx, ty));
            let (nx, ny) = polygon.centroid();
            prop_assert!((nx - cx - tx as f32).abs() < 1e-2);
            prop_assert!((ny - cy - ty as f32).abs() < 1e-2);
        }
    }
}
