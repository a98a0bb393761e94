use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use rif_core::{GrayImage, Match};
use rif_descriptor::{Descriptor, FeatureStore, Quantize5x5, RifExtractor};
use rif_match::{AffineModel, BruteForce, L1, Ransac};

use crate::config::MatcherConfig;
use crate::error::{TrackError, TrackResult};

/// A database image and the name shown when it is recognised
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub image: GrayImage,
    pub label: String,
}

impl ReferenceImage {
    pub fn new(image: GrayImage, label: impl Into<String>) -> Self {
        Self {
            image,
            label: label.into(),
        }
    }

    /// Load any format the `image` crate decodes, converted to grayscale
    pub fn open<P: AsRef<Path>>(path: P, label: impl Into<String>) -> TrackResult<Self> {
        let image = load_gray_image(path)?;
        Ok(Self::new(image, label))
    }

    /// `"CD 00"`, `"CD 01"`, ...
    pub fn default_label(index: usize) -> String {
        format!("CD {:02}", index)
    }
}

/// Decode an image file into a single-channel buffer
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> TrackResult<GrayImage> {
    let luma = image::open(path.as_ref())?.to_luma8();
    let (width, height) = luma.dimensions();
    GrayImage::from_vec(width as usize, height as usize, 1, luma.into_raw())
        .map_err(|e| TrackError::Extraction(e.into()))
}

/// Per-reference results of one database query, indexed by reference image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Maps reference image coordinates into the query image
    pub models: Vec<Option<AffineModel>>,
    pub matches: Vec<Vec<Match>>,
    /// Indices into the corresponding `matches` list
    pub inliers: Vec<Vec<usize>>,
}

impl QueryResult {
    /// References with a verified model
    pub fn recognised(&self) -> impl Iterator<Item = usize> + '_ {
        self.models
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|_| i))
    }
}

#[derive(Debug, Clone)]
struct DatabaseEntry {
    label: String,
    size: (usize, usize),
    store: FeatureStore,
    quantized: Vec<Vec<u8>>,
}

/// Reference database with ratio-test matching and RANSAC verification
#[derive(Debug)]
pub struct Matcher {
    config: MatcherConfig,
    extractor: RifExtractor<Quantize5x5>,
    search: BruteForce<L1>,
    database: Vec<DatabaseEntry>,
}

/// Histogram entries scaled to bytes, `int(255 v)`
pub fn quantize_descriptor(descriptor: &[f32]) -> Vec<u8> {
    descriptor.iter().map(|&v| (255.0 * v) as u8).collect()
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> TrackResult<Self> {
        config.validate()?;
        let extractor = RifExtractor::new(config.extractor.clone())?;
        log::debug!("{}", config.summary());
        Ok(Self {
            config,
            extractor,
            search: BruteForce::new(L1),
            database: Vec::new(),
        })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.database.len()
    }

    pub fn is_empty(&self) -> bool {
        self.database.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.database.iter().map(|e| e.label.clone()).collect()
    }

    /// `(width, height)` of each reference image
    pub fn reference_sizes(&self) -> Vec<(usize, usize)> {
        self.database.iter().map(|e| e.size).collect()
    }

    /// Features kept for reference `index`
    pub fn reference_store(&self, index: usize) -> Option<&FeatureStore> {
        self.database.get(index).map(|e| &e.store)
    }

    /// Total descriptors across all references
    pub fn descriptor_count(&self) -> usize {
        self.database.iter().map(|e| e.store.len()).sum()
    }

    /// Features of an image under the database extraction settings
    pub fn extract(&self, image: &GrayImage) -> TrackResult<FeatureStore> {
        Ok(self.extractor.extract_store(image, 0)?)
    }

    /// Load and index images from disk, labelled `"CD %02d"`
    pub fn build_database_from_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> TrackResult<()> {
        let references = paths
            .iter()
            .enumerate()
            .map(|(i, path)| ReferenceImage::open(path, ReferenceImage::default_label(i)))
            .collect::<TrackResult<Vec<_>>>()?;
        self.build_database(&references)
    }

    pub fn build_database(&mut self, references: &[ReferenceImage]) -> TrackResult<()> {
        let never = AtomicBool::new(false);
        self.build_database_cancellable(references, &never)
    }

    /// Replace the database; gives up with [`TrackError::Cancelled`] once
    /// `cancel` is raised
    pub fn build_database_cancellable(
        &mut self,
        references: &[ReferenceImage],
        cancel: &AtomicBool,
    ) -> TrackResult<()> {
        self.database.clear();

        let database = references
            .par_iter()
            .enumerate()
            .map(|(index, reference)| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(TrackError::Cancelled);
                }
                self.index_reference(index, reference)
            })
            .collect::<TrackResult<Vec<_>>>()?;

        self.database = database;
        log::info!(
            "Built database of {} images, {} descriptors",
            self.database.len(),
            self.descriptor_count()
        );
        Ok(())
    }

    fn index_reference(&self, index: usize, reference: &ReferenceImage) -> TrackResult<DatabaseEntry> {
        let mut store = self.extractor.extract_store(&reference.image, index as i32)?;
        let mut quantized: Vec<Vec<u8>> = store
            .descriptors()
            .iter()
            .map(|d| quantize_descriptor(d))
            .collect();

        let keep = self.unique_descriptors(&quantized);
        log::debug!(
            "Reference {} ({}): kept {}/{} distinctive descriptors",
            index,
            reference.label,
            keep.len(),
            quantized.len()
        );
        store.retain_indices(&keep)?;
        quantized = keep.iter().map(|&i| std::mem::take(&mut quantized[i])).collect();

        Ok(DatabaseEntry {
            label: reference.label.clone(),
            size: reference.image.dimensions(),
            store,
            quantized,
        })
    }

    /// Indices of descriptors whose nearest other descriptor is at least
    /// `unique_desc_thresh` away. The closest hit is the descriptor itself.
    fn unique_descriptors(&self, quantized: &[Vec<u8>]) -> Vec<usize> {
        let thresh = self.config.unique_desc_thresh;
        quantized
            .par_iter()
            .enumerate()
            .filter(|(_, q)| {
                let nn = self.search.find_nn(2, q.as_slice(), quantized);
                nn.get(1).is_none_or(|second| second.distance >= thresh)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Detect features in `image` and query them
    pub fn query_image(&self, image: &GrayImage) -> TrackResult<(FeatureStore, QueryResult)> {
        let store = self.extract(image)?;
        let result = self.query(&store);
        Ok((store, result))
    }

    pub fn query(&self, query: &FeatureStore) -> QueryResult {
        let never = AtomicBool::new(false);
        self.query_cancellable(query, &never).unwrap_or_default()
    }

    /// Match `query` against every reference in parallel; `None` once
    /// `cancel` is raised
    pub fn query_cancellable(&self, query: &FeatureStore, cancel: &AtomicBool) -> Option<QueryResult> {
        let quantized: Vec<Vec<u8>> = query
            .descriptors()
            .iter()
            .map(|d: &Descriptor| quantize_descriptor(d))
            .collect();

        let per_reference: Vec<(Option<AffineModel>, Vec<Match>, Vec<usize>)> = self
            .database
            .par_iter()
            .map(|entry| self.query_reference(query, &quantized, entry, cancel))
            .collect::<Option<Vec<_>>>()?;

        let mut result = QueryResult::default();
        for (model, matches, inliers) in per_reference {
            result.models.push(model);
            result.matches.push(matches);
            result.inliers.push(inliers);
        }
        log::info!(
            "Query of {} features recognised {:?}",
            query.len(),
            result.recognised().collect::<Vec<_>>()
        );
        Some(result)
    }

    fn query_reference(
        &self,
        query: &FeatureStore,
        quantized: &[Vec<u8>],
        entry: &DatabaseEntry,
        cancel: &AtomicBool,
    ) -> Option<(Option<AffineModel>, Vec<Match>, Vec<usize>)> {
        let mut matches = Vec::new();
        for (index, q) in quantized.iter().enumerate() {
            let nn = self
                .search
                .find_nn_cancellable(2, q.as_slice(), &entry.quantized, cancel)?;
            if let [first, second] = nn.as_slice() {
                if first.distance < self.config.ratio_thresh * second.distance {
                    matches.push(Match::new(index, first.index));
                }
            }
        }

        if matches.len() < self.config.min_matches {
            log::debug!("{}: {} matches, too few to verify", entry.label, matches.len());
            return Some((None, matches, Vec::new()));
        }

        let mut ransac = Ransac::new(self.config.ransac.clone());
        let outcome = ransac.verify(query.frames(), entry.store.frames(), &matches);
        log::debug!(
            "{}: {} matches, {} inliers",
            entry.label,
            matches.len(),
            outcome.as_ref().map_or(0, |o| o.inliers.len())
        );
        Some(match outcome {
            Some(outcome) => (Some(outcome.model), matches, outcome.inliers),
            None => (None, matches, Vec::new()),
        })
    }
}
