use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use rif_core::Frame;

use crate::error::{DescriptorError, DescriptorResult};

pub type Descriptor = Vec<f32>;

/// Parallel arrays of descriptors, frames and owning image ids.
///
/// Entry `i` of every array describes the same feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureStore {
    descriptors: Vec<Descriptor>,
    frames: Vec<Frame>,
    image_ids: Vec<i32>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(capacity),
            frames: Vec::with_capacity(capacity),
            image_ids: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, descriptor: Descriptor, frame: Frame, image_id: i32) {
        self.descriptors.push(descriptor);
        self.frames.push(frame);
        self.image_ids.push(image_id);
    }

    /// Appends copies of every entry of `other`
    pub fn append(&mut self, other: &FeatureStore) {
        self.descriptors.extend_from_slice(&other.descriptors);
        self.frames.extend_from_slice(&other.frames);
        self.image_ids.extend_from_slice(&other.image_ids);
    }

    /// Truncates, or pads with empty entries
    pub fn resize(&mut self, len: usize) {
        self.descriptors.resize_with(len, Vec::new);
        self.frames.resize(len, Frame::default());
        self.image_ids.resize(len, 0);
    }

    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.frames.clear();
        self.image_ids.clear();
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor(&self, index: usize) -> &Descriptor {
        &self.descriptors[index]
    }

    pub fn frame(&self, index: usize) -> &Frame {
        &self.frames[index]
    }

    pub fn frame_mut(&mut self, index: usize) -> &mut Frame {
        &mut self.frames[index]
    }

    pub fn image_id(&self, index: usize) -> i32 {
        self.image_ids[index]
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn image_ids(&self) -> &[i32] {
        &self.image_ids
    }

    /// Distinct image ids in order of first appearance
    pub fn unique_image_ids(&self) -> Vec<i32> {
        let mut unique = Vec::new();
        for &id in &self.image_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        unique
    }

    /// Descriptors belonging to `image_id`, in store order
    pub fn image_descriptors(&self, image_id: i32) -> Vec<&Descriptor> {
        self.image_ids
            .iter()
            .zip(&self.descriptors)
            .filter(|&(&id, _)| id == image_id)
            .map(|(_, desc)| desc)
            .collect()
    }

    /// Keeps only the listed entries, in the listed order. Indices must be
    /// in range and distinct; the store is left untouched otherwise.
    pub fn retain_indices(&mut self, indices: &[usize]) -> DescriptorResult<()> {
        let mut seen = vec![false; self.len()];
        for &index in indices {
            match seen.get_mut(index) {
                Some(flag) if !*flag => *flag = true,
                _ => return Err(DescriptorError::InvalidIndex { index, len: self.len() }),
            }
        }

        let descriptors = indices.iter().map(|&i| std::mem::take(&mut self.descriptors[i])).collect();
        self.frames = indices.iter().map(|&i| self.frames[i]).collect();
        self.image_ids = indices.iter().map(|&i| self.image_ids[i]).collect();
        self.descriptors = descriptors;
        Ok(())
    }

    /// Exact equality of ids, frames and descriptors
    pub fn is_equal_to(&self, other: &FeatureStore) -> bool {
        self == other
    }

    /// Writes the little-endian binary format:
    /// `i32 count`, then per entry `i32 id`, `u8 frame_dim`, frame `f32`s,
    /// `u8 desc_dim`, descriptor `f32`s.
    pub fn to_writer<W: Write>(&self, writer: &mut W) -> DescriptorResult<()> {
        writer.write_all(&(self.len() as i32).to_le_bytes())?;

        for i in 0..self.len() {
            writer.write_all(&self.image_ids[i].to_le_bytes())?;

            let frame = self.frames[i].to_array();
            writer.write_all(&[frame.len() as u8])?;
            for v in frame {
                writer.write_all(&v.to_le_bytes())?;
            }

            let desc = &self.descriptors[i];
            let dim = u8::try_from(desc.len()).map_err(|_| DescriptorError::DimensionTooLarge {
                what: "Descriptor",
                dim: desc.len(),
            })?;
            writer.write_all(&[dim])?;
            for v in desc {
                writer.write_all(&v.to_le_bytes())?;
            }
        }
        Ok(())
    }

    /// Reads the binary format. A non-positive count or a truncated entry
    /// stops the read and keeps the entries parsed so far. `max` caps the
    /// number of entries read.
    pub fn from_reader<R: Read>(reader: &mut R, max: Option<usize>) -> FeatureStore {
        let mut store = FeatureStore::new();

        let count = match read_i32(reader) {
            Some(count) if count > 0 => count as usize,
            _ => {
                log::warn!("Feature store is empty or malformed");
                return store;
            }
        };
        let count = max.map_or(count, |m| count.min(m));

        for i in 0..count {
            match read_entry(reader) {
                Some((id, frame, desc)) => store.push(desc, frame, id),
                None => {
                    log::warn!("Feature store truncated after {} of {} entries", i, count);
                    break;
                }
            }
        }
        store
    }

    pub fn write_binary<P: AsRef<Path>>(&self, path: P) -> DescriptorResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_binary<P: AsRef<Path>>(path: P, max: Option<usize>) -> DescriptorResult<FeatureStore> {
        let mut reader = BufReader::new(File::open(path)?);
        Ok(Self::from_reader(&mut reader, max))
    }

    /// Whitespace-separated text: a `count` line, then per entry
    /// `id frame_dim f... desc_dim d...`
    pub fn to_text_writer<W: Write>(&self, writer: &mut W) -> DescriptorResult<()> {
        writeln!(writer, "{}", self.len())?;
        for i in 0..self.len() {
            let frame = self.frames[i].to_array();
            write!(writer, "{} {}", self.image_ids[i], frame.len())?;
            for v in frame {
                write!(writer, " {}", v)?;
            }
            write!(writer, " {}", self.descriptors[i].len())?;
            for v in &self.descriptors[i] {
                write!(writer, " {}", v)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Parses the text format with the same partial-read behavior as
    /// [`FeatureStore::from_reader`]
    pub fn from_text_reader<R: BufRead>(reader: R, max: Option<usize>) -> FeatureStore {
        let mut store = FeatureStore::new();
        let mut tokens = reader
            .lines()
            .map_while(Result::ok)
            .flat_map(|line| line.split_whitespace().map(str::to_owned).collect::<Vec<_>>());

        let count = match tokens.next().and_then(|t| t.parse::<i64>().ok()) {
            Some(count) if count > 0 => count as usize,
            _ => {
                log::warn!("Feature store text is empty or malformed");
                return store;
            }
        };
        let count = max.map_or(count, |m| count.min(m));

        for i in 0..count {
            match parse_text_entry(&mut tokens) {
                Some((id, frame, desc)) => store.push(desc, frame, id),
                None => {
                    log::warn!("Feature store text truncated after {} of {} entries", i, count);
                    break;
                }
            }
        }
        store
    }

    pub fn write_text<P: AsRef<Path>>(&self, path: P) -> DescriptorResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_text_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_text<P: AsRef<Path>>(path: P, max: Option<usize>) -> DescriptorResult<FeatureStore> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Self::from_text_reader(reader, max))
    }
}

fn read_i32<R: Read>(reader: &mut R) -> Option<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).ok()?;
    Some(i32::from_le_bytes(buf))
}

fn read_f32s<R: Read>(reader: &mut R) -> Option<Vec<f32>> {
    let mut dim = [0u8; 1];
    reader.read_exact(&mut dim).ok()?;
    let mut bytes = vec![0u8; dim[0] as usize * 4];
    reader.read_exact(&mut bytes).ok()?;
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn read_entry<R: Read>(reader: &mut R) -> Option<(i32, Frame, Descriptor)> {
    let id = read_i32(reader)?;
    let frame = Frame::from_slice(&read_f32s(reader)?);
    let desc = read_f32s(reader)?;
    Some((id, frame, desc))
}

fn parse_text_values(tokens: &mut impl Iterator<Item = String>) -> Option<Vec<f32>> {
    let dim: usize = tokens.next()?.parse().ok()?;
    (0..dim).map(|_| tokens.next()?.parse().ok()).collect()
}

fn parse_text_entry(tokens: &mut impl Iterator<Item = String>) -> Option<(i32, Frame, Descriptor)> {
    let id: i32 = tokens.next()?.parse().ok()?;
    let frame = Frame::from_slice(&parse_text_values(tokens)?);
    let desc = parse_text_values(tokens)?;
    Some((id, frame, desc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn create_test_store() -> FeatureStore {
        let mut store = FeatureStore::new();
        store.push(vec![0.25, 0.75], Frame::new(10.0, 20.0, 0.0, 40.0), 3);
        store.push(vec![0.5, 0.5], Frame::new(1.5, 2.5, 1.0, 35.0), 7);
        store.push(vec![1.0, 0.0], Frame::new(7.0, 8.0, 0.0, 31.0), 3);
        store
    }

    fn to_bytes(store: &FeatureStore) -> Vec<u8> {
        let mut bytes = Vec::new();
        store.to_writer(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_binary_layout() {
        let mut store = FeatureStore::new();
        store.push(vec![1.0], Frame::new(2.0, 3.0, 0.0, 4.0), 9);
        let bytes = to_bytes(&store);

        // count + id + (1 + 5 * 4) + (1 + 4)
        assert_eq!(bytes.len(), 4 + 4 + 21 + 5);
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &9i32.to_le_bytes());
        assert_eq!(bytes[8], 5);
        assert_eq!(bytes[29], 1);
        assert_eq!(&bytes[30..34], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_binary_round_trip_with_max() {
        let store = create_test_store();
        let bytes = to_bytes(&store);

        let read = FeatureStore::from_reader(&mut Cursor::new(&bytes), None);
        assert!(read.is_equal_to(&store));

        let limited = FeatureStore::from_reader(&mut Cursor::new(&bytes), Some(2));
        assert_eq!(limited.len(), 2);
        assert_eq!(limited.image_id(1), 7);
    }

    #[test]
    fn test_malformed_count_yields_empty() {
        let bytes = (-4i32).to_le_bytes();
        assert!(FeatureStore::from_reader(&mut Cursor::new(&bytes[..]), None).is_empty());
        assert!(FeatureStore::from_reader(&mut Cursor::new(&[0u8, 0][..]), None).is_empty());
    }

    #[test]
    fn test_truncated_read_keeps_prefix() {
        let store = create_test_store();
        let bytes = to_bytes(&store);
        let truncated = &bytes[..bytes.len() - 3];
        let read = FeatureStore::from_reader(&mut Cursor::new(truncated), None);
        assert_eq!(read.len(), 2);
        assert_eq!(read.frame(1), store.frame(1));
    }

    #[test]
    fn test_oversized_descriptor_rejected() {
        let mut store = FeatureStore::new();
        store.push(vec![0.0; 300], Frame::default(), 0);
        let mut bytes = Vec::new();
        assert!(matches!(
            store.to_writer(&mut bytes),
            Err(DescriptorError::DimensionTooLarge { dim: 300, .. })
        ));
    }

    #[test]
    fn test_text_round_trip() {
        let store = create_test_store();
        let mut text = Vec::new();
        store.to_text_writer(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.starts_with("3\n3 5 10 20 0 0 40 2 0.25 0.75\n"));

        let read = FeatureStore::from_text_reader(Cursor::new(text.as_bytes()), None);
        assert!(read.is_equal_to(&store));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("rif-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("features.bin");

        let store = create_test_store();
        store.write_binary(&path).unwrap();
        assert!(FeatureStore::read_binary(&path, None).unwrap().is_equal_to(&store));

        assert!(FeatureStore::read_binary(dir.join("missing.bin"), None).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unique_ids_and_image_descriptors() {
        let store = create_test_store();
        assert_eq!(store.unique_image_ids(), vec![3, 7]);
        let descs = store.image_descriptors(3);
        assert_eq!(descs, vec![&vec![0.25, 0.75], &vec![1.0, 0.0]]);
    }

    #[test]
    fn test_retain_rejects_bad_indices() {
        let mut store = create_test_store();
        let before = store.clone();

        let out_of_range = store.retain_indices(&[0, 3]);
        assert!(matches!(out_of_range, Err(DescriptorError::InvalidIndex { index: 3, len: 3 })));
        assert_eq!(store, before);

        let repeated = store.retain_indices(&[1, 1]);
        assert!(matches!(repeated, Err(DescriptorError::InvalidIndex { index: 1, .. })));
        assert_eq!(store, before);

        store.retain_indices(&[]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_resize_retain() {
        let mut store = create_test_store();
        let other = create_test_store();
        store.append(&other);
        assert_eq!(store.len(), 6);

        store.retain_indices(&[4, 0]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.image_id(0), 7);
        assert_eq!(store.descriptor(1), &vec![0.25, 0.75]);

        store.resize(3);
        assert_eq!(store.len(), 3);
        assert!(store.descriptor(2).is_empty());

        store.clear();
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn prop_binary_round_trip(
            entries in prop::collection::vec(
                (any::<i32>(), prop::array::uniform5(-1e6f32..1e6), prop::collection::vec(0.0f32..1.0, 0..120)),
                1..20,
            )
        ) {
            let mut store = FeatureStore::new();
            for (id, frame, desc) in entries {
                store.push(desc, Frame::from_slice(&frame), id);
            }
            let bytes = to_bytes(&store);
            let read = FeatureStore::from_reader(&mut Cursor::new(&bytes), None);
            prop_assert!(read.is_equal_to(&store));
        }
    }
}
