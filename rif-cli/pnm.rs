//! PGM/PPM files for offline fixtures and overlay dumps.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder, ImageReader, RgbImage};
use rif_core::PixelBuffer;

use crate::error::{CliError, CliResult};

/// Read a PGM as one channel or a PPM as three
pub fn read_pnm<P: AsRef<Path>>(path: P) -> CliResult<PixelBuffer<u8>> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let (width, height) = (image.width() as usize, image.height() as usize);
    let buffer = if image.color().channel_count() == 1 {
        PixelBuffer::from_vec(width, height, 1, image.to_luma8().into_raw())?
    } else {
        PixelBuffer::from_vec(width, height, 3, image.to_rgb8().into_raw())?
    };
    Ok(buffer)
}

/// Binary P5 for one channel, P6 for three
pub fn write_pnm<P: AsRef<Path>>(path: P, image: &PixelBuffer<u8>) -> CliResult<()> {
    let (subtype, color) = match image.channels() {
        1 => (PnmSubtype::Graymap(SampleEncoding::Binary), ExtendedColorType::L8),
        3 => (PnmSubtype::Pixmap(SampleEncoding::Binary), ExtendedColorType::Rgb8),
        channels => return Err(CliError::UnsupportedChannels { channels }),
    };
    let writer = BufWriter::new(File::create(path)?);
    PnmEncoder::new(writer).with_subtype(subtype).write_image(
        image.as_slice(),
        image.width() as u32,
        image.height() as u32,
        color,
    )?;
    Ok(())
}

/// Grayscale buffer replicated into RGB for drawing
pub fn gray_to_rgb(image: &PixelBuffer<u8>) -> RgbImage {
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let v = image.at(x as usize, y as usize, 0);
        image::Rgb([v, v, v])
    })
}

pub fn rgb_to_buffer(image: &RgbImage) -> CliResult<PixelBuffer<u8>> {
    let (width, height) = image.dimensions();
    Ok(PixelBuffer::from_vec(width as usize, height as usize, 3, image.as_raw().clone())?)
}
