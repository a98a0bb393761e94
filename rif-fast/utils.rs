//! Circular run detection over the 16 samples of the FAST circle

/// Packs the circle flags into a bitmask, bit `i` set when `pixels[i]` is true
pub fn circle_mask(pixels: &[bool; 16]) -> u16 {
    pixels
        .iter()
        .enumerate()
        .fold(0u16, |mask, (i, &p)| if p { mask | (1 << i) } else { mask })
}

/// True when the mask holds at least `min_count` consecutive set bits,
/// wrapping around the circle
pub fn has_consecutive_bits(mask: u16, min_count: usize) -> bool {
    if min_count > 16 || min_count == 0 {
        return false;
    }

    // AND of the mask with its rotations leaves a bit set only where a run
    // of `min_count` starts
    let mut test_mask = mask;
    for i in 1..min_count {
        test_mask &= mask.rotate_right(i as u32);
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}

pub fn has_consecutive_pixels(pixels: &[bool; 16], min_count: usize) -> bool {
    has_consecutive_bits(circle_mask(pixels), min_count)
}
