//! Document backends for suzume. PDF support comes from pdfium behind the `pdf`
//! feature; the pixel post-processing here is backend-agnostic.

use rayon::prelude::*;

#[cfg(feature = "pdf")]
mod pdfium;

#[cfg(feature = "pdf")]
pub use pdfium::PdfiumProvider;

/// Inverts the colour channels of an RGBA buffer in place, leaving alpha alone.
/// Used for the dark theme.
pub fn invert_pixels(pixels: &mut [u8]) {
    pixels.par_chunks_exact_mut(4).for_each(|px| {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inversion_keeps_alpha() {
        let mut pixels = vec![0, 128, 255, 200, 10, 20, 30, 0];
        invert_pixels(&mut pixels);
        assert_eq!(pixels, vec![255, 127, 0, 200, 245, 235, 225, 0]);
    }

    #[test]
    fn trailing_partial_pixel_is_untouched() {
        let mut pixels = vec![0, 0, 0, 255, 7, 7];
        invert_pixels(&mut pixels);
        assert_eq!(pixels, vec![255, 255, 255, 255, 7, 7]);
    }
}
