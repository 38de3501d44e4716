//! Fixtures shared by the unit tests of this crate.

use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

fn mix(mut v: u32) -> u32 {
    v ^= v >> 16;
    v = v.wrapping_mul(0x7feb_352d);
    v ^= v >> 15;
    v = v.wrapping_mul(0x846c_a68b);
    v ^ (v >> 16)
}

/// Encodes deterministic pixel noise as PNG. Noise keeps the file close to its raw size.
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, _] = mix(y.wrapping_mul(width).wrapping_add(x)).to_le_bytes();
        image::Rgb([r, g, b])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode sample png");
    out.into_inner()
}
