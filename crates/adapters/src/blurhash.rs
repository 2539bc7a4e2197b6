//! BlurHash placeholder decoder
//!
//! Decodes the compact base83 encoding into raw RGBA pixels. The hash holds a
//! DC color plus a grid of cosine AC components; each output pixel is the sum
//! of the components weighted by their basis at that position.

use std::f32::consts::PI;
use whiff_domain::{Image, PerceptualHashDecoder};

const BASE83: &[u8; 83] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

/// Media type of decoded placeholders
pub const RGBA_MEDIA_TYPE: &str = "image/x-rgba";

/// Largest placeholder decoded, in pixels
pub const MAX_PIXELS: u64 = 1 << 16;

#[derive(Debug, Default, Clone, Copy)]
pub struct BlurhashDecoder;

impl BlurhashDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PerceptualHashDecoder for BlurhashDecoder {
    fn decode(&self, hash: &str, width: u32, height: u32) -> Option<Image> {
        let pixels = decode_rgba(hash, width, height, 1.0)?;
        Some(Image::new(width, height, RGBA_MEDIA_TYPE, pixels))
    }
}

fn decode83(chars: &[u8]) -> Option<u32> {
    chars.iter().try_fold(0u32, |value, c| {
        let digit = BASE83.iter().position(|b| b == c)? as u32;
        Some(value * 83 + digit)
    })
}

fn srgb_to_linear(value: u32) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f32) -> u8 {
    let v = value.clamp(0.0, 1.0);
    let srgb = if v <= 0.003_130_8 {
        v * 12.92 * 255.0 + 0.5
    } else {
        (1.055 * v.powf(1.0 / 2.4) - 0.055) * 255.0 + 0.5
    };
    srgb as u8
}

fn sign_pow(value: f32, exp: f32) -> f32 {
    value.abs().powf(exp).copysign(value)
}

fn decode_dc(value: u32) -> [f32; 3] {
    [
        srgb_to_linear(value >> 16),
        srgb_to_linear((value >> 8) & 255),
        srgb_to_linear(value & 255),
    ]
}

fn decode_ac(value: u32, max_value: f32) -> [f32; 3] {
    let quant_r = value / (19 * 19);
    let quant_g = (value / 19) % 19;
    let quant_b = value % 19;
    [
        sign_pow((quant_r as f32 - 9.0) / 9.0, 2.0) * max_value,
        sign_pow((quant_g as f32 - 9.0) / 9.0, 2.0) * max_value,
        sign_pow((quant_b as f32 - 9.0) / 9.0, 2.0) * max_value,
    ]
}

/// Decode `hash` into `width * height` RGBA pixels.
///
/// `None` if the hash is malformed or the size is empty or above [`MAX_PIXELS`].
/// `punch` scales the contrast of the AC components.
pub fn decode_rgba(hash: &str, width: u32, height: u32, punch: f32) -> Option<Vec<u8>> {
    let bytes = hash.as_bytes();
    let pixel_count = u64::from(width) * u64::from(height);
    if bytes.len() < 6 || pixel_count == 0 || pixel_count > MAX_PIXELS {
        return None;
    }

    let size_flag = decode83(&bytes[0..1])?;
    let num_y = (size_flag / 9 + 1) as usize;
    let num_x = (size_flag % 9 + 1) as usize;
    if bytes.len() != 4 + 2 * num_x * num_y {
        return None;
    }

    let quantised_max = decode83(&bytes[1..2])?;
    let max_value = (quantised_max + 1) as f32 / 166.0 * punch;

    let mut colors = Vec::with_capacity(num_x * num_y);
    colors.push(decode_dc(decode83(&bytes[2..6])?));
    for i in 1..num_x * num_y {
        let start = 4 + i * 2;
        colors.push(decode_ac(decode83(&bytes[start..start + 2])?, max_value));
    }

    let (w, h) = (width as usize, height as usize);
    let mut pixels = Vec::with_capacity(w * h * 4);
    for y in 0..h {
        for x in 0..w {
            let mut rgb = [0.0f32; 3];
            for j in 0..num_y {
                for i in 0..num_x {
                    let basis = (PI * x as f32 * i as f32 / w as f32).cos()
                        * (PI * y as f32 * j as f32 / h as f32).cos();
                    let color = colors[i + j * num_x];
                    for (channel, component) in rgb.iter_mut().zip(color) {
                        *channel += component * basis;
                    }
                }
            }
            pixels.extend(rgb.map(linear_to_srgb));
            pixels.push(255);
        }
    }

    Some(pixels)
}
