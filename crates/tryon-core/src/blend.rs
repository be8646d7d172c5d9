//! 8-bit blend math.
//!
//! Channels are mapped to [0, 1], blended, then rounded back. A source
//! painted with coverage `alpha` over an opaque backdrop yields
//! `cb + (B(cb, cs) - cb) * alpha`, matching source-over compositing
//! with a separable blend function `B`.

use crate::types::{BlendMode, Rgb};
use image::Rgb as Pixel;

fn unit(v: u8) -> f32 {
    v as f32 / 255.0
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn overlay(cb: f32, cs: f32) -> f32 {
    if cb <= 0.5 {
        2.0 * cb * cs
    } else {
        1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
    }
}

/// Blend one channel with `mode` at coverage `alpha`.
pub fn blend_channel(mode: BlendMode, backdrop: u8, source: u8, alpha: f32) -> u8 {
    let cb = unit(backdrop);
    let cs = unit(source);
    let mixed = match mode {
        BlendMode::Multiply => cb * cs,
        BlendMode::Overlay => overlay(cb, cs),
    };
    to_u8(cb + (mixed - cb) * alpha.clamp(0.0, 1.0))
}

/// Plain alpha compositing of one channel (no blend function).
pub fn mix_channel(backdrop: u8, source: u8, alpha: f32) -> u8 {
    let cb = unit(backdrop);
    let cs = unit(source);
    to_u8(cb + (cs - cb) * alpha.clamp(0.0, 1.0))
}

/// Blend `color` into `pixel` in place.
pub fn blend_pixel(pixel: &mut Pixel<u8>, mode: BlendMode, color: Rgb, alpha: f32) {
    for (c, s) in pixel.0.iter_mut().zip(color.channels()) {
        *c = blend_channel(mode, *c, s, alpha);
    }
}

/// Alpha-composite `color` over `pixel` in place.
pub fn mix_pixel(pixel: &mut Pixel<u8>, color: Rgb, alpha: f32) {
    for (c, s) in pixel.0.iter_mut().zip(color.channels()) {
        *c = mix_channel(*c, s, alpha);
    }
}
