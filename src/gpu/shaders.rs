//! Program sources for the built-in passes
//!
//! Fragment stages follow one binding convention: uniform block at binding
//! 0, sampler at binding 1, texture unit `n` at binding `2 + n`. Uniform
//! blocks hold one `vec4<f32>` per scalar/vector slot and one per array
//! element, in declaration order.

use super::ProgramSource;

pub const COPY: &str = "copy";
pub const GRAYSCALE: &str = "grayscale";
pub const BIAS: &str = "bias";
pub const CONVOLVE_1D: &str = "convolve-1d";
pub const COMBINE: &str = "combine";
pub const LIGHT_SCATTERING: &str = "light-scattering";
pub const NFAA: &str = "nfaa";
pub const MOTION_BLUR_MAX: &str = "motionblur-max";
pub const MOTION_BLUR_MIX: &str = "motionblur-mix";
pub const LENS_FLARE: &str = "lens-flare";
pub const FISHEYE: &str = "fisheye";

/// Full-viewport triangle shared by every pass
pub const SCREENSPACE_VERT: &str = include_str!("shaders/screenspace.wgsl");

fn program(name: &str, fragment: &'static str) -> ProgramSource {
    ProgramSource::new(name, SCREENSPACE_VERT, fragment)
}

pub fn copy() -> ProgramSource {
    program(COPY, include_str!("shaders/copy.wgsl"))
}

pub fn grayscale() -> ProgramSource {
    program(GRAYSCALE, include_str!("shaders/grayscale.wgsl"))
}

pub fn bias() -> ProgramSource {
    program(BIAS, include_str!("shaders/bias.wgsl"))
}

pub fn convolve_1d() -> ProgramSource {
    program(CONVOLVE_1D, include_str!("shaders/convolve_1d.wgsl"))
}

pub fn combine() -> ProgramSource {
    program(COMBINE, include_str!("shaders/combine.wgsl"))
}

pub fn light_scattering() -> ProgramSource {
    program(LIGHT_SCATTERING, include_str!("shaders/light_scattering.wgsl"))
}

pub fn nfaa(support_alpha: bool) -> ProgramSource {
    program(NFAA, include_str!("shaders/nfaa.wgsl")).with_define("SUPPORT_ALPHA", support_alpha.to_string())
}

pub fn motion_blur_max() -> ProgramSource {
    program(MOTION_BLUR_MAX, include_str!("shaders/motionblur_max.wgsl"))
}

pub fn motion_blur_mix() -> ProgramSource {
    program(MOTION_BLUR_MIX, include_str!("shaders/motionblur_mix.wgsl"))
}

pub fn lens_flare() -> ProgramSource {
    program(LENS_FLARE, include_str!("shaders/lens_flare.wgsl"))
}

pub fn fisheye() -> ProgramSource {
    program(FISHEYE, include_str!("shaders/fisheye.wgsl"))
}
