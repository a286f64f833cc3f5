//! CPU fragment kernels for the built-in programs
//!
//! Each kernel evaluates the same math as its WGSL counterpart in
//! `shaders/`, so the software backend doubles as the reference when
//! checking pass output.

use std::f32::consts::PI;

use super::shaders;
use super::software::{Fragment, FragmentKernel};
use crate::color::{LUMA_WEIGHTS, RGBA, SATURATION_WEIGHTS};

pub fn builtin() -> Vec<(&'static str, FragmentKernel)> {
    vec![
        (shaders::COPY, copy as FragmentKernel),
        (shaders::GRAYSCALE, grayscale as FragmentKernel),
        (shaders::BIAS, bias as FragmentKernel),
        (shaders::CONVOLVE_1D, convolve_1d as FragmentKernel),
        (shaders::COMBINE, combine as FragmentKernel),
        (shaders::LIGHT_SCATTERING, light_scattering as FragmentKernel),
        (shaders::NFAA, nfaa as FragmentKernel),
        (shaders::MOTION_BLUR_MAX, motion_blur_max as FragmentKernel),
        (shaders::MOTION_BLUR_MIX, motion_blur_mix as FragmentKernel),
        (shaders::LENS_FLARE, lens_flare as FragmentKernel),
        (shaders::FISHEYE, fisheye as FragmentKernel),
    ]
}

fn copy(f: &Fragment<'_>) -> RGBA {
    f.sample(0, f.uv)
}

/// Luma mixed over the color by `u_amount`
pub fn grayscale_of(c: RGBA, amount: f32) -> RGBA {
    let l = c.dot_rgb(LUMA_WEIGHTS);
    RGBA::new(
        c.r + (l - c.r) * amount,
        c.g + (l - c.g) * amount,
        c.b + (l - c.b) * amount,
        c.a,
    )
}

fn grayscale(f: &Fragment<'_>) -> RGBA {
    grayscale_of(f.sample(0, f.uv), f.float("u_amount"))
}

pub fn bias_of(c: RGBA, bias: f32) -> RGBA {
    let avg = (c.r + c.g + c.b) / 3.0;
    let v = (avg + bias).max(0.0) * 50.0;
    RGBA::new(v, v, v, v)
}

fn bias(f: &Fragment<'_>) -> RGBA {
    bias_of(f.sample(0, f.uv), f.float("u_bias"))
}

fn convolve_1d(f: &Fragment<'_>) -> RGBA {
    let weights = f.floats("u_sampleWeights");
    let offsets = f.floats("u_sampleOffsets");
    let taps = (f.int("u_length").max(0) as usize)
        .min(weights.len())
        .min(offsets.len() / 2);

    let mut acc = RGBA::transparent();
    for i in 0..taps {
        let uv = [f.uv[0] + offsets[i * 2], f.uv[1] + offsets[i * 2 + 1]];
        acc = acc + f.sample(0, uv) * weights[i];
    }
    acc
}

fn saturate(c: RGBA, saturation: f32) -> RGBA {
    let grey = c.dot_rgb(SATURATION_WEIGHTS);
    RGBA::new(
        grey + (c.r - grey) * saturation,
        grey + (c.g - grey) * saturation,
        grey + (c.b - grey) * saturation,
        c.a,
    )
}

/// Blend of two sources, each scaled and re-saturated first
pub fn combine_of(src1: RGBA, src2: RGBA, intensity: [f32; 2], saturation: [f32; 2]) -> RGBA {
    let original = saturate(src1 * intensity[0], saturation[0]);
    let overlay = saturate(src2 * intensity[1], saturation[1]);
    let keep = RGBA::new(1.0, 1.0, 1.0, 1.0) + overlay.clamp01() * -1.0;
    original.modulate(keep) + overlay
}

fn combine(f: &Fragment<'_>) -> RGBA {
    combine_of(
        f.sample(0, f.uv),
        f.sample(1, f.uv),
        [f.float("u_src1Intensity"), f.float("u_src2Intensity")],
        [f.float("u_src1Saturation"), f.float("u_src2Saturation")],
    )
}

fn light_scattering(f: &Fragment<'_>) -> RGBA {
    let positions = f.floats("u_lightPositions");
    let angles = f.floats("u_lightViewAngles");
    let lights = (f.int("u_nLights").max(0) as usize)
        .min(angles.len())
        .min(positions.len() / 2);
    let samples = f.int("u_numSamples").max(1);
    let decay = f.float("u_decay");
    let density = f.float("u_density");
    let weight = f.float("u_weight");

    let mut acc = RGBA::transparent();
    for l in 0..lights {
        let light = [positions[l * 2], positions[l * 2 + 1]];
        let facing = angles[l].cos().max(0.0);
        let delta = [
            (f.uv[0] - light[0]) * density / samples as f32,
            (f.uv[1] - light[1]) * density / samples as f32,
        ];
        let mut coord = f.uv;
        let mut illumination = 1.0;
        for _ in 0..samples {
            coord = [coord[0] - delta[0], coord[1] - delta[1]];
            acc = acc + f.sample(0, coord) * (illumination * weight * facing);
            illumination *= decay;
        }
    }
    RGBA::new(acc.r, acc.g, acc.b, 1.0)
}

fn nfaa(f: &Fragment<'_>) -> RGBA {
    let inv = f.vec2("u_viewportInverse");
    let at = |dx: f32, dy: f32| [f.uv[0] + dx * inv[0], f.uv[1] + dy * inv[1]];
    let lum = |dx: f32, dy: f32| f.sample(0, at(dx, dy)).dot_rgb(LUMA_WEIGHTS);

    let top = lum(-1.0, -1.0) + lum(0.0, -1.0) + lum(1.0, -1.0);
    let bottom = lum(-1.0, 1.0) + lum(0.0, 1.0) + lum(1.0, 1.0);
    let left = lum(-1.0, -1.0) + lum(-1.0, 0.0) + lum(-1.0, 1.0);
    let right = lum(1.0, -1.0) + lum(1.0, 0.0) + lum(1.0, 1.0);

    let center = f.sample(0, f.uv);
    let n = [top - bottom, right - left];
    let len = (n[0] * n[0] + n[1] * n[1]).sqrt();
    if len < 1.0 / 16.0 {
        return center;
    }
    let n = [n[0] / len, n[1] / len];

    let mut acc = center;
    for scale in [0.5, -0.5, 1.0, -1.0] {
        acc = acc + f.sample(0, at(n[0] * scale, n[1] * scale));
    }
    let out = acc * 0.2;
    if f.define("SUPPORT_ALPHA") == Some("true") {
        out
    } else {
        RGBA::new(out.r, out.g, out.b, 1.0)
    }
}

fn motion_blur_max(f: &Fragment<'_>) -> RGBA {
    let last = f.sample(1, f.uv) * f.float("u_blurOpacity");
    f.sample(0, f.uv).max(last)
}

fn motion_blur_mix(f: &Fragment<'_>) -> RGBA {
    f.sample(0, f.uv).lerp(f.sample(1, f.uv), f.float("u_blurOpacity"))
}

fn aspect(viewport: [f32; 2]) -> f32 {
    if viewport[1] > 0.0 { viewport[0] / viewport[1] } else { 1.0 }
}

fn lens_flare(f: &Fragment<'_>) -> RGBA {
    let light = f.vec2("u_lightPosition");
    let intensity = f.float("u_intensity");
    let color = f.vec3("u_color");
    let aspect = aspect(f.vec2("u_viewport"));

    let dx = (f.uv[0] - light[0]) * aspect;
    let dy = f.uv[1] - light[1];
    let mut flare = 0.001 * intensity / (dx * dx + dy * dy + 0.01);

    // Ghosts along the axis through the screen center.
    for k in 1..=3 {
        let t = k as f32;
        let ghost = [light[0] + (0.5 - light[0]) * t, light[1] + (0.5 - light[1]) * t];
        let gx = (f.uv[0] - ghost[0]) * aspect;
        let gy = f.uv[1] - ghost[1];
        let g = (1.0 - (gx * gx + gy * gy).sqrt() * 8.0).max(0.0);
        flare += g * g * 0.05 * intensity;
    }

    let scene = f.sample(0, f.uv);
    RGBA::new(
        scene.r + color[0] * flare,
        scene.g + color[1] * flare,
        scene.b + color[2] * flare,
        scene.a,
    )
}

/// Texture coordinate a fisheye pass reads for output coordinate `uv`
pub fn fisheye_source_uv(uv: [f32; 2], viewport: [f32; 2], amount: f32) -> [f32; 2] {
    let prop = aspect(viewport);
    let m = [0.5, 0.5 / prop];
    let p = [uv[0], uv[1] / prop];
    let d = [p[0] - m[0], p[1] - m[1]];
    let r = (d[0] * d[0] + d[1] * d[1]).sqrt();
    let m_len = (m[0] * m[0] + m[1] * m[1]).sqrt();
    let power = PI / m_len * amount;

    if power.abs() < 1e-4 || r < 1e-6 {
        return uv;
    }
    let dir = [d[0] / r, d[1] / r];
    let reach = if power > 0.0 {
        let bind = m_len;
        (r * power).tan() * bind / (bind * power).tan()
    } else {
        let bind = if prop < 1.0 { m[0] } else { m[1] };
        (-r * power * 10.0).atan() * bind / (-power * bind * 10.0).atan()
    };
    [m[0] + dir[0] * reach, (m[1] + dir[1] * reach) * prop]
}

fn fisheye(f: &Fragment<'_>) -> RGBA {
    let uv = fisheye_source_uv(f.uv, f.vec2("u_viewport"), f.float("u_amount"));
    f.sample(0, uv)
}
