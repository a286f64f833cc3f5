//! Normalization and PPM export for read-back frames

use crate::color::{RGBA, to_byte};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// How float pixels are brought into displayable range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizationMode {
    /// Clamp each channel to [0, 1]
    Clamp,
    /// Divide everything by the brightest channel in the frame
    Standard,
}

pub fn normalize(pixels: &[RGBA], mode: NormalizationMode) -> Vec<RGBA> {
    match mode {
        NormalizationMode::Clamp => pixels.iter().map(|p| p.clamp01()).collect(),
        NormalizationMode::Standard => {
            let max_val = pixels
                .iter()
                .fold(0.0f32, |m, p| m.max(p.r).max(p.g).max(p.b));
            if max_val <= 0.0 {
                return pixels.to_vec();
            }
            let scale = 1.0 / max_val;
            pixels
                .iter()
                .map(|p| RGBA::new(p.r * scale, p.g * scale, p.b * scale, p.a))
                .collect()
        }
    }
}

/// Writes a row-major frame as ASCII PPM, each pixel repeated `scale` times
/// in both directions
pub fn write_ppm<W: Write>(out: &mut W, pixels: &[RGBA], width: usize, height: usize, scale: usize) -> io::Result<()> {
    if pixels.len() != width * height {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} pixels for a {}x{} frame", pixels.len(), width, height),
        ));
    }
    let scale = scale.max(1);
    writeln!(out, "P3")?;
    writeln!(out, "{} {}", width * scale, height * scale)?;
    writeln!(out, "255")?;

    for img_y in 0..height * scale {
        let row = &pixels[(img_y / scale) * width..(img_y / scale + 1) * width];
        for img_x in 0..width * scale {
            let pixel = row[img_x / scale];
            write!(out, "{} {} {} ", to_byte(pixel.r), to_byte(pixel.g), to_byte(pixel.b))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Save a frame to a PPM file
pub fn save_ppm(pixels: &[RGBA], width: usize, height: usize, filename: impl AsRef<Path>, scale: usize) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    write_ppm(&mut file, pixels, width, height, scale)?;
    file.flush()
}
