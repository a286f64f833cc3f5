//! Ready-made effects

pub mod filter_effect;
pub mod light_scattering;
pub mod motion_blur;

pub use filter_effect::{FilterEffect, FisheyeEffect, GrayscaleEffect, LensFlareEffect, NfaaEffect};
pub use light_scattering::{LightScatteringEffect, LightScatteringSettings};
pub use motion_blur::MotionBlurEffect;
