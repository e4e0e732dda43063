//! Core building blocks shared by the prisma renderer: texture evaluation
//! and inverse-CDF sampling distributions.

mod distribution;
mod texture;

pub use distribution::{Distribution1D, Distribution2D};
pub use texture::{
    CheckerTexture, ImageTexture, PerlinTexture, SolidColor, Texture, TextureError,
};
