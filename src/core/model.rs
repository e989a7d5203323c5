//! Model contracts.
//!
//! A denoiser is a function from an image to a same-shaped image. The tiled
//! engine and the loss code only ever call `forward`; training additionally
//! needs `backward` and access to a flat parameter/gradient pair.

use super::image::Image;

/// Inference-only view of a model.
///
/// `forward` takes `&self`, so an inference call can never accumulate
/// gradient state. Any `Fn(&Image) -> Image` closure is a `Denoiser`.
pub trait Denoiser {
    fn forward(&self, x: &Image) -> Image;
}

impl<F> Denoiser for F
where
    F: Fn(&Image) -> Image,
{
    fn forward(&self, x: &Image) -> Image {
        self(x)
    }
}

/// A denoiser with learnable parameters.
pub trait Trainable: Denoiser {
    /// Accumulate dL/dθ into the gradient buffer, given the input that
    /// produced an output and dL/d(output).
    fn backward(&mut self, x: &Image, d_output: &Image);

    /// Flat parameter vector and its gradient buffer (same length).
    fn params_and_grads(&mut self) -> (&mut [f32], &mut [f32]);
}
