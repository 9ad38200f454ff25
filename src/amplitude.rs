//! Amplitude element types.
//!
//! The engine only moves amplitudes, it never does arithmetic on them, so
//! any plain `Copy` value works. The precision of a register is fixed at
//! compile time through the type parameter.

pub use num_complex::{Complex32, Complex64};

/// Single-precision complex amplitude.
pub type ComplexSP = Complex32;

/// Double-precision complex amplitude.
pub type ComplexDP = Complex64;

/// Element type storable in a shard.
///
/// Blanket-implemented for every `Copy + Default + Send + Sync + 'static`
/// type. `Default` fills scratch buffers before a collective writes them.
pub trait Amplitude: Copy + Default + Send + Sync + 'static {}

impl<T: Copy + Default + Send + Sync + 'static> Amplitude for T {}
