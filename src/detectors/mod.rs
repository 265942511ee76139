//! Band pattern detectors
//!
//! Each detector is an independent, read-only pass over the bars and the
//! aligned ATR / Bollinger series that emits [`Signal`](crate::Signal)s.
//!
//! # Detectors
//!
//! - **Two-bar reversal**: wide-range, similar-body pair reversing direction near a band.
//! - **W-bottom**: double bottom with the first low outside the lower band, optional breakout.
//! - **Bollinger**: bounce off the lower band (buy) or rejection at the upper band (sell).

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod bollinger;
pub mod two_bar;
pub mod w_bottom;

// Re-export all detectors for convenience
pub use bollinger::*;
pub use helpers::*;
pub use two_bar::*;
pub use w_bottom::*;

impl_with_defaults!(
    TwoBarReversalDetector,
    WBottomDetector,
    BollingerBounceDetector,
);
