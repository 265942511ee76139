//! Merge detector outputs into one time-ordered stream

use crate::{Direction, Signal};

/// Same-direction signals closer than this many bars are merged
pub const DEFAULT_MIN_GAP: usize = 3;

/// Sort signals by bar index (stable) and collapse same-direction clusters.
///
/// A signal less than `min_gap` bars after the anchor of the last kept signal
/// and in the same direction replaces it only when strictly more confident.
/// The anchor index stays put on replacement. Opposite directions are always kept.
pub fn consolidate_signals(mut signals: Vec<Signal>, min_gap: usize) -> Vec<Signal> {
    signals.sort_by_key(|s| s.index);

    let mut out: Vec<Signal> = Vec::with_capacity(signals.len());
    let mut anchor: Option<(usize, Direction)> = None;

    for signal in signals {
        match (anchor, out.last_mut()) {
            (Some((index, direction)), Some(last))
                if direction == signal.direction && signal.index - index < min_gap =>
            {
                if signal.confidence > last.confidence {
                    *last = signal;
                }
            }
            _ => {
                anchor = Some((signal.index, signal.direction));
                out.push(signal);
            }
        }
    }
    out
}
