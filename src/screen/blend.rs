// src/screen/blend.rs

//! Linear crossfade between two screens.

use super::Screen;
use std::iter::FusedIterator;

/// Returns a lazy sequence of `steps` screens fading from `from` to `to`.
///
/// Step `i` (0-based) mixes with `t = (i + 1) / steps`, so the last screen
/// is exactly `to`. With `steps <= 1` the sequence is a single copy of `to`.
pub fn blend<'a>(from: &'a Screen, to: &'a Screen, steps: usize) -> Blend<'a> {
    debug_assert_eq!(from.layout(), to.layout(), "cannot blend screens of different layouts");
    Blend {
        from,
        to,
        steps: steps.max(1),
        next: 0,
    }
}

/// Iterator returned by [`blend`]. Finite and not restartable.
#[derive(Debug)]
pub struct Blend<'a> {
    from: &'a Screen,
    to: &'a Screen,
    steps: usize,
    next: usize,
}

impl Iterator for Blend<'_> {
    type Item = Screen;

    fn next(&mut self) -> Option<Screen> {
        if self.next >= self.steps {
            return None;
        }
        self.next += 1;

        if self.steps == 1 {
            return Some(self.to.copy());
        }

        let t = self.next as f32 / self.steps as f32;
        let mut out = Screen::new(self.to.layout());
        for ((dst, &a), &b) in out
            .as_bytes_mut()
            .iter_mut()
            .zip(self.from.as_bytes())
            .zip(self.to.as_bytes())
        {
            *dst = ((1.0 - t) * a as f32 + t * b as f32) as u8;
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.steps - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Blend<'_> {}

impl FusedIterator for Blend<'_> {}
