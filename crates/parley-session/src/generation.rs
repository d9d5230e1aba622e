//! Generation tokens for in-flight requests.
//!
//! Every request is tagged with the generation current when it was issued.
//! Issuing again (or invalidating) makes all earlier tokens stale, so a
//! late completion can be recognized and dropped instead of overwriting
//! newer state.

use std::fmt;

/// Token identifying one issued request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`Generation`] tokens.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token; all previously issued tokens become stale.
    pub fn issue(&mut self) -> Generation {
        self.current += 1;
        Generation(self.current)
    }

    /// Make every issued token stale without handing out a new one.
    pub fn invalidate(&mut self) {
        self.current += 1;
    }

    pub fn current(&self) -> Generation {
        Generation(self.current)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.current
    }
}
