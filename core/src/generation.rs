use std::fmt;

/// Label of a partial or merged index file set.
///
/// A generation covers a contiguous run of flush numbers. A fresh flush `n`
/// displays as `n`; the merge of `[a..b]` with `[b+1..c]` displays as `a-c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationId {
    first: u32,
    last: u32,
}

impl GenerationId {
    pub fn flush(n: u32) -> Self {
        Self { first: n, last: n }
    }

    /// Generation produced by merging `self` (the accumulator) with `next`.
    pub fn merged(self, next: GenerationId) -> Self {
        debug_assert!(next.first > self.last, "generations must merge in flush order");
        Self { first: self.first, last: next.last }
    }

    /// The first flush, which seeds the merge accumulator.
    pub fn is_initial(&self) -> bool {
        self.first == 0 && self.last == 0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}
