//! Revision-tracked values and cached derivations
//!
//! A [`Signal`] carries a revision that moves forward on every change. A
//! [`Memo`] remembers the upstream revisions it was computed from and only
//! recomputes when one of them moved.

/// Monotonic change counter of a [`Signal`]
pub type Revision = u64;

/// A value with a change revision
#[derive(Debug, Clone, Default)]
pub struct Signal<T> {
    value: T,
    revision: Revision,
}

impl<T> Signal<T> {
    /// Create a signal at revision 0
    pub fn new(value: T) -> Self {
        Self { value, revision: 0 }
    }

    /// Current value
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Current revision
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Mutate in place. Always counts as a change.
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.revision += 1;
    }
}

impl<T: PartialEq> Signal<T> {
    /// Replace the value. Returns false (and keeps the revision) if unchanged.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.revision += 1;
        true
    }
}

/// Cached derived value keyed on upstream revisions
#[derive(Debug, Clone)]
pub struct Memo<T> {
    cached: Option<(Vec<Revision>, T)>,
    recomputes: usize,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Memo<T> {
    /// Create an empty memo
    pub fn new() -> Self {
        Self {
            cached: None,
            recomputes: 0,
        }
    }

    /// Return the cached value, recomputing first if any of `deps` moved
    pub fn get(&mut self, deps: &[Revision], compute: impl FnOnce() -> T) -> &T {
        let stale = match &self.cached {
            Some((seen, _)) => seen.as_slice() != deps,
            None => true,
        };
        if stale {
            self.cached = None;
        }
        let recomputes = &mut self.recomputes;
        let (_, value) = self.cached.get_or_insert_with(|| {
            *recomputes += 1;
            (deps.to_vec(), compute())
        });
        value
    }

    /// How many times the derivation ran
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_set_unchanged_keeps_revision() {
        let mut signal = Signal::new(4);
        assert!(!signal.set(4));
        assert_eq!(signal.revision(), 0);
        assert!(signal.set(5));
        assert_eq!(signal.revision(), 1);
    }

    #[test]
    fn test_memo_recomputes_once_per_change() {
        let mut a = Signal::new(2);
        let b = Signal::new(3);
        let mut memo = Memo::new();

        let product = *memo.get(&[a.revision(), b.revision()], || a.get() * b.get());
        assert_eq!(product, 6);
        let _ = memo.get(&[a.revision(), b.revision()], || unreachable!());
        assert_eq!(memo.recompute_count(), 1);

        a.set(10);
        let product = *memo.get(&[a.revision(), b.revision()], || a.get() * b.get());
        assert_eq!(product, 30);
        assert_eq!(memo.recompute_count(), 2);
    }
}
