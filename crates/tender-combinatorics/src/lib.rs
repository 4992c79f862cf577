//! Tender Combinatorics - Subset generation for exclusion searches
//!
//! This crate generates the combinations an iterative assignment search
//! excludes, one subset at a time:
//!
//! - [`Combinations`]: lexicographic n-choose-r index combinations
//! - [`SubsetMasks`]: every non-empty subset of n elements as a bit mask,
//!   smallest subsets first
//! - [`SubsetSequence`]: subsets of a seed element list, skipping any subset
//!   that contains a registered avoid-set
//!
//! Small subsets come first so an exclusion search discards as little of the
//! optimum as possible before trying larger sacrifices.
//!
//! # Example
//!
//! ```rust
//! use tender_combinatorics::SubsetSequence;
//!
//! let mut seq = SubsetSequence::new(vec!['a', 'b', 'c']);
//! seq.add_avoid(&['b']);
//!
//! // No produced subset contains 'b'.
//! let mut seen = Vec::new();
//! while let Some(subset) = seq.next_subset() {
//!     assert!(!subset.contains(&'b'));
//!     seen.push(subset);
//! }
//! assert_eq!(seen.len(), 3); // {a}, {c}, {a, c}
//! ```

/// Maximum element count a mask-based sequence can hold
pub const MAX_ELEMENTS: usize = 64;

/// Lexicographic n-choose-r combinations of indices `0..n`
///
/// Yields each combination as a sorted index vector. `r == 0` or `r > n`
/// yields nothing.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    r: usize,
    current: Option<Vec<usize>>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, r: usize) -> Self {
        Self { n, r, current: None, done: r == 0 || r > n }
    }

    /// Whether another combination remains without consuming it
    pub fn has_next(&self) -> bool {
        if self.done {
            return false;
        }
        match &self.current {
            None => true,
            Some(current) => (0..self.r).rev().any(|i| current[i] != self.n - self.r + i),
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        match &mut self.current {
            None => {
                let first: Vec<usize> = (0..self.r).collect();
                self.current = Some(first.clone());
                Some(first)
            }
            Some(current) => {
                // Rightmost index that can still move up.
                let mut i = self.r;
                loop {
                    if i == 0 {
                        self.done = true;
                        return None;
                    }
                    i -= 1;
                    if current[i] != self.n - self.r + i {
                        break;
                    }
                }
                current[i] += 1;
                for j in i + 1..self.r {
                    current[j] = current[j - 1] + 1;
                }
                Some(current.clone())
            }
        }
    }
}

/// Every non-empty subset of `n` elements as a `u64` bit mask
///
/// Subsets are produced in ascending size order, lexicographic within one
/// size. The empty subset is never produced.
#[derive(Debug, Clone)]
pub struct SubsetMasks {
    n: usize,
    size: usize,
    inner: Combinations,
}

impl SubsetMasks {
    /// # Panics
    ///
    /// Panics when `n` exceeds [`MAX_ELEMENTS`].
    pub fn new(n: usize) -> Self {
        assert!(n <= MAX_ELEMENTS, "subset masks limited to {MAX_ELEMENTS} elements");
        Self { n, size: 1, inner: Combinations::new(n, 1) }
    }

    /// Whether another mask remains without consuming it
    pub fn has_next(&self) -> bool {
        self.inner.has_next() || self.size < self.n
    }
}

impl Iterator for SubsetMasks {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if let Some(indices) = self.inner.next() {
                let mut mask = 0u64;
                for index in indices {
                    mask |= 1 << index;
                }
                return Some(mask);
            }
            if self.size >= self.n {
                return None;
            }
            self.size += 1;
            self.inner = Combinations::new(self.n, self.size);
        }
    }
}

/// Subsets of a seed element list, with avoid-set filtering
///
/// Any subset that contains a registered avoid-set as a subset is skipped.
/// The seed order determines which subsets are tried first within a size, so
/// callers seed with their preferred sacrifice order.
#[derive(Debug, Clone)]
pub struct SubsetSequence<T> {
    elements: Vec<T>,
    masks: SubsetMasks,
    avoid: Vec<u64>,
}

impl<T: Clone + PartialEq> SubsetSequence<T> {
    /// # Panics
    ///
    /// Panics when more than [`MAX_ELEMENTS`] elements are supplied.
    pub fn new(elements: Vec<T>) -> Self {
        let masks = SubsetMasks::new(elements.len());
        Self { elements, masks, avoid: Vec::new() }
    }

    /// The full seed element set
    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    /// Whether the underlying mask generator has masks left.
    ///
    /// Avoid-sets are not consulted here, so a `true` answer may still be
    /// followed by `None` from [`next_subset`](Self::next_subset) once
    /// filtering is applied.
    pub fn has_next(&self) -> bool {
        self.masks.has_next()
    }

    /// Register a set of elements whose supersets must never be produced.
    ///
    /// # Panics
    ///
    /// Panics when an element is not part of this sequence's seed set.
    pub fn add_avoid(&mut self, subset: &[T]) {
        let mut mask = 0u64;
        for element in subset {
            let index = self
                .elements
                .iter()
                .position(|e| e == element)
                .expect("avoid element not contained in this sequence");
            mask |= 1 << index;
        }
        self.avoid.push(mask);
    }

    /// The next subset not blocked by an avoid-set, or `None` when the
    /// sequence is exhausted
    pub fn next_subset(&mut self) -> Option<Vec<T>> {
        loop {
            let mask = self.masks.next()?;
            if self.is_avoided(mask) {
                continue;
            }
            let subset = self
                .elements
                .iter()
                .enumerate()
                .filter(|(index, _)| mask & (1 << index) != 0)
                .map(|(_, element)| element.clone())
                .collect();
            return Some(subset);
        }
    }

    fn is_avoided(&self, mask: u64) -> bool {
        self.avoid.iter().any(|avoid| mask & avoid == *avoid)
    }
}
