//! The in-memory, append-only sequence of discovered primes.

use std::ops::Deref;

/// Push rejected because it would break strict ascending order or the
/// `> 1` floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot append {value} after {last:?}: primes must be > 1 and strictly ascending")]
pub struct OutOfOrder {
    /// Last element before the rejected push.
    pub last: Option<u64>,
    /// Rejected value.
    pub value: u64,
}

/// Strictly increasing sequence of confirmed primes.
///
/// Dereferences to `[u64]` for read access; growth only goes through
/// [`push`](Self::push), which keeps the ordering invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimeSequence {
    primes: Vec<u64>,
}

impl PrimeSequence {
    /// Empty sequence.
    #[must_use]
    pub const fn new() -> Self {
        Self { primes: Vec::new() }
    }

    /// Empty sequence with room for `capacity` primes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            primes: Vec::with_capacity(capacity),
        }
    }

    /// Append `value`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfOrder`] if `value <= 1` or `value` is not greater than
    /// the current last element.
    pub fn push(&mut self, value: u64) -> Result<(), OutOfOrder> {
        let last = self.last();
        if value <= 1 || last.is_some_and(|last| value <= last) {
            return Err(OutOfOrder { last, value });
        }
        self.primes.push(value);
        Ok(())
    }

    /// Largest prime held, if any.
    #[must_use]
    pub fn last(&self) -> Option<u64> {
        self.primes.last().copied()
    }

    /// The primes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.primes
    }
}

impl Deref for PrimeSequence {
    type Target = [u64];

    fn deref(&self) -> &[u64] {
        &self.primes
    }
}

impl TryFrom<Vec<u64>> for PrimeSequence {
    type Error = OutOfOrder;

    fn try_from(values: Vec<u64>) -> Result<Self, Self::Error> {
        let mut seq = Self::with_capacity(values.len());
        for value in values {
            seq.push(value)?;
        }
        Ok(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_accepts_ascending_values() {
        let mut seq = PrimeSequence::new();
        seq.push(2).expect("push");
        seq.push(3).expect("push");
        seq.push(5).expect("push");
        assert_eq!(seq.as_slice(), &[2, 3, 5]);
        assert_eq!(seq.last(), Some(5));
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn push_rejects_duplicates_and_descents() {
        let mut seq = PrimeSequence::try_from(vec![2, 3, 5]).expect("valid");
        assert_eq!(
            seq.push(5),
            Err(OutOfOrder {
                last: Some(5),
                value: 5
            })
        );
        assert!(seq.push(4).is_err());
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn push_rejects_zero_and_one() {
        let mut seq = PrimeSequence::new();
        assert!(seq.push(0).is_err());
        assert!(seq.push(1).is_err());
        assert!(seq.is_empty());
    }

    #[test]
    fn try_from_rejects_unsorted_input() {
        assert!(PrimeSequence::try_from(vec![3, 2]).is_err());
    }
}
