/// Lazily enumerates the cartesian product of several payload sets.
///
/// Roughly equivalent to nested for-loops: the right-most set varies fastest.
///
/// With sets `A = [a0, a1]` and `B = [b0, b1]` the order is
///
///   (a0, b0)
///   (a0, b1)
///   (a1, b0)
///   (a1, b1)
///
/// Any empty set makes the whole product empty. Only one index vector is held
/// in memory, however large the product is.
#[derive(Debug, Clone)]
pub struct CartesianProduct<'a, T> {
    sets: &'a [Vec<T>],
    indices: Vec<usize>,
    exhausted: bool,
}

impl<'a, T> CartesianProduct<'a, T> {
    pub fn new(sets: &'a [Vec<T>]) -> Self {
        Self {
            sets,
            indices: vec![0; sets.len()],
            exhausted: sets.iter().any(Vec::is_empty),
        }
    }

    /// Advances the odometer, reporting whether another tuple exists.
    fn advance(&mut self) -> bool {
        for position in (0..self.indices.len()).rev() {
            self.indices[position] += 1;
            if self.indices[position] < self.sets[position].len() {
                return true;
            }
            self.indices[position] = 0;
        }
        false
    }
}

impl<'a, T> Iterator for CartesianProduct<'a, T> {
    type Item = Vec<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let sets = self.sets;
        let tuple = self
            .indices
            .iter()
            .zip(sets)
            .map(|(index, set)| &set[*index])
            .collect();
        if !self.advance() {
            self.exhausted = true;
        }
        Some(tuple)
    }
}

/// Number of tuples in the product of sets with the given lengths.
///
/// Saturates at `u64::MAX` instead of overflowing.
pub fn combination_count<I>(lengths: I) -> u64
where
    I: IntoIterator<Item = usize>,
{
    lengths
        .into_iter()
        .fold(1u64, |total, len| total.saturating_mul(len as u64))
}
