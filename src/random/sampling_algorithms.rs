//! Uniform random sampling from compartment memberships, with and without replacement.

use rand::seq::index::sample as choose_range;
use rand::Rng;

/// Sample multiple random elements uniformly without replacement from a container of known length.
/// If more samples are requested than there are items, every item is returned.
///
/// The selected items are returned in the container's iteration order.
pub fn sample_multiple_from_known_length<I, R, T>(rng: &mut R, iter: I, requested: usize) -> Vec<T>
where
    R: Rng,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator<Item = T>,
{
    let iter = iter.into_iter();
    let requested = requested.min(iter.len());
    if requested == 0 {
        return Vec::new();
    }

    let mut indexes = Vec::with_capacity(requested);
    indexes.extend(choose_range(rng, iter.len(), requested));
    indexes.sort_unstable();
    let mut index_iterator = indexes.into_iter();
    let mut next_idx = index_iterator.next();
    let mut selected = Vec::with_capacity(requested);

    for (idx, item) in iter.enumerate() {
        if Some(idx) == next_idx {
            selected.push(item);
            next_idx = index_iterator.next();
            if next_idx.is_none() {
                break;
            }
        }
    }

    selected
}

/// Sample `requested` elements uniformly *with* replacement from a randomly indexable slice.
///
/// Draws are made in order, one `random_range` call per element, so the result is reproducible for
/// a fixed generator state. Returns an empty vector when `items` is empty.
pub fn sample_multiple_with_replacement<R, T>(rng: &mut R, items: &[T], requested: usize) -> Vec<T>
where
    R: Rng,
    T: Copy,
{
    if items.is_empty() {
        return Vec::new();
    }
    (0..requested)
        .map(|_| items[rng.random_range(0..items.len())])
        .collect()
}
