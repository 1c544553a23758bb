// src/crawler/partition.rs

/// Splits `items` into `parts` contiguous slices whose lengths differ by at
/// most one. The first `len % parts` slices carry the extra element.
pub fn partition_evenly<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    if parts == 0 {
        return Vec::new();
    }

    let base = items.len() / parts;
    let extra = items.len() % parts;

    let mut slices = Vec::with_capacity(parts);
    let mut start = 0;
    for part in 0..parts {
        let len = base + usize::from(part < extra);
        slices.push(items[start..start + len].to_vec());
        start += len;
    }
    slices
}
