//! Deterministic list splitting for worker fan-out.

/// Split `records` into `n` nearly-equal contiguous segments.
///
/// With `k, m = divmod(len, n)`, segment `i` has length `k + 1` for
/// `i < m` and `k` otherwise. Segments preserve the original relative
/// order, and concatenating them in index order reproduces the input
/// exactly. `n > len` yields empty trailing segments, never an error.
///
/// # Panics
///
/// Panics if `n` is zero.
#[must_use]
pub fn split<T>(records: Vec<T>, n: usize) -> Vec<Vec<T>> {
    assert!(n > 0, "segment count must be positive");

    let len = records.len();
    let (k, m) = (len / n, len % n);

    let mut segments = Vec::with_capacity(n);
    let mut rest = records;
    // Drain from the front so each segment takes ownership of its slice.
    for i in 0..n {
        let take = if i < m { k + 1 } else { k };
        let tail = rest.split_off(take.min(rest.len()));
        segments.push(rest);
        rest = tail;
    }
    segments
}
