//! Set-partition enumeration and Stirling numbers of the second kind.
//!
//! Used by the discrete branch of split search: every non-trivial two-way
//! partition of a nominal value set is a candidate split.

/// Number of ways to partition `n` elements into `k` non-empty blocks.
///
/// Saturates at `u64::MAX` instead of overflowing.
#[must_use]
pub fn stirling_s2(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    if k == 0 {
        return u64::from(n == 0);
    }
    // row[j] = S(i, j) for the current i.
    let mut row = vec![0u64; k + 1];
    row[0] = 1;
    for i in 1..=n {
        for j in (1..=k.min(i)).rev() {
            let stay = (j as u64).saturating_mul(row[j]);
            row[j] = stay.saturating_add(row[j - 1]);
        }
        row[0] = 0;
    }
    row[k]
}

/// Every partition of `elements` into exactly `k` non-empty blocks.
///
/// Element order inside each block follows the input order. The number of
/// partitions returned equals [`stirling_s2`]`(elements.len(), k)`.
#[must_use]
pub fn partition_set<T: Clone>(elements: &[T], k: usize) -> Vec<Vec<Vec<T>>> {
    let n = elements.len();
    if k == 0 || k > n {
        return Vec::new();
    }
    if k == 1 {
        return vec![vec![elements.to_vec()]];
    }
    if k == n {
        return vec![elements.iter().map(|e| vec![e.clone()]).collect()];
    }

    let (first, rest) = (&elements[0], &elements[1..]);
    let mut out = Vec::new();

    // First element joins each block of a k-partition of the rest.
    for partition in partition_set(rest, k) {
        for b in 0..partition.len() {
            let mut p = partition.clone();
            p[b].insert(0, first.clone());
            out.push(p);
        }
    }

    // First element stands alone next to a (k-1)-partition of the rest.
    for mut partition in partition_set(rest, k - 1) {
        partition.insert(0, vec![first.clone()]);
        out.push(partition);
    }

    out
}

/// All non-trivial two-way partitions of `values` as `(subset, complement)` pairs.
///
/// The subset is always the block containing `values[0]`. For `n` distinct
/// values this yields `2^(n-1) - 1` pairs; fewer than two values yield none.
#[must_use]
pub fn two_way_partitions<T: Clone + PartialEq>(values: &[T]) -> Vec<(Vec<T>, Vec<T>)> {
    let Some(first) = values.first() else {
        return Vec::new();
    };
    partition_set(values, 2)
        .into_iter()
        .filter_map(|mut blocks| {
            let b = blocks.pop()?;
            let a = blocks.pop()?;
            if a.first() == Some(first) {
                Some((a, b))
            } else {
                Some((b, a))
            }
        })
        .collect()
}
