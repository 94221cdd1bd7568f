//! Register-range compaction.

/// Collapse a set of addresses into the minimal sorted list of contiguous
/// `(start, length)` runs.
///
/// Duplicates are ignored and input order does not matter.
///
/// ```
/// use fieldpoll_framework::compact;
///
/// assert_eq!(compact([10, 5, 6, 7, 6]), vec![(5, 3), (10, 1)]);
/// ```
pub fn compact<I>(addresses: I) -> Vec<(u32, u32)>
where
    I: IntoIterator<Item = u32>,
{
    let mut sorted: Vec<u32> = addresses.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<(u32, u32)> = Vec::new();
    for address in sorted {
        match runs.last_mut() {
            // Same run while `address - start` equals the run length so far.
            Some((start, length)) if u64::from(address) == u64::from(*start) + u64::from(*length) => {
                *length += 1;
            }
            _ => runs.push((address, 1)),
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_mixed() {
        assert_eq!(compact([5, 6, 7, 10]), vec![(5, 3), (10, 1)]);
    }

    #[test]
    fn test_compact_empty() {
        assert_eq!(compact(Vec::<u32>::new()), Vec::<(u32, u32)>::new());
    }

    #[test]
    fn test_compact_duplicates() {
        assert_eq!(compact([3, 3, 3]), vec![(3, 1)]);
    }

    #[test]
    fn test_compact_order_independent() {
        let forward: Vec<u32> = (0..20).chain(40..45).collect();
        let mut reverse = forward.clone();
        reverse.reverse();

        assert_eq!(compact(forward.clone()), compact(reverse));
        assert_eq!(compact(forward), vec![(0, 20), (40, 5)]);
    }

    #[test]
    fn test_compact_u32_edge() {
        assert_eq!(
            compact([u32::MAX, u32::MAX - 1, 0]),
            vec![(0, 1), (u32::MAX - 1, 2)]
        );
    }

    #[test]
    fn test_compact_lengths_cover_set() {
        let input = [1, 2, 3, 9, 11, 12, 12, 30, 2, 31, 100];
        let runs = compact(input);

        let total: u32 = runs.iter().map(|(_, length)| length).sum();
        let mut unique = input.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(total as usize, unique.len());

        for pair in runs.windows(2) {
            let (start, length) = pair[0];
            assert!(u64::from(start) + u64::from(length) < u64::from(pair[1].0));
        }
    }
}
