//! Order-preserving list chunker.
//!
//! Splits a sequence into consecutive groups of at most `size` elements
//! for hierarchical summarization. The last group may be shorter.
//!
//! # Guarantees
//!
//! - `size` is clamped to a minimum of 1.
//! - Group lengths sum to the input length.
//! - Concatenating the groups reconstructs the input in order.
//!
//! ```rust
//! use newsroll_core::chunk::chunk;
//!
//! let groups = chunk(&[1, 2, 3, 4, 5], 2);
//! assert_eq!(groups, vec![vec![1, 2], vec![3, 4], vec![5]]);
//! ```

/// Split `items` into groups of at most `size`.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let groups: Vec<Vec<u8>> = chunk(&[], 8);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_zero_size_clamps_to_one() {
        let groups = chunk(&["a", "b", "c"], 0);
        assert_eq!(groups, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn test_exact_multiple() {
        let items: Vec<u32> = (0..16).collect();
        let groups = chunk(&items, 8);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 8));
    }

    #[test]
    fn test_groups_reconstruct_input() {
        for n in 0..40usize {
            for size in 1..10usize {
                let items: Vec<usize> = (0..n).collect();
                let groups = chunk(&items, size);
                assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= size));
                assert_eq!(groups.len(), n.div_ceil(size));
                let flat: Vec<usize> = groups.into_iter().flatten().collect();
                assert_eq!(flat, items, "n={} size={}", n, size);
            }
        }
    }
}
