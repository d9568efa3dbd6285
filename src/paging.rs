//! Client-side pagination helpers shared by the cashier panes and the
//! history table. Pages are 1-based; an empty collection still has one
//! (empty) page so cursors always have somewhere valid to sit.

/// Number of pages needed for `total` items, never less than 1.
pub fn page_count(total: usize, page_size: usize) -> usize {
    debug_assert!(page_size > 0, "page size must be positive");
    total.div_ceil(page_size).max(1)
}

/// Clamp a 1-based page cursor into `[1, page_count(total, page_size)]`.
pub fn clamp_page(page: usize, total: usize, page_size: usize) -> usize {
    page.clamp(1, page_count(total, page_size))
}

/// The slice of `items` shown on a 1-based `page`. Out-of-range pages
/// yield an empty slice rather than panicking.
pub fn slice_page<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_has_one_page() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(clamp_page(5, 0, 10), 1);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(21, 8), 3);
    }

    #[test]
    fn slices_are_deterministic() {
        let items: Vec<u32> = (0..23).collect();
        assert_eq!(slice_page(&items, 1, 10), (0..10).collect::<Vec<_>>());
        assert_eq!(slice_page(&items, 3, 10), (20..23).collect::<Vec<_>>());
        assert_eq!(slice_page(&items, 4, 10), &[] as &[u32]);
    }

    #[test]
    fn empty_input_yields_empty_slice() {
        let empty: Vec<u32> = Vec::new();
        assert_eq!(slice_page(&empty, 1, 10), &[] as &[u32]);
    }
}
