//! Opaque-cursor pagination (shared across `resources/list`, `tools/list`,
//! `prompts/list`, `resources/templates/list`). The cursor format is not part
//! of the wire contract; this crate encodes it as the decimal offset into the
//! caller's already-sorted slice.

use crate::protocol::types::Cursor;

pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

/// Slices `items` starting after `cursor` (an offset produced by a previous
/// call), returning at most `page_size` of them and a cursor for the next
/// page if any remain. An unparseable cursor is treated as the start.
pub fn paginate<T>(items: Vec<T>, cursor: Option<&str>, page_size: usize) -> Page<T> {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let total = items.len();
    let mut iter = items.into_iter().skip(start);
    let page: Vec<T> = iter.by_ref().take(page_size).collect();
    let end = start + page.len();
    let next_cursor = if end < total {
        Some(end.to_string())
    } else {
        None
    };
    Page {
        items: page,
        next_cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_through_all_items() {
        let items: Vec<i32> = (0..5).collect();
        let first = paginate(items.clone(), None, 2);
        assert_eq!(first.items, vec![0, 1]);
        let cursor = first.next_cursor.unwrap();

        let second = paginate(items.clone(), Some(cursor.as_str()), 2);
        assert_eq!(second.items, vec![2, 3]);

        let third = paginate(items, Some(second.next_cursor.unwrap().as_str()), 2);
        assert_eq!(third.items, vec![4]);
        assert!(third.next_cursor.is_none());
    }

    #[test]
    fn empty_input_yields_empty_page_and_no_cursor() {
        let page: Page<i32> = paginate(Vec::new(), None, 10);
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn garbage_cursor_restarts_from_the_beginning() {
        let page = paginate(vec![1, 2, 3], Some("not-a-number"), 10);
        assert_eq!(page.items, vec![1, 2, 3]);
    }
}
