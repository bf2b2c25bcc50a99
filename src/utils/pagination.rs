use serde::Serialize;

pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

/// One window of an already filtered and sorted sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub has_more: bool,
}

/// Cut page `page` (1-based) out of `items`.
/// `page` below 1 is treated as 1 and `per_page` is clamped to 1..=100.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let total = items.len();
    let start = (page - 1).saturating_mul(per_page);

    let items: Vec<T> = items.into_iter().skip(start).take(per_page).collect();

    Page {
        items,
        page,
        per_page,
        total,
        has_more: page.saturating_mul(per_page) < total,
    }
}

/// Lenient page number parsing, anything unusable becomes `default`
pub fn parse_page_number(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_partition_the_sequence() {
        let items: Vec<u32> = (0..23).collect();
        for per_page in 1..=25 {
            let mut rebuilt = Vec::new();
            let mut page = 1;
            loop {
                let window = paginate(items.clone(), page, per_page);
                assert_eq!(window.total, 23);
                rebuilt.extend(window.items);
                if !window.has_more {
                    break;
                }
                page += 1;
            }
            assert_eq!(rebuilt, items, "per_page = {}", per_page);
        }
    }

    #[test]
    fn test_has_more_boundary() {
        let items: Vec<u32> = (0..20).collect();
        assert!(paginate(items.clone(), 1, 10).has_more);
        assert!(!paginate(items.clone(), 2, 10).has_more);

        let past_end = paginate(items, 5, 10);
        assert!(past_end.items.is_empty());
        assert!(!past_end.has_more);
    }

    #[test]
    fn test_clamps_page_and_per_page() {
        let items: Vec<u32> = (0..300).collect();
        let window = paginate(items.clone(), 0, 0);
        assert_eq!(window.page, 1);
        assert_eq!(window.per_page, 1);
        assert_eq!(window.items, vec![0]);

        let window = paginate(items, 1, 1000);
        assert_eq!(window.per_page, MAX_PER_PAGE);
        assert_eq!(window.items.len(), MAX_PER_PAGE);
    }

    #[test]
    fn test_parse_page_number() {
        assert_eq!(parse_page_number(Some("3"), 1), 3);
        assert_eq!(parse_page_number(Some("abc"), 1), 1);
        assert_eq!(parse_page_number(Some("0"), 10), 10);
        assert_eq!(parse_page_number(None, 10), 10);
    }
}
