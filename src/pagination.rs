use serde::{Deserialize, Serialize};

/// Paginated list envelope: `{count, next, previous, results}` with
/// relative page URLs.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: usize,
    pub limit: usize,
}

impl PageParams {
    /// Pull `page` and `limit` out of raw query pairs, falling back to the
    /// first page with the configured size. Unparseable values fall back too.
    pub fn from_pairs(pairs: &[(String, String)], default_limit: usize) -> Self {
        let lookup = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        Self {
            page: lookup("page").filter(|&p| p >= 1).unwrap_or(1),
            limit: lookup("limit").filter(|&l| l >= 1).unwrap_or(default_limit),
        }
    }
}

/// Slice out one page. The remaining query pairs are carried into the
/// `next`/`previous` URLs so filtered listings stay filtered when a client
/// follows them.
pub fn paginate<T>(
    items: Vec<T>,
    params: PageParams,
    path: &str,
    pairs: &[(String, String)],
) -> Page<T> {
    let count = items.len();
    let start = params.page.saturating_sub(1).saturating_mul(params.limit);
    let results: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(params.limit)
        .collect();

    let carried: String = pairs
        .iter()
        .filter(|(k, _)| k != "page" && k != "limit")
        .map(|(k, v)| format!("{k}={v}&"))
        .collect();
    let page_url = |page: usize| format!("{path}?{carried}page={page}&limit={}", params.limit);

    let next = (start + results.len() < count).then(|| page_url(params.page + 1));
    let previous = (params.page > 1
        && params.page.saturating_sub(2).saturating_mul(params.limit) < count)
        .then(|| page_url(params.page - 1));

    Page {
        count,
        next,
        previous,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: usize, limit: usize) -> PageParams {
        PageParams { page, limit }
    }

    #[test]
    fn first_page_has_next_but_no_previous() {
        let page = paginate((0..10).collect(), params(1, 4), "/api/recipes/", &[]);
        assert_eq!(page.count, 10);
        assert_eq!(page.results, vec![0, 1, 2, 3]);
        assert_eq!(page.next.as_deref(), Some("/api/recipes/?page=2&limit=4"));
        assert!(page.previous.is_none());
    }

    #[test]
    fn last_page_is_truncated() {
        let page = paginate((0..10).collect(), params(3, 4), "/api/recipes/", &[]);
        assert_eq!(page.results, vec![8, 9]);
        assert!(page.next.is_none());
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?page=2&limit=4")
        );
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = paginate((0..3).collect::<Vec<_>>(), params(5, 4), "/api/users/", &[]);
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn huge_page_number_does_not_panic() {
        let page = paginate(
            (0..3).collect::<Vec<_>>(),
            params(usize::MAX, 6),
            "/api/recipes/",
            &[],
        );
        assert_eq!(page.count, 3);
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }

    #[test]
    fn filters_are_carried_into_page_urls() {
        let pairs = vec![
            ("tags".to_string(), "breakfast".to_string()),
            ("page".to_string(), "2".to_string()),
            ("author".to_string(), "u1".to_string()),
            ("limit".to_string(), "4".to_string()),
        ];
        let page = paginate((0..10).collect::<Vec<_>>(), params(2, 4), "/api/recipes/", &pairs);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?tags=breakfast&author=u1&page=3&limit=4")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?tags=breakfast&author=u1&page=1&limit=4")
        );
    }

    #[test]
    fn params_fall_back_to_defaults() {
        let pairs = vec![
            ("page".to_string(), "oops".to_string()),
            ("limit".to_string(), "0".to_string()),
        ];
        let p = PageParams::from_pairs(&pairs, 6);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 6);
    }
}
