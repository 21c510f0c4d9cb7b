use serde::{Deserialize, Serialize};

use super::Pagination;

/// Page-number paginated list.
#[derive(Debug, Deserialize, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// `path` and `pairs` describe the current request; the neighbour links
    /// keep every other query parameter and only swap `page` and `limit`.
    pub fn new(
        results: Vec<T>,
        count: i64,
        pagination: Pagination,
        path: &str,
        pairs: &[(String, String)],
    ) -> Self {
        let Pagination { page, limit } = pagination;
        let shown = i64::from(page) * i64::from(limit);
        let next = (shown < count).then(|| page_link(path, pairs, page + 1, limit));
        let previous = (page > 1).then(|| page_link(path, pairs, page - 1, limit));
        Paginated {
            count,
            next,
            previous,
            results,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Paginated<U> {
        Paginated {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

fn page_link(path: &str, pairs: &[(String, String)], page: u32, limit: u32) -> String {
    let mut query: Vec<String> = pairs
        .iter()
        .filter(|(key, _)| key != "page" && key != "limit")
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect();
    query.push(format!("page={}", page));
    query.push(format!("limit={}", limit));
    format!("{}?{}", path, query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_keep_other_parameters() {
        let pairs = vec![
            ("tags".to_owned(), "lunch".to_owned()),
            ("page".to_owned(), "2".to_owned()),
        ];
        let page: Paginated<i32> = Paginated::new(
            vec![1, 2],
            10,
            Pagination { page: 2, limit: 2 },
            "/api/recipes/",
            &pairs,
        );

        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?tags=lunch&page=3&limit=2")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?tags=lunch&page=1&limit=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let page: Paginated<i32> =
            Paginated::new(vec![1], 3, Pagination { page: 2, limit: 2 }, "/api/users/", &[]);
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/api/users/?page=1&limit=2"));
    }
}
