//! Query parameters shared by the list endpoints.

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// `?query=&limit=&offset=`; limit is clamped to 1..=200, offset to >= 0.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// `ILIKE` pattern for the free-text filter, `None` when absent or blank.
    pub fn name_pattern(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)))
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        let q = ListQuery { query: None, limit: Some(10_000), offset: Some(-3) };
        assert_eq!(q.limit(), 200);
        assert_eq!(q.offset(), 0);
        assert_eq!(ListQuery::default().limit(), 50);
        assert_eq!(ListQuery { limit: Some(0), ..Default::default() }.limit(), 1);
    }

    #[test]
    fn name_pattern_trims_and_escapes() {
        let q = ListQuery { query: Some("  50%_oat ".into()), ..Default::default() };
        assert_eq!(q.name_pattern().as_deref(), Some("%50\\%\\_oat%"));
        let blank = ListQuery { query: Some("   ".into()), ..Default::default() };
        assert!(blank.name_pattern().is_none());
    }
}
