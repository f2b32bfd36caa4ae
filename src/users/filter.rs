//! User Filter
//!
//! Exact-match filtering plus limit/offset pagination for listing users.

use std::fmt;

/// Page size used when none (or an invalid one) is given
pub const DEFAULT_LIMIT: i64 = 10;

/// Upper bound on a single page
pub const MAX_LIMIT: i64 = 1000;

/// Filter applied when listing users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            first_name: None,
            last_name: None,
            nickname: None,
            country: None,
            email: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl UserFilter {
    pub fn builder() -> UserFilterBuilder {
        UserFilterBuilder::default()
    }

    /// Column/value pairs for every field that is set
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("nickname", &self.nickname),
            ("country", &self.country),
            ("email", &self.email),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }
}

impl fmt::Display for UserFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("empty")
        }
        write!(
            f,
            "first_name:{}, last_name:{}, nickname:{}, country:{}, email:{}, offset:{}, limit:{}",
            show(&self.first_name),
            show(&self.last_name),
            show(&self.nickname),
            show(&self.country),
            show(&self.email),
            self.offset,
            self.limit
        )
    }
}

/// Builder for [`UserFilter`]
///
/// Empty strings are treated as "no filter". Non-positive limits fall back
/// to [`DEFAULT_LIMIT`], negative offsets to zero.
#[derive(Debug, Default)]
pub struct UserFilterBuilder {
    filter: UserFilter,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl UserFilterBuilder {
    pub fn first_name(mut self, value: Option<String>) -> Self {
        self.filter.first_name = non_empty(value);
        self
    }

    pub fn last_name(mut self, value: Option<String>) -> Self {
        self.filter.last_name = non_empty(value);
        self
    }

    pub fn nickname(mut self, value: Option<String>) -> Self {
        self.filter.nickname = non_empty(value);
        self
    }

    pub fn country(mut self, value: Option<String>) -> Self {
        self.filter.country = non_empty(value);
        self
    }

    pub fn email(mut self, value: Option<String>) -> Self {
        self.filter.email = non_empty(value);
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.filter.limit = match limit {
            Some(l) if l > 0 => l.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        };
        self
    }

    pub fn offset(mut self, offset: Option<i64>) -> Self {
        self.filter.offset = match offset {
            Some(o) if o >= 0 => o,
            _ => 0,
        };
        self
    }

    pub fn build(self) -> UserFilter {
        self.filter
    }
}
