//! Typed tag-filter expressions parsed from `tags__<field>[__<op>]=<value>`
//! query parameters. Evaluation belongs to the backing store; this module
//! only builds the expression tree.

use crate::domain::stream::query::RawQuery;
use crate::errors::AppError;

const FILTER_PREFIX: &str = "tags__";
const LOOKUP_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact match (the default when no operator suffix is given).
    Exact,
    /// Case-insensitive exact match.
    IExact,
    /// Case-insensitive substring match.
    IContains,
    Gt,
    Gte,
    /// Every listed element present in a list-valued tag.
    All,
}

impl FilterOp {
    fn from_suffix(suffix: &str) -> Option<FilterOp> {
        match suffix {
            "exact" => Some(FilterOp::Exact),
            "iexact" => Some(FilterOp::IExact),
            "icontains" => Some(FilterOp::IContains),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "all" => Some(FilterOp::All),
            _ => None,
        }
    }
}

/// One filter over a (possibly nested) tag field.
#[derive(Debug, Clone, PartialEq)]
pub struct TagFilter {
    /// Path into the tag mapping, e.g. `["visualization", "type"]`.
    pub path: Vec<String>,
    pub op: FilterOp,
    pub value: String,
}

impl TagFilter {
    /// Collects every `tags__*` parameter into a filter list. A trailing
    /// path segment naming a known operator selects that operator; anything
    /// else extends the field path (Django-style lookups).
    pub fn parse_query(raw: &RawQuery) -> Result<Vec<TagFilter>, AppError> {
        let mut filters = Vec::new();
        for (key, value) in raw.pairs() {
            let Some(lookup) = key.strip_prefix(FILTER_PREFIX) else {
                continue;
            };

            let mut path: Vec<String> =
                lookup.split(LOOKUP_SEPARATOR).map(str::to_string).collect();
            if path.iter().any(String::is_empty) {
                return Err(AppError::BadRequest(format!(
                    "Invalid tag filter '{key}' provided."
                )));
            }

            let op = match path.last().and_then(|s| FilterOp::from_suffix(s)) {
                // A bare operator ("tags__gt") has no field to apply to
                Some(op) if path.len() > 1 => {
                    path.pop();
                    op
                }
                _ => FilterOp::Exact,
            };

            filters.push(TagFilter {
                path,
                op,
                value: value.clone(),
            });
        }
        Ok(filters)
    }
}
