//! Input sanitization and parameter validation.
//!
//! Everything a caller sends passes through here before it reaches storage.
//! The cleaning is best-effort only: storage binds every value as a parameter
//! whatever the sanitizer returns.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::models::ValidationError;

/// Maximum search term length in characters.
pub const MAX_SEARCH_TERM_LENGTH: usize = 200;

/// Largest page size accepted by paged queries.
pub const MAX_PAGE_SIZE: i32 = 1_000;

/// Largest `limit` accepted by result listings.
pub const MAX_LIMIT: i32 = 10_000;

/// Comment markers, statement separators, SQL keywords and system objects.
static SQL_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)--|/\*|\*/|@@|;",
        r"|(?:n?var)?char\(|nchar\(",
        r"|(?:alter|begin|create|cursor|declare|delete|drop|end|exec|execute|fetch|insert|kill|open|select|table|union|update)\s",
        r"|sys\.|sysobjects|syscolumns",
    ))
    .unwrap()
});

/// Script-capable tags, `javascript:` URLs and inline event handlers.
static MARKUP_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</?\s*(?:script|iframe|object|embed|applet|form)\b[^>]*>?",
        r"|<\s*input\b[^>]*>?",
        r"|javascript\s*:",
        r"|\bon[a-z]+\s*=",
    ))
    .unwrap()
});

/// Clean a free-text search term.
///
/// Blank or absent input yields an empty string, meaning "no filter".
pub fn sanitize_search_term(input: Option<&str>) -> String {
    let Some(raw) = input.filter(|s| !s.trim().is_empty()) else {
        return String::new();
    };

    let cleaned = clean(raw);
    if cleaned.chars().count() > MAX_SEARCH_TERM_LENGTH {
        tracing::warn!(
            length = cleaned.chars().count(),
            max = MAX_SEARCH_TERM_LENGTH,
            "search term truncated"
        );
        return cleaned.chars().take(MAX_SEARCH_TERM_LENGTH).collect();
    }
    cleaned
}

/// Clean a raw query string. Unlike search terms a query is mandatory, and it
/// is not truncated.
pub fn sanitize_query(input: Option<&str>) -> Result<String, ValidationError> {
    match input {
        Some(raw) if !raw.trim().is_empty() => Ok(clean(raw)),
        _ => Err(ValidationError::new("query", "cannot be empty")),
    }
}

fn clean(raw: &str) -> String {
    let mut text: String = raw.chars().filter(|c| !c.is_control()).collect();

    // Removing one match can splice together another, so repeat until stable
    loop {
        let next = MARKUP_PATTERNS.replace_all(&text, "");
        let next = SQL_PATTERNS.replace_all(&next, "").into_owned();
        if next == text {
            break;
        }
        tracing::debug!("removed denylisted patterns from input");
        text = next;
    }

    text.trim().to_string()
}

// ============================================================================
// Validators
// ============================================================================

/// False iff the id is the nil sentinel.
pub fn is_valid_id(id: &Uuid) -> bool {
    !id.is_nil()
}

/// Page is 1-based; page size within `1..=MAX_PAGE_SIZE`. Absent values are valid.
pub fn is_valid_pagination(page: Option<i32>, page_size: Option<i32>) -> bool {
    page.map_or(true, |p| p >= 1) && page_size.map_or(true, is_valid_page_size)
}

/// Absent means unlimited; otherwise within `1..=MAX_LIMIT`.
pub fn is_valid_limit(limit: Option<i32>) -> bool {
    limit.map_or(true, |l| (1..=MAX_LIMIT).contains(&l))
}

/// Ages are non-negative and `min_age <= max_age` when both are present.
pub fn is_valid_age_range(min_age: Option<i32>, max_age: Option<i32>) -> bool {
    if min_age.is_some_and(|a| a < 0) || max_age.is_some_and(|a| a < 0) {
        return false;
    }
    match (min_age, max_age) {
        (Some(min), Some(max)) => min <= max,
        _ => true,
    }
}

/// Offset window: skip non-negative, take a valid page size.
pub fn is_valid_window(skip: Option<i32>, take: Option<i32>) -> bool {
    skip.map_or(true, |s| s >= 0) && take.map_or(true, is_valid_page_size)
}

fn is_valid_page_size(size: i32) -> bool {
    (1..=MAX_PAGE_SIZE).contains(&size)
}

pub fn require_valid_id(field: &'static str, id: &Uuid) -> Result<(), ValidationError> {
    if is_valid_id(id) {
        return Ok(());
    }
    tracing::warn!(field, "rejected empty id");
    Err(ValidationError::new(field, "must be a valid id"))
}

pub fn require_valid_pagination(page: Option<i32>, page_size: Option<i32>) -> Result<(), ValidationError> {
    if is_valid_pagination(page, page_size) {
        return Ok(());
    }
    tracing::warn!(?page, ?page_size, "rejected pagination");
    if page.is_some_and(|p| p < 1) {
        return Err(ValidationError::new("page", "must be at least 1"));
    }
    Err(ValidationError::new(
        "pageSize",
        format!("must be between 1 and {}", MAX_PAGE_SIZE),
    ))
}

pub fn require_valid_limit(limit: Option<i32>) -> Result<(), ValidationError> {
    if is_valid_limit(limit) {
        return Ok(());
    }
    tracing::warn!(?limit, "rejected limit");
    Err(ValidationError::new(
        "limit",
        format!("must be between 1 and {}", MAX_LIMIT),
    ))
}

pub fn require_valid_age_range(min_age: Option<i32>, max_age: Option<i32>) -> Result<(), ValidationError> {
    if is_valid_age_range(min_age, max_age) {
        return Ok(());
    }
    tracing::warn!(?min_age, ?max_age, "rejected age range");
    if min_age.is_some_and(|a| a < 0) {
        return Err(ValidationError::new("minAge", "cannot be negative"));
    }
    if max_age.is_some_and(|a| a < 0) {
        return Err(ValidationError::new("maxAge", "cannot be negative"));
    }
    Err(ValidationError::new("minAge", "cannot exceed maxAge"))
}

pub fn require_valid_window(skip: Option<i32>, take: Option<i32>) -> Result<(), ValidationError> {
    if is_valid_window(skip, take) {
        return Ok(());
    }
    tracing::warn!(?skip, ?take, "rejected skip/take");
    if skip.is_some_and(|s| s < 0) {
        return Err(ValidationError::new("skip", "cannot be negative"));
    }
    Err(ValidationError::new(
        "take",
        format!("must be between 1 and {}", MAX_PAGE_SIZE),
    ))
}
