//! # Validation Module
//!
//! Input validation for VidTube requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum extractors                                              │
//! │  ├── JSON / multipart deserialization                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields, lengths, formats                                 │
//! │  └── Normalization (trim, lowercase)                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── NOT NULL constraints                                              │
//! │  └── UNIQUE(username), UNIQUE(email)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validators that normalize return the cleaned value so callers never
//! store the raw input by accident.

use uuid::Uuid;

use crate::error::ValidationError;
use crate::types::{SortField, SortOrder, VideoQuery};
use crate::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MIN_PASSWORD_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Helpers
// =============================================================================

fn required_trimmed<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(value)
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> ValidationResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// User Fields
// =============================================================================

/// Validates a username and returns it lowercased.
///
/// ## Rules
/// - 3 to 30 characters after trimming
/// - Letters, digits, `_` and `.` only
///
/// ## Example
/// ```rust
/// use vidtube_core::validation::validate_username;
///
/// assert_eq!(validate_username("  Alice_01 ").unwrap(), "alice_01");
/// assert!(validate_username("").is_err());
/// assert!(validate_username("no spaces").is_err());
/// ```
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = required_trimmed("username", username)?;
    check_length("username", username, 3, 30)?;

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, underscores, and dots".to_string(),
        });
    }

    Ok(username.to_lowercase())
}

/// Validates an email address and returns it lowercased.
///
/// Only a structural check: one `@`, non-empty local part, a dot in the
/// domain. Deliverability is not verified.
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = required_trimmed("email", email)?;
    check_length("email", email, 3, 254)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must be a valid email address".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(email.to_lowercase())
}

/// Validates a display name and returns it trimmed.
pub fn validate_full_name(full_name: &str) -> ValidationResult<String> {
    let full_name = required_trimmed("fullName", full_name)?;
    check_length("fullName", full_name, 1, 100)?;
    Ok(full_name.to_string())
}

/// Validates a new password.
///
/// Passwords are not trimmed: whitespace is significant.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }
    check_length("password", password, MIN_PASSWORD_LENGTH, 128)
}

// =============================================================================
// Video Fields
// =============================================================================

/// Validates a video title and returns it trimmed.
pub fn validate_title(title: &str) -> ValidationResult<String> {
    let title = required_trimmed("title", title)?;
    check_length("title", title, 1, 200)?;
    Ok(title.to_string())
}

/// Validates a video description and returns it trimmed.
pub fn validate_description(description: &str) -> ValidationResult<String> {
    let description = required_trimmed("description", description)?;
    check_length("description", description, 1, 5000)?;
    Ok(description.to_string())
}

/// Validates an entity id and returns it in canonical form
/// (lowercase, hyphenated), the form ids are stored in.
///
/// ## Example
/// ```rust
/// use vidtube_core::validation::validate_entity_id;
///
/// assert!(validate_entity_id("videoId", "not-a-uuid").is_err());
/// assert!(validate_entity_id("videoId", "  ").is_err());
/// ```
pub fn validate_entity_id(field: &str, id: &str) -> ValidationResult<String> {
    let id = required_trimmed(field, id)?;
    let parsed = Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid id".to_string(),
    })?;
    Ok(parsed.to_string())
}

// =============================================================================
// Listing
// =============================================================================

/// Raw listing parameters as they arrive on the query string.
#[derive(Debug, Clone, Default)]
pub struct RawVideoQuery<'a> {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub query: Option<&'a str>,
    pub sort_by: Option<&'a str>,
    pub sort_type: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

/// Validates listing parameters.
///
/// ## Rules
/// - `page` defaults to 1 and must be at least 1
/// - `limit` defaults to [`DEFAULT_PAGE_LIMIT`], range 1..=[`MAX_PAGE_LIMIT`]
/// - blank `query` is treated as absent
/// - `sortBy` must be one of [`SortField::ALLOWED`]
/// - `userId` must be a valid id
///
/// `include_unpublished` is only set when `caller_id` equals `userId`.
pub fn validate_video_query(raw: RawVideoQuery<'_>, caller_id: &str) -> ValidationResult<VideoQuery> {
    let page = raw.page.unwrap_or(1);
    if page == 0 {
        return Err(ValidationError::OutOfRange {
            field: "page".to_string(),
            min: 1,
            max: i64::from(u32::MAX),
        });
    }

    let limit = raw.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: i64::from(MAX_PAGE_LIMIT),
        });
    }

    let sort_by = match raw.sort_by.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => SortField::parse(value).ok_or_else(|| ValidationError::NotAllowed {
            field: "sortBy".to_string(),
            allowed: SortField::ALLOWED.iter().map(|s| s.to_string()).collect(),
        })?,
        None => SortField::default(),
    };

    let sort_order = match raw.sort_type.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => SortOrder::parse(value).ok_or_else(|| ValidationError::NotAllowed {
            field: "sortType".to_string(),
            allowed: vec!["asc".to_string(), "desc".to_string()],
        })?,
        None => SortOrder::default(),
    };

    let owner_id = match raw.user_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => Some(validate_entity_id("userId", id)?),
        None => None,
    };

    let search = raw
        .query
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(ref search) = search {
        check_length("query", search, 1, 100)?;
    }

    let include_unpublished = owner_id.as_deref() == Some(caller_id);

    Ok(VideoQuery {
        page,
        limit,
        search,
        sort_by,
        sort_order,
        owner_id,
        include_unpublished,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
