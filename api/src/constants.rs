//! Application constants

/// Default page size for cursor-paginated list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size for cursor-paginated list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;

/// Maximum length of a post or comment, in characters
pub const MAX_CONTENT_CHARS: usize = 140;

/// Minimum password length
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Minimum email length
pub const MIN_EMAIL_CHARS: usize = 5;

/// Nickname length bounds
pub const MIN_NICKNAME_CHARS: usize = 3;
pub const MAX_NICKNAME_CHARS: usize = 30;

/// Maximum bio length
pub const MAX_BIO_CHARS: usize = 160;

/// Largest accepted JSON body (bytes)
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Prefix every versioned route is nested under
pub const API_PREFIX: &str = "/api/v1";
