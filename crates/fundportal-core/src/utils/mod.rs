//! Utility functions for formatting and lenient deserialization.

pub mod de;
pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_currency, format_date, format_optional, truncate_string};
