//! Offset pagination shared by every list operation.

use serde::{Deserialize, Serialize};

/// A 1-based page request.
///
/// Values come straight from query strings, so they are signed and may be
/// out of range; callers decide how to treat an invalid request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_number: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    /// Both the page number and the page size must be positive.
    pub fn is_valid(&self) -> bool {
        self.page_number > 0 && self.page_size > 0
    }

    /// Number of items to skip. Saturates instead of overflowing.
    pub fn offset(&self) -> i64 {
        self.page_number
            .saturating_sub(1)
            .saturating_mul(self.page_size)
    }

    /// Offset and limit as `usize`, or `None` when the request is invalid.
    pub fn window(&self) -> Option<(usize, usize)> {
        if !self.is_valid() {
            return None;
        }
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        Some((skip, take))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }

    #[test]
    fn non_positive_values_are_invalid() {
        assert!(!PageRequest::new(0, 10).is_valid());
        assert!(!PageRequest::new(1, 0).is_valid());
        assert!(!PageRequest::new(-1, -1).is_valid());
        assert_eq!(PageRequest::new(0, 10).window(), None);
    }

    #[test]
    fn huge_values_saturate() {
        let req = PageRequest::new(i64::MAX, i64::MAX);
        assert_eq!(req.offset(), i64::MAX);
        assert!(req.window().is_some());
    }
}
