//! Cacheability check applied before every cache write.

use crate::snapshot::{ResponseKind, ResponseSnapshot};

/// Whether a network response may be stored in a partition.
///
/// Only complete same-origin `200` responses qualify. Cross-origin responses
/// are never stored: opaque ones cannot be validated, and none of them can be
/// invalidated by a version bump of this origin.
pub fn is_cacheable(response: Option<&ResponseSnapshot>) -> bool {
    match response {
        Some(r) => r.status == 200 && r.kind == ResponseKind::Basic,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, kind: ResponseKind) -> ResponseSnapshot {
        ResponseSnapshot::new("https://app.test/index.html", status, kind)
    }

    #[test]
    fn test_basic_ok_is_cacheable() {
        assert!(is_cacheable(Some(&response(200, ResponseKind::Basic))));
    }

    #[test]
    fn test_missing_response_is_not_cacheable() {
        assert!(!is_cacheable(None));
    }

    #[test]
    fn test_non_200_is_not_cacheable() {
        assert!(!is_cacheable(Some(&response(201, ResponseKind::Basic))));
        assert!(!is_cacheable(Some(&response(304, ResponseKind::Basic))));
        assert!(!is_cacheable(Some(&response(404, ResponseKind::Basic))));
        assert!(!is_cacheable(Some(&response(500, ResponseKind::Basic))));
    }

    #[test]
    fn test_cross_origin_is_not_cacheable() {
        assert!(!is_cacheable(Some(&response(200, ResponseKind::Opaque))));
        assert!(!is_cacheable(Some(&response(200, ResponseKind::Cors))));
        assert!(!is_cacheable(Some(&response(200, ResponseKind::Error))));
    }
}
