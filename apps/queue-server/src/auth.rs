//! # Staff Identity Extraction
//!
//! Every mutating call arrives already authenticated: an upstream gateway
//! (the auth collaborator) validates credentials and forwards the staff
//! identity as headers. This module extracts and trusts that identity for
//! audit fields - it does NOT re-authenticate.
//!
//! ## Headers
//! ```text
//! x-staff-id:    teller identity used for cashier_id / actor audit fields
//! x-staff-role:  forwarded role, defaults to "staff" when absent
//! ```
//!
//! A request without `x-staff-id` is rejected with 401 UNAUTHENTICATED -
//! an unattributable mutation is worse than a refused one.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use pila_core::StaffIdentity;

/// Extractor wrapping the forwarded, already-authenticated staff identity.
#[derive(Debug, Clone)]
pub struct Staff(pub StaffIdentity);

impl<S> FromRequestParts<S> for Staff
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let staff_id = parts
            .headers
            .get("x-staff-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthenticated("missing x-staff-id header"))?
            .to_string();

        let role = parts
            .headers
            .get("x-staff-role")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("staff")
            .to_string();

        Ok(Staff(StaffIdentity { staff_id, role }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Staff, ApiError> {
        let (mut parts, _) = req.into_parts();
        Staff::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_forwarded_identity() {
        let req = Request::builder()
            .header("x-staff-id", "teller-7")
            .header("x-staff-role", "supervisor")
            .body(())
            .unwrap();

        let Staff(identity) = extract(req).await.unwrap();
        assert_eq!(identity.staff_id, "teller-7");
        assert_eq!(identity.role, "supervisor");
    }

    #[tokio::test]
    async fn test_role_defaults_to_staff() {
        let req = Request::builder()
            .header("x-staff-id", "teller-7")
            .body(())
            .unwrap();

        let Staff(identity) = extract(req).await.unwrap();
        assert_eq!(identity.role, "staff");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthenticated() {
        let req = Request::builder().body(()).unwrap();
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.code, "UNAUTHENTICATED");

        let req = Request::builder().header("x-staff-id", "   ").body(()).unwrap();
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.code, "UNAUTHENTICATED");
    }
}
