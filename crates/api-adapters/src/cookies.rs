//! Edit-token cookies.
//!
//! The token goes out twice: as a regular `Set-Cookie` named after the comment
//! id, and as `X-Set-Cookie` under an `rc-` prefixed name for embedding scripts
//! that cannot read third-party cookies.

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum_extra::extract::cookie::{Cookie, SameSite};
use domains::CommentId;
use time::Duration;

use crate::error::{ApiError, ApiResult};

pub const X_SET_COOKIE: HeaderName = HeaderName::from_static("x-set-cookie");
pub const ALIAS_PREFIX: &str = "rc-";

/// Cookie carrying one edit token. The comments are embedded cross-site,
/// hence `SameSite=None`.
pub fn edit_cookie(name: String, token: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((name, token))
        .path("/")
        .secure(true)
        .same_site(SameSite::None)
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

fn header_value(cookie: &Cookie<'_>) -> ApiResult<HeaderValue> {
    HeaderValue::try_from(cookie.to_string()).map_err(|err| {
        tracing::error!(error = %err, cookie = cookie.name(), "unrepresentable cookie");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "internal error",
        )
    })
}

/// Both cookie headers for a freshly created comment.
pub fn edit_cookie_headers(
    id: CommentId,
    token: &str,
    max_age_secs: i64,
) -> ApiResult<HeaderMap> {
    let primary = edit_cookie(id.to_string(), token.to_string(), max_age_secs);
    let alias = edit_cookie(
        format!("{ALIAS_PREFIX}{id}"),
        token.to_string(),
        max_age_secs,
    );

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, header_value(&primary)?);
    headers.insert(X_SET_COOKIE, header_value(&alias)?);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(raw: &str) -> Vec<String> {
        raw.split("; ").map(str::to_string).collect()
    }

    #[test]
    fn cookie_carries_lifetime_and_path() {
        let cookie = edit_cookie("7".into(), "tok".into(), 900);
        let attrs = attributes(&cookie.to_string());
        assert_eq!(attrs[0], "7=tok");
        for expected in ["Path=/", "Max-Age=900", "SameSite=None", "Secure"] {
            assert!(attrs.iter().any(|a| a == expected), "{expected} in {attrs:?}");
        }
        assert_eq!(attrs.iter().filter(|a| *a == "Secure").count(), 1);
    }

    #[test]
    fn both_headers_are_emitted() {
        let headers = edit_cookie_headers(7, "tok", 900).unwrap();
        assert!(headers[SET_COOKIE].to_str().unwrap().starts_with("7=tok;"));
        assert!(headers[X_SET_COOKIE].to_str().unwrap().starts_with("rc-7=tok;"));
    }

    #[test]
    fn unrepresentable_token_is_an_error() {
        let err = edit_cookie_headers(7, "tok\nen", 900).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
