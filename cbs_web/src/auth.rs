use axum::{
    extract::State,
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use cbs::Credentials;
use tracing::warn;

use crate::router::AppState;

pub const REALM: &str = "SOAP API";

/// `Authorization` ヘッダーのBasic認証を検証する。形式不正は全て認証失敗とする。
pub fn authorize(headers: &HeaderMap, credentials: &Credentials) -> bool {
    basic_credentials(headers)
        .map(|(username, password)| credentials.matches(&username, &password))
        .unwrap_or(false)
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, payload) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Basic") {
        return None;
    }
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

pub async fn require_basic_auth<B>(
    State(state): State<AppState>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    if authorize(request.headers(), &state.credentials) {
        return next.run(request).await;
    }
    warn!(
        method = %request.method(),
        path = %request.uri().path(),
        "認証に失敗しました"
    );
    unauthorized()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, format!("Basic realm=\"{REALM}\""))],
        "Authentication required",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(raw: &str) -> HeaderMap {
        headers(&format!("Basic {}", STANDARD.encode(raw)))
    }

    #[test]
    fn test_authorize() {
        let credentials = Credentials::new("admin", "pa:ss");
        assert!(authorize(&basic("admin:pa:ss"), &credentials));
        assert!(authorize(
            &headers(&format!("basic {}", STANDARD.encode("admin:pa:ss"))),
            &credentials
        ));
        assert!(!authorize(&basic("admin:pa"), &credentials));
        assert!(!authorize(&basic("Admin:pa:ss"), &credentials));
        assert!(!authorize(&basic("admin"), &credentials));
        assert!(!authorize(&HeaderMap::new(), &credentials));
    }

    #[test]
    fn test_authorize_rejects_malformed_headers() {
        let credentials = Credentials::new("admin", "secret");
        assert!(!authorize(&headers("Basic"), &credentials));
        assert!(!authorize(&headers("Basic !!!not-base64"), &credentials));
        assert!(!authorize(
            &headers(&format!("Bearer {}", STANDARD.encode("admin:secret"))),
            &credentials
        ));
        assert!(!authorize(
            &headers(&format!("Basic {}", STANDARD.encode([0xff, 0xfe, b':', b'a']))),
            &credentials
        ));
    }

    #[test]
    fn test_empty_password() {
        let credentials = Credentials::new("admin", "");
        assert!(authorize(&basic("admin:"), &credentials));
        assert!(!authorize(&basic("admin: "), &credentials));
    }
}
