// Authenticated request construction.
//
// The host decides how a session authenticates. If it exposes a credential
// helper we defer to it completely, otherwise we fall back to the CSRF cookie
// scheme the web app itself uses. The choice is made once, when the builder
// is created.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use std::sync::Arc;

use crate::errors::AppResult;

use super::payload::{Payload, RequestBody};

pub const REQUESTED_WITH_HEADER: &str = "x-requested-with";
pub const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";
pub const DEFAULT_CSRF_COOKIE: &str = "MMCSRF";
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsMode {
    /// Send the session's cookies along with the request.
    Include,
    /// Leave the session's cookies off; the headers authenticate on their own.
    Omit,
}

/// A fully configured request, ready for a [`super::sticker_client::Transport`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub credentials: CredentialsMode,
    pub body: RequestBody,
}

impl RequestDescriptor {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Header construction exposed by the host application.
pub trait HostCredentialHelper: Send + Sync {
    fn headers(&self, method: &Method) -> AppResult<HeaderMap>;

    fn credentials_mode(&self) -> CredentialsMode {
        CredentialsMode::Include
    }
}

/// Read access to the session's cookie string (`name=value; other=value`).
pub trait CookieSource: Send + Sync {
    fn cookie_string(&self) -> Option<String>;
}

/// Credential helpers the host may have registered.
#[derive(Clone, Default)]
pub struct HostGlobals {
    /// Helper registered under the web app's plugin-id namespace.
    pub namespaced: Option<Arc<dyn HostCredentialHelper>>,
    /// Older hosts put the helper at the top level.
    pub legacy: Option<Arc<dyn HostCredentialHelper>>,
}

pub trait CredentialProvider: Send + Sync {
    fn apply(&self, method: &Method, headers: &mut HeaderMap) -> AppResult<()>;

    fn credentials_mode(&self) -> CredentialsMode {
        CredentialsMode::Include
    }

    fn name(&self) -> &'static str;
}

/// Delegates header construction to the host's helper.
pub struct HostHelperCredentials {
    helper: Arc<dyn HostCredentialHelper>,
}

impl HostHelperCredentials {
    pub fn new(helper: Arc<dyn HostCredentialHelper>) -> Self {
        Self { helper }
    }
}

impl CredentialProvider for HostHelperCredentials {
    fn apply(&self, method: &Method, headers: &mut HeaderMap) -> AppResult<()> {
        let host_headers = self.helper.headers(method)?;
        headers.extend(host_headers);
        Ok(())
    }

    fn credentials_mode(&self) -> CredentialsMode {
        self.helper.credentials_mode()
    }

    fn name(&self) -> &'static str {
        "host-helper"
    }
}

/// Fallback used when the host exposes no helper.
pub struct CookieCredentials {
    cookies: Arc<dyn CookieSource>,
    cookie_name: String,
    header_name: HeaderName,
}

impl CookieCredentials {
    pub fn new(
        cookies: Arc<dyn CookieSource>,
        cookie_name: &str,
        header_name: &str,
    ) -> AppResult<Self> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes()).map_err(|_| {
            crate::errors::AppError::Config(format!("Invalid CSRF header name: {}", header_name))
        })?;

        Ok(Self {
            cookies,
            cookie_name: cookie_name.to_string(),
            header_name,
        })
    }

    /// Token from the cookie entry named `cookie_name`, if non-empty.
    pub fn csrf_token(&self) -> Option<String> {
        let cookie_string = self.cookies.cookie_string()?;
        let prefix = format!("{}=", self.cookie_name);

        cookie_string
            .split(';')
            .map(str::trim)
            .find_map(|entry| entry.strip_prefix(prefix.as_str()))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }
}

impl CredentialProvider for CookieCredentials {
    fn apply(&self, method: &Method, headers: &mut HeaderMap) -> AppResult<()> {
        headers.insert(
            REQUESTED_WITH_HEADER,
            HeaderValue::from_static(REQUESTED_WITH_VALUE),
        );

        if *method != Method::GET {
            if let Some(token) = self.csrf_token() {
                headers.insert(self.header_name.clone(), HeaderValue::from_str(&token)?);
            } else {
                log::debug!("No {} cookie found for {} request", self.cookie_name, method);
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "cookie-fallback"
    }
}

/// Picks the credential provider: namespaced helper, then legacy helper,
/// then the cookie fallback.
pub fn discover_credentials(
    globals: &HostGlobals,
    cookies: Arc<dyn CookieSource>,
    csrf_cookie: &str,
    csrf_header: &str,
) -> AppResult<Arc<dyn CredentialProvider>> {
    if let Some(helper) = globals.namespaced.as_ref().or(globals.legacy.as_ref()) {
        return Ok(Arc::new(HostHelperCredentials::new(Arc::clone(helper))));
    }

    Ok(Arc::new(CookieCredentials::new(
        cookies,
        csrf_cookie,
        csrf_header,
    )?))
}

#[derive(Clone)]
pub struct RequestBuilder {
    provider: Arc<dyn CredentialProvider>,
}

impl RequestBuilder {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        log::debug!("Using {} credentials for sticker requests", provider.name());
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn build(&self, method: Method, url: &str, payload: Payload) -> AppResult<RequestDescriptor> {
        let mut headers = HeaderMap::new();
        self.provider.apply(&method, &mut headers)?;

        let body = match payload {
            Payload::Empty => RequestBody::Empty,
            Payload::Multipart(form) => RequestBody::Multipart(form),
            Payload::Json(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                RequestBody::Json(serde_json::to_string(&value)?)
            }
        };

        Ok(RequestDescriptor {
            method,
            url: url.to_string(),
            headers,
            credentials: self.provider.credentials_mode(),
            body,
        })
    }
}

/// Fixed cookie string, as captured from a logged-in session.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies {
    raw: Option<String>,
}

impl SessionCookies {
    pub fn new(raw: Option<String>) -> Self {
        Self { raw }
    }
}

impl CookieSource for SessionCookies {
    fn cookie_string(&self) -> Option<String> {
        self.raw.clone()
    }
}

/// Host helper backed by a personal access token.
pub struct BearerTokenHelper {
    token: String,
}

impl BearerTokenHelper {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

impl HostCredentialHelper for BearerTokenHelper {
    fn headers(&self, _method: &Method) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(
            REQUESTED_WITH_HEADER,
            HeaderValue::from_static(REQUESTED_WITH_VALUE),
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))?,
        );
        Ok(headers)
    }

    fn credentials_mode(&self) -> CredentialsMode {
        CredentialsMode::Omit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadFile;
    use crate::uploader::payload::MultipartForm;

    struct MarkerHelper(&'static str);

    impl HostCredentialHelper for MarkerHelper {
        fn headers(&self, _method: &Method) -> AppResult<HeaderMap> {
            let mut headers = HeaderMap::new();
            headers.insert("x-helper", HeaderValue::from_static(self.0));
            Ok(headers)
        }
    }

    fn cookies(raw: &str) -> Arc<dyn CookieSource> {
        Arc::new(SessionCookies::new(Some(raw.to_string())))
    }

    fn cookie_builder(raw: &str) -> RequestBuilder {
        let provider = discover_credentials(
            &HostGlobals::default(),
            cookies(raw),
            DEFAULT_CSRF_COOKIE,
            DEFAULT_CSRF_HEADER,
        )
        .unwrap();
        RequestBuilder::new(provider)
    }

    #[test]
    fn test_discovery_prefers_namespaced_helper() {
        let globals = HostGlobals {
            namespaced: Some(Arc::new(MarkerHelper("namespaced"))),
            legacy: Some(Arc::new(MarkerHelper("legacy"))),
        };
        let provider =
            discover_credentials(&globals, cookies(""), DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER)
                .unwrap();
        let request = RequestBuilder::new(provider)
            .build(Method::POST, "https://x/api", Payload::Empty)
            .unwrap();

        assert_eq!(request.header("x-helper"), Some("namespaced"));
        // The helper is authoritative; no fallback headers are mixed in
        assert_eq!(request.header(REQUESTED_WITH_HEADER), None);
    }

    #[test]
    fn test_discovery_uses_legacy_helper() {
        let globals = HostGlobals {
            namespaced: None,
            legacy: Some(Arc::new(MarkerHelper("legacy"))),
        };
        let provider =
            discover_credentials(&globals, cookies(""), DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER)
                .unwrap();
        assert_eq!(provider.name(), "host-helper");

        let request = RequestBuilder::new(provider)
            .build(Method::GET, "https://x/api", Payload::Empty)
            .unwrap();
        assert_eq!(request.header("x-helper"), Some("legacy"));
    }

    #[test]
    fn test_cookie_fallback_attaches_csrf_for_post() {
        let builder = cookie_builder("MMUSERID=u1; MMCSRF=tok123; MMAUTHTOKEN=secret");
        assert_eq!(builder.provider_name(), "cookie-fallback");

        let request = builder
            .build(Method::POST, "https://x/api", Payload::Empty)
            .unwrap();

        assert_eq!(request.header("X-CSRF-Token"), Some("tok123"));
        assert_eq!(request.header(REQUESTED_WITH_HEADER), Some("XMLHttpRequest"));
        assert_eq!(request.credentials, CredentialsMode::Include);
    }

    #[test]
    fn test_cookie_fallback_skips_csrf_for_get() {
        let request = cookie_builder("MMCSRF=tok123")
            .build(Method::GET, "https://x/api", Payload::Empty)
            .unwrap();

        assert_eq!(request.header("X-CSRF-Token"), None);
        assert_eq!(request.header(REQUESTED_WITH_HEADER), Some("XMLHttpRequest"));
    }

    #[test]
    fn test_cookie_fallback_without_token() {
        let request = cookie_builder("OTHER=1; MMCSRF=")
            .build(Method::DELETE, "https://x/api", Payload::Empty)
            .unwrap();
        assert_eq!(request.header("X-CSRF-Token"), None);
    }

    #[test]
    fn test_json_payload_sets_content_type() {
        let request = cookie_builder("")
            .build(
                Method::POST,
                "https://x/api",
                Payload::Json(serde_json::json!({"name": "cat"})),
            )
            .unwrap();

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body, RequestBody::Json(r#"{"name":"cat"}"#.to_string()));
    }

    #[test]
    fn test_multipart_payload_passes_through() {
        let mut form = MultipartForm::new();
        form.add_file("image", UploadFile::new("cat.png", vec![1]));

        let request = cookie_builder("")
            .build(Method::POST, "https://x/api", Payload::Multipart(form.clone()))
            .unwrap();

        assert_eq!(request.header("content-type"), None);
        assert_eq!(request.body, RequestBody::Multipart(form));
    }

    #[test]
    fn test_bearer_helper_headers() {
        let headers = BearerTokenHelper::new("abc").headers(&Method::GET).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_credentials_mode_follows_helper() {
        let bearer = HostGlobals {
            namespaced: Some(Arc::new(BearerTokenHelper::new("abc"))),
            legacy: None,
        };
        let provider = discover_credentials(
            &bearer,
            cookies("MMCSRF=tok123"),
            DEFAULT_CSRF_COOKIE,
            DEFAULT_CSRF_HEADER,
        )
        .unwrap();
        let request = RequestBuilder::new(provider)
            .build(Method::POST, "https://x/api", Payload::Empty)
            .unwrap();
        assert_eq!(request.credentials, CredentialsMode::Omit);
        assert_eq!(request.header("X-CSRF-Token"), None);

        let marker = HostGlobals {
            namespaced: Some(Arc::new(MarkerHelper("namespaced"))),
            legacy: None,
        };
        let provider =
            discover_credentials(&marker, cookies(""), DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER)
                .unwrap();
        let request = RequestBuilder::new(provider)
            .build(Method::GET, "https://x/api", Payload::Empty)
            .unwrap();
        assert_eq!(request.credentials, CredentialsMode::Include);
    }
}
