//! The shared fetch pipeline: normalize the identifier, call the provider
//! with credential rotation, then map the payload through the entity's
//! [`FetcherProfile`].
use pulse_http::{Auth, HeaderMap, HeaderName, HeaderValue, HttpClient, HttpError, RequestOpts, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchError;
use crate::identifier::{self, Identifier};
use crate::language::{LanguageDetector, WhatlangDetector};
use crate::platform::{EntityType, FetcherProfile};
use crate::record::FetchOutput;
use crate::rotation::{CredentialHeaders, CredentialRotator, HOST_HEADER, KEY_HEADER, RotatorError, SharedRotator};

/// Anchor for the HTTP client; every request uses an absolute URL.
const CLIENT_BASE: &str = "https://p.rapidapi.com/";

/// Provider messages that mean the credential, not the request, was refused.
const CREDENTIAL_MARKERS: &[&str] = &["not subscribed", "invalid api key"];

#[derive(Clone)]
pub struct SocialFetcher {
    http: HttpClient,
    base_override: Option<Url>,
    detector: Arc<dyn LanguageDetector>,
}

/// Classified result of one request.
#[derive(Debug)]
enum Outcome {
    Data(Value),
    /// The next credential may succeed.
    Rotate(String),
    Fail(FetchError),
}

impl SocialFetcher {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, HttpError> {
        let http = HttpClient::with_connect_timeout(CLIENT_BASE, connect_timeout)?.with_timeout(timeout);
        Ok(Self {
            http,
            base_override: None,
            detector: Arc::new(WhatlangDetector),
        })
    }

    /// Send every request to `base` instead of the provider host. The host
    /// header still names the provider.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, HttpError> {
        let url = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        self.base_override = Some(url);
        Ok(self)
    }

    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Fetch one entity, rotating through at most `rotator.len()` credentials.
    ///
    /// Rate limits, refused credentials, network errors and undecodable bodies
    /// move on to the next credential. Any other error status, or a success
    /// payload without the entity's marker field, ends the fetch at once.
    pub async fn fetch<R>(
        &self,
        rotator: &mut R,
        entity: EntityType,
        raw: &str,
    ) -> Result<FetchOutput, FetchError>
    where
        R: CredentialRotator + ?Sized,
    {
        let identifier = identifier::normalize(entity, raw)?;
        let profile = entity.profile();
        let attempts = rotator.len();
        if attempts == 0 {
            return Err(RotatorError::NoCredentialsConfigured.into());
        }
        let url = self.endpoint_url(profile, &identifier)?;
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            let credential = rotator.cursor();
            let headers = rotator.headers_for(profile.host)?;
            match self.attempt(profile, &url, &identifier, &headers).await {
                Outcome::Data(body) => {
                    tracing::info!(%entity, host = profile.host, attempt, credential, outcome = "ok", "fetch.attempt");
                    return Ok(profile.normalize(&body, &identifier, self.detector.as_ref()));
                }
                Outcome::Fail(err) => {
                    tracing::warn!(%entity, host = profile.host, attempt, credential, outcome = err.kind(), error = %err, "fetch.attempt");
                    return Err(err);
                }
                Outcome::Rotate(reason) => {
                    tracing::warn!(%entity, host = profile.host, attempt, credential, outcome = "rotate", %reason, "fetch.attempt");
                    last_failure = reason;
                    if !rotator.rotate() {
                        return Err(FetchError::CredentialsExhausted {
                            attempts: attempt,
                            last_failure,
                        });
                    }
                }
            }
        }
        Err(FetchError::CredentialsExhausted {
            attempts,
            last_failure,
        })
    }

    /// [`fetch`](Self::fetch) holding the shared rotator's lock for the whole
    /// rotation loop.
    pub async fn fetch_shared(
        &self,
        rotator: &SharedRotator,
        entity: EntityType,
        raw: &str,
    ) -> Result<FetchOutput, FetchError> {
        let mut guard = rotator.lock().await;
        self.fetch(&mut *guard, entity, raw).await
    }

    fn endpoint_url(&self, profile: &FetcherProfile, identifier: &Identifier) -> Result<Url, FetchError> {
        let origin = match &self.base_override {
            Some(base) => base.clone(),
            None => Url::parse(&format!("https://{}/", profile.host))
                .map_err(|e| FetchError::TransportFailure(format!("invalid provider host: {e}")))?,
        };
        origin
            .join(&profile.endpoint.render_path(&identifier.value))
            .map_err(|e| FetchError::TransportFailure(format!("invalid endpoint: {e}")))
    }

    async fn attempt(
        &self,
        profile: &FetcherProfile,
        url: &Url,
        identifier: &Identifier,
        credentials: &CredentialHeaders,
    ) -> Outcome {
        let auth = match Auth::header(KEY_HEADER, &credentials.key) {
            Ok(auth) => auth,
            Err(err) => return Outcome::Rotate(format!("unusable credential: {err}")),
        };
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&credentials.host) {
            Ok(host) => {
                headers.insert(HeaderName::from_static(HOST_HEADER), host);
            }
            Err(err) => {
                return Outcome::Fail(FetchError::TransportFailure(format!("invalid host header: {err}")));
            }
        }
        let opts = RequestOpts {
            auth: Some(auth),
            headers: Some(headers),
            query: Some(profile.endpoint.render_query(&identifier.value)),
            allow_absolute: true,
            exact_ok: true,
            ..Default::default()
        };
        let result = self.http.get_json::<Value>(url.as_str(), opts).await;
        classify(profile, identifier, result)
    }
}

fn is_credential_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m))
}

fn classify(profile: &FetcherProfile, identifier: &Identifier, result: Result<Value, HttpError>) -> Outcome {
    match result {
        Ok(body) => {
            let message = pulse_http::error_message(&body);
            if let Some(msg) = message.as_deref().filter(|m| is_credential_message(m)) {
                return Outcome::Rotate(format!("credential refused: {msg}"));
            }
            if !profile.has_marker(&body) {
                tracing::trace!(entity = %profile.entity, body = %body, "fetch.no_data");
                return Outcome::Fail(FetchError::NoData {
                    identifier: identifier.value.clone(),
                    message: message.unwrap_or_else(|| "payload is missing the expected fields".to_string()),
                });
            }
            Outcome::Data(body)
        }
        Err(HttpError::Api { status, message, .. }) => match status {
            StatusCode::TOO_MANY_REQUESTS => Outcome::Rotate(format!("rate limited: {message}")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Outcome::Rotate(format!("credential refused ({}): {message}", status.as_u16()))
            }
            _ if is_credential_message(&message) => {
                Outcome::Rotate(format!("credential refused ({}): {message}", status.as_u16()))
            }
            _ => Outcome::Fail(FetchError::UpstreamError {
                status: status.as_u16(),
                message,
            }),
        },
        Err(HttpError::Network(msg)) => Outcome::Rotate(format!("network error: {msg}")),
        Err(HttpError::Decode(msg, _)) => Outcome::Rotate(format!("invalid JSON response: {msg}")),
        Err(HttpError::Build(msg)) => Outcome::Rotate(format!("request build failed: {msg}")),
        Err(HttpError::Url(msg)) => Outcome::Fail(FetchError::TransportFailure(msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ident(value: &str) -> Identifier {
        Identifier {
            value: value.to_string(),
            path_kind: None,
        }
    }

    fn api(status: u16, message: &str) -> HttpError {
        HttpError::Api {
            status: StatusCode::from_u16(status).unwrap(),
            message: message.to_string(),
            request_id: "-".into(),
        }
    }

    fn classify_for(entity: EntityType, result: Result<Value, HttpError>) -> Outcome {
        classify(entity.profile(), &ident("nasa"), result)
    }

    #[test]
    fn credential_failures_rotate() {
        for err in [
            api(429, "slow down"),
            api(401, "nope"),
            api(403, "nope"),
            api(400, "Invalid API key. Go to https://docs.rapidapi.com"),
            HttpError::Network("connection reset".into()),
            HttpError::Decode("expected value".into(), "<html>".into()),
        ] {
            let outcome = classify_for(EntityType::InstagramProfile, Err(err));
            assert!(matches!(outcome, Outcome::Rotate(_)), "{outcome:?}");
        }
    }

    #[test]
    fn refused_key_in_success_body_rotates() {
        let body = json!({"message": "You are not subscribed to this API."});
        assert!(matches!(
            classify_for(EntityType::InstagramProfile, Ok(body)),
            Outcome::Rotate(_)
        ));
    }

    #[test]
    fn other_statuses_are_terminal() {
        let outcome = classify_for(EntityType::InstagramProfile, Err(api(500, "boom")));
        match outcome {
            Outcome::Fail(FetchError::UpstreamError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_marker_is_no_data_with_provider_message() {
        let body = json!({"status": "error", "message": "User not found"});
        match classify_for(EntityType::InstagramProfile, Ok(body)) {
            Outcome::Fail(FetchError::NoData { identifier, message }) => {
                assert_eq!(identifier, "nasa");
                assert_eq!(message, "User not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn falsy_marker_is_no_data() {
        let body = json!({"ok": false});
        assert!(matches!(
            classify_for(EntityType::TiktokPost, Ok(body)),
            Outcome::Fail(FetchError::NoData { .. })
        ));
    }

    #[test]
    fn bad_url_is_transport_failure() {
        assert!(matches!(
            classify_for(EntityType::InstagramProfile, Err(HttpError::Url("bad".into()))),
            Outcome::Fail(FetchError::TransportFailure(_))
        ));
    }

    #[test]
    fn endpoint_honours_base_override() {
        let fetcher = SocialFetcher::new(Duration::from_secs(1), Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9/")
            .unwrap();
        let profile = EntityType::YoutubeProfile.profile();
        let url = fetcher.endpoint_url(profile, &ident("@falcons")).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/channel/handle/%40falcons");

        let direct = SocialFetcher::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let url = direct.endpoint_url(EntityType::InstagramProfile.profile(), &ident("nasa")).unwrap();
        assert_eq!(url.as_str(), "https://simple-instagram-api.p.rapidapi.com/account-info");
    }

    #[tokio::test]
    async fn unrecognized_identifier_never_touches_credentials() {
        let fetcher = SocialFetcher::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let mut rotator = crate::rotation::KeyRotator::new(vec!["k".into()]).unwrap();
        let err = fetcher
            .fetch(&mut rotator, EntityType::TiktokPost, "not a link")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnrecognizedIdentifier");
        assert_eq!(rotator.cursor(), 0);
    }
}
