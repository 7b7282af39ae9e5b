#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use pulse_common::LogFormat;
use pulse_common::observability::LogConfig;
use pulse_social::language::LanguageDetector;
use pulse_social::{KeyRotator, SocialFetcher};
use wiremock::MockServer;

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "pulse-tests",
            emit_stderr: true,
            format: if std::env::var("PULSE_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
            ..LogConfig::default()
        };

        pulse_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// Maps a greeting at the start of the text to a language code.
pub struct GreetingDetector;

impl LanguageDetector for GreetingDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let first = text.split_whitespace().next()?.to_lowercase();
        match first.trim_matches(|c: char| !c.is_alphanumeric()) {
            "hello" => Some("en".into()),
            "hola" => Some("es".into()),
            "bonjour" => Some("fr".into()),
            _ => None,
        }
    }
}

pub fn fetcher_for(server: &MockServer) -> SocialFetcher {
    SocialFetcher::new(Duration::from_secs(5), Duration::from_secs(2))
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
        .with_detector(Arc::new(GreetingDetector))
}

pub fn rotator(keys: &[&str]) -> KeyRotator {
    KeyRotator::new(keys.iter().map(|k| k.to_string()).collect()).unwrap()
}
