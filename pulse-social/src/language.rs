//! Language identification for captions and descriptions.
use crate::record::FieldValue;

/// Value recorded when text is present but no language could be identified.
pub const UNDETECTABLE: &str = "Undetectable";

pub trait LanguageDetector: Send + Sync {
    /// Language code for `text`, or `None` when it cannot be identified.
    fn detect(&self, text: &str) -> Option<String>;
}

/// Trigram-based detector backed by `whatlang`. Returns ISO 639-1 codes,
/// the same form providers use for their own language fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        whatlang::detect(text).map(|info| iso_639_1(info.lang().code()).to_string())
    }
}

/// ISO 639-3 codes known to `whatlang`, paired with their two-letter form.
#[rustfmt::skip]
const TWO_LETTER: &[(&str, &str)] = &[
    ("afr", "af"), ("aka", "ak"), ("amh", "am"), ("ara", "ar"), ("aze", "az"),
    ("bel", "be"), ("ben", "bn"), ("bul", "bg"), ("cat", "ca"), ("ces", "cs"),
    ("cmn", "zh"), ("dan", "da"), ("deu", "de"), ("ell", "el"), ("eng", "en"),
    ("epo", "eo"), ("est", "et"), ("fin", "fi"), ("fra", "fr"), ("guj", "gu"),
    ("heb", "he"), ("hin", "hi"), ("hrv", "hr"), ("hun", "hu"), ("hye", "hy"),
    ("ind", "id"), ("ita", "it"), ("jav", "jv"), ("jpn", "ja"), ("kan", "kn"),
    ("kat", "ka"), ("khm", "km"), ("kor", "ko"), ("lat", "la"), ("lav", "lv"),
    ("lit", "lt"), ("mal", "ml"), ("mar", "mr"), ("mkd", "mk"), ("mya", "my"),
    ("nep", "ne"), ("nld", "nl"), ("nob", "no"), ("ori", "or"), ("pan", "pa"),
    ("pes", "fa"), ("pol", "pl"), ("por", "pt"), ("ron", "ro"), ("rus", "ru"),
    ("sin", "si"), ("slk", "sk"), ("slv", "sl"), ("sna", "sn"), ("spa", "es"),
    ("srp", "sr"), ("swe", "sv"), ("tam", "ta"), ("tel", "te"), ("tgl", "tl"),
    ("tha", "th"), ("tuk", "tk"), ("tur", "tr"), ("ukr", "uk"), ("urd", "ur"),
    ("uzb", "uz"), ("vie", "vi"), ("yid", "yi"), ("zul", "zu"),
];

/// Two-letter code for `code`; codes without one pass through unchanged.
pub fn iso_639_1(code: &str) -> &str {
    TWO_LETTER
        .iter()
        .find(|(three, _)| *three == code)
        .map_or(code, |(_, two)| *two)
}

pub fn detect_language(detector: &dyn LanguageDetector, text: &FieldValue) -> FieldValue {
    let Some(text) = text.as_text().map(str::trim).filter(|t| !t.is_empty()) else {
        return FieldValue::Missing;
    };
    match detector.detect(text) {
        Some(code) => FieldValue::Text(code),
        None => FieldValue::Text(UNDETECTABLE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    impl LanguageDetector for Never {
        fn detect(&self, _: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn blank_or_missing_text_is_missing() {
        assert_eq!(detect_language(&Never, &FieldValue::Missing), FieldValue::Missing);
        assert_eq!(detect_language(&Never, &"   ".into()), FieldValue::Missing);
        assert_eq!(detect_language(&Never, &FieldValue::Integer(3)), FieldValue::Missing);
    }

    #[test]
    fn detector_failure_is_undetectable() {
        assert_eq!(
            detect_language(&Never, &"hello".into()),
            FieldValue::Text(UNDETECTABLE.into())
        );
    }

    #[test]
    fn whatlang_identifies_common_languages() {
        let detector = WhatlangDetector;
        let en = "The quick brown fox jumps over the lazy dog while the sun sets behind the hills.";
        let es = "El rápido zorro marrón salta sobre el perro perezoso mientras el sol se pone detrás de las colinas.";
        assert_eq!(detector.detect(en).as_deref(), Some("en"));
        assert_eq!(detector.detect(es).as_deref(), Some("es"));
    }

    #[test]
    fn three_letter_codes_shorten() {
        assert_eq!(iso_639_1("eng"), "en");
        assert_eq!(iso_639_1("cmn"), "zh");
        assert_eq!(iso_639_1("pes"), "fa");
        assert_eq!(iso_639_1("xyz"), "xyz");
    }
}
