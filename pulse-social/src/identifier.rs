//! Turn user input (profile links, post links, handles, shortcodes) into the
//! identifier each provider expects.
//!
//! Normalization is idempotent: feeding a normalized value back in yields the
//! same value, and a bare handle normalizes to the same value as its link.
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::FetchError;
use crate::platform::EntityType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// Value sent to the provider.
    pub value: String,
    /// Instagram posts only: `p`, `reel` or `tv`, as used to rebuild the link.
    pub path_kind: Option<&'static str>,
}

impl Identifier {
    fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            path_kind: None,
        }
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    let compiled = Regex::new(pattern);
    if let Err(err) = &compiled {
        tracing::error!(%pattern, error = %err, "identifier.pattern_invalid");
    }
    compiled.ok()
}

fn captures<'h>(re: &Option<Regex>, haystack: &'h str) -> Option<Captures<'h>> {
    re.as_ref()?.captures(haystack)
}

fn is_match(re: &Option<Regex>, haystack: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(haystack))
}

static IG_PROFILE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)instagram\.com/([A-Za-z0-9_.]+)"));
static IG_POST_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)instagram\.com/(p|reels?|tv)/([A-Za-z0-9_-]+)"));
static IG_TAG_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)instagram\.com/explore/tags/([^/?#\s]+)"));
static TT_VIDEO_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)tiktok\.com/@([A-Za-z0-9_.]+)/video/(\d+)"));
static TT_SHORT_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)\b(vm|vt)\.tiktok\.com/([A-Za-z0-9]+)"));
static TT_PROFILE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)tiktok\.com/@([A-Za-z0-9_.]+)"));
static YT_VIDEO_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r"(?:[?&]v=|(?i:youtu\.be/|/embed/|/shorts/|/live/))([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)")
});
static YT_CHANNEL_ID_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)youtube\.com/channel/(UC[A-Za-z0-9_-]{22})"));
static YT_HANDLE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)youtube\.com/(?:c/|user/)?@?([A-Za-z0-9_.\-]+)"));
static SC_PROFILE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)snapchat\.com/add/([A-Za-z0-9_.\-]+)"));

static USERNAME: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"^[A-Za-z0-9_.]+$"));
static SHORTCODE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"^[A-Za-z0-9_-]+$"));
static VIDEO_ID: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"^[A-Za-z0-9_-]{11}$"));
static CHANNEL_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"^UC[A-Za-z0-9_-]{22}$"));
static HANDLE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"^[A-Za-z0-9_.\-]+$"));

/// First path segments that are Instagram pages rather than accounts.
const INSTAGRAM_RESERVED: &[&str] = &["p", "reel", "reels", "tv", "explore", "stories", "accounts"];
/// First path segments that are YouTube pages rather than channels.
const YOUTUBE_RESERVED: &[&str] = &[
    "watch", "channel", "c", "user", "shorts", "embed", "live", "results", "feed", "playlist",
];

fn domains(entity: EntityType) -> &'static [&'static str] {
    match entity.platform() {
        "Instagram" => &["instagram.com"],
        "Tiktok" => &["tiktok.com"],
        "Youtube" => &["youtube.com", "youtu.be"],
        _ => &["snapchat.com"],
    }
}

fn looks_like_url(entity: EntityType, raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || domains(entity).iter().any(|d| lower.contains(d))
}

/// Normalize `raw` for `entity`.
///
/// ```
/// use pulse_social::identifier::normalize;
/// use pulse_social::platform::EntityType;
///
/// let from_url = normalize(EntityType::InstagramProfile, "https://www.instagram.com/nasa/").unwrap();
/// let bare = normalize(EntityType::InstagramProfile, "@nasa").unwrap();
/// assert_eq!(from_url, bare);
/// assert_eq!(bare.value, "nasa");
/// ```
pub fn normalize(entity: EntityType, raw: &str) -> Result<Identifier, FetchError> {
    let input = raw.trim();
    let unrecognized = || FetchError::UnrecognizedIdentifier {
        entity,
        identifier: raw.to_string(),
    };
    if input.is_empty() {
        return Err(unrecognized());
    }
    let url = looks_like_url(entity, input);

    let found = match entity {
        EntityType::InstagramProfile => instagram_profile(input, url),
        EntityType::InstagramPost => instagram_post(input, url),
        EntityType::InstagramHashtag => instagram_hashtag(input, url),
        EntityType::TiktokPost => tiktok_post(input),
        EntityType::TiktokProfile => tiktok_profile(input, url),
        EntityType::YoutubePost => youtube_post(input, url),
        EntityType::YoutubeProfile => youtube_profile(input, url),
        EntityType::SnapchatProfile => snapchat_profile(input, url),
    };
    found.ok_or_else(unrecognized)
}

fn instagram_profile(input: &str, url: bool) -> Option<Identifier> {
    let user = if url {
        let caps = captures(&IG_PROFILE_URL, input)?;
        let user = caps.get(1)?.as_str();
        if INSTAGRAM_RESERVED.contains(&user.to_ascii_lowercase().as_str()) {
            return None;
        }
        user.to_string()
    } else {
        bare(input, '@', &USERNAME)?
    };
    Some(Identifier::plain(user))
}

fn instagram_post(input: &str, url: bool) -> Option<Identifier> {
    if url {
        let caps = captures(&IG_POST_URL, input)?;
        let kind = match caps.get(1)?.as_str().to_ascii_lowercase().as_str() {
            "tv" => "tv",
            "reel" | "reels" => "reel",
            _ => "p",
        };
        return Some(Identifier {
            value: caps.get(2)?.as_str().to_string(),
            path_kind: Some(kind),
        });
    }
    is_match(&SHORTCODE, input).then(|| Identifier {
        value: input.to_string(),
        path_kind: Some("p"),
    })
}

fn instagram_hashtag(input: &str, url: bool) -> Option<Identifier> {
    let tag = if url {
        captures(&IG_TAG_URL, input)?.get(1)?.as_str().to_string()
    } else {
        let tag = input.strip_prefix('#').unwrap_or(input);
        if tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || matches!(c, '/' | '#' | '?')) {
            return None;
        }
        tag.to_string()
    };
    Some(Identifier::plain(tag))
}

/// The provider takes the post link itself, so bare ids are rejected.
fn tiktok_post(input: &str) -> Option<Identifier> {
    if let Some(caps) = captures(&TT_VIDEO_URL, input) {
        let user = caps.get(1)?.as_str();
        let video = caps.get(2)?.as_str();
        return Some(Identifier::plain(format!(
            "https://www.tiktok.com/@{user}/video/{video}"
        )));
    }
    let caps = captures(&TT_SHORT_URL, input)?;
    let sub = caps.get(1)?.as_str().to_ascii_lowercase();
    let code = caps.get(2)?.as_str();
    Some(Identifier::plain(format!("https://{sub}.tiktok.com/{code}/")))
}

fn tiktok_profile(input: &str, url: bool) -> Option<Identifier> {
    let user = if url {
        captures(&TT_PROFILE_URL, input)?.get(1)?.as_str().to_string()
    } else {
        bare(input, '@', &USERNAME)?
    };
    Some(Identifier::plain(user))
}

fn youtube_post(input: &str, url: bool) -> Option<Identifier> {
    let id = if url {
        captures(&YT_VIDEO_URL, input)?.get(1)?.as_str()
    } else if is_match(&VIDEO_ID, input) {
        input
    } else {
        return None;
    };
    Some(Identifier::plain(id))
}

/// Channel ids (`UC…`) are kept; every other name becomes an `@handle`.
fn youtube_profile(input: &str, url: bool) -> Option<Identifier> {
    let name = if url {
        if let Some(caps) = captures(&YT_CHANNEL_ID_URL, input) {
            return Some(Identifier::plain(caps.get(1)?.as_str()));
        }
        let name = captures(&YT_HANDLE_URL, input)?.get(1)?.as_str();
        if YOUTUBE_RESERVED.contains(&name.to_ascii_lowercase().as_str()) {
            return None;
        }
        name.to_string()
    } else {
        bare(input, '@', &HANDLE)?
    };
    if is_match(&CHANNEL_ID, &name) {
        Some(Identifier::plain(name))
    } else {
        Some(Identifier::plain(format!("@{name}")))
    }
}

fn snapchat_profile(input: &str, url: bool) -> Option<Identifier> {
    let user = if url {
        captures(&SC_PROFILE_URL, input)?.get(1)?.as_str().to_string()
    } else {
        bare(input, '@', &HANDLE)?
    };
    Some(Identifier::plain(user))
}

fn bare(input: &str, sigil: char, shape: &Option<Regex>) -> Option<String> {
    let value = input.strip_prefix(sigil).unwrap_or(input);
    is_match(shape, value).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(entity: EntityType, raw: &str) -> String {
        normalize(entity, raw)
            .unwrap_or_else(|e| panic!("{raw}: {e}"))
            .value
    }

    fn rejected(entity: EntityType, raw: &str) -> bool {
        matches!(
            normalize(entity, raw),
            Err(FetchError::UnrecognizedIdentifier { .. })
        )
    }

    #[test]
    fn instagram_profile_shapes() {
        let e = EntityType::InstagramProfile;
        assert_eq!(value(e, "https://www.instagram.com/nasa/"), "nasa");
        assert_eq!(value(e, "instagram.com/nasa?hl=en"), "nasa");
        assert_eq!(value(e, "@nasa"), "nasa");
        assert_eq!(value(e, " nasa.gov "), "nasa.gov");
        assert!(rejected(e, "https://www.instagram.com/p/Cabc/"));
        assert!(rejected(e, "two words"));
        assert!(rejected(e, ""));
    }

    #[test]
    fn instagram_post_remembers_path_kind() {
        let e = EntityType::InstagramPost;
        let reel = normalize(e, "https://www.instagram.com/reels/C1x_y-Z/").unwrap();
        assert_eq!(reel.value, "C1x_y-Z");
        assert_eq!(reel.path_kind, Some("reel"));
        let tv = normalize(e, "https://instagram.com/tv/Babc").unwrap();
        assert_eq!(tv.path_kind, Some("tv"));
        assert_eq!(
            normalize(e, "https://www.instagram.com/p/Cabc/").unwrap(),
            normalize(e, "Cabc").unwrap()
        );
        assert!(rejected(e, "https://www.instagram.com/nasa/"));
    }

    #[test]
    fn instagram_hashtag_shapes() {
        let e = EntityType::InstagramHashtag;
        assert_eq!(value(e, "#travel"), "travel");
        assert_eq!(value(e, "https://www.instagram.com/explore/tags/travel/"), "travel");
        assert_eq!(value(e, "café"), "café");
        assert!(rejected(e, "#"));
        assert!(rejected(e, "two tags"));
    }

    #[test]
    fn tiktok_post_links_are_canonical() {
        let e = EntityType::TiktokPost;
        let canonical = "https://www.tiktok.com/@malik.usama.76/video/7481587188128337159";
        assert_eq!(
            value(e, "tiktok.com/@malik.usama.76/video/7481587188128337159?is_from_webapp=1"),
            canonical
        );
        assert_eq!(value(e, canonical), canonical);
        assert_eq!(value(e, "https://vm.tiktok.com/ZMabc123"), "https://vm.tiktok.com/ZMabc123/");
        assert_eq!(value(e, "https://vt.tiktok.com/ZSxyz/"), "https://vt.tiktok.com/ZSxyz/");
        assert!(rejected(e, "7481587188128337159"));
        assert!(rejected(e, "https://www.tiktok.com/@someone"));
    }

    #[test]
    fn tiktok_profile_shapes() {
        let e = EntityType::TiktokProfile;
        assert_eq!(value(e, "https://www.tiktok.com/@khaby.lame"), "khaby.lame");
        assert_eq!(value(e, "@khaby.lame"), "khaby.lame");
        assert_eq!(value(e, "khaby.lame"), "khaby.lame");
    }

    #[test]
    fn youtube_video_shapes() {
        let e = EntityType::YoutubePost;
        for raw in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=10",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
            "https://YOUTU.BE/dQw4w9WgXcQ",
            "HTTPS://WWW.YOUTUBE.COM/SHORTS/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ] {
            assert_eq!(value(e, raw), "dQw4w9WgXcQ", "{raw}");
        }
        assert!(rejected(e, "short"));
        assert!(rejected(e, "https://www.youtube.com/watch?v=tooshort"));
    }

    #[test]
    fn youtube_channel_shapes() {
        let e = EntityType::YoutubeProfile;
        let id = "UC_x5XG1OV2P6uZZ5FSM9Ttw";
        assert_eq!(value(e, &format!("https://www.youtube.com/channel/{id}")), id);
        assert_eq!(value(e, id), id);
        assert_eq!(value(e, "https://www.youtube.com/@TeamFalconsGG"), "@TeamFalconsGG");
        assert_eq!(value(e, "https://www.youtube.com/c/Legacy"), "@Legacy");
        assert_eq!(value(e, "https://www.youtube.com/user/OldName"), "@OldName");
        assert_eq!(value(e, "TeamFalconsGG"), "@TeamFalconsGG");
        assert!(rejected(e, "https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn snapchat_profile_shapes() {
        let e = EntityType::SnapchatProfile;
        assert_eq!(value(e, "https://www.snapchat.com/add/djkhaled305"), "djkhaled305");
        assert_eq!(value(e, "djkhaled305"), "djkhaled305");
        assert!(rejected(e, "https://www.snapchat.com/discover/x"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            (EntityType::InstagramProfile, "https://www.instagram.com/nasa/"),
            (EntityType::InstagramPost, "https://www.instagram.com/reel/Cabc/"),
            (EntityType::InstagramHashtag, "#travel"),
            (EntityType::TiktokPost, "https://vm.tiktok.com/ZMabc123"),
            (EntityType::TiktokProfile, "@khaby.lame"),
            (EntityType::YoutubePost, "https://youtu.be/dQw4w9WgXcQ"),
            (EntityType::YoutubeProfile, "https://www.youtube.com/c/Legacy"),
            (EntityType::SnapchatProfile, "https://www.snapchat.com/add/djkhaled305"),
        ];
        for (entity, raw) in cases {
            let once = value(entity, raw);
            assert_eq!(value(entity, &once), once, "{entity}: {raw}");
        }
    }
}
