//! Per-provider fetch profiles.
//!
//! Every (platform, entity type) pair is described by one static
//! [`FetcherProfile`]: where to send the request, which payload field proves
//! the response carries data, and the table of canonical fields to read out of
//! it. The fetch pipeline itself is shared and lives in [`crate::fetcher`].
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::extract::{format_timestamp, is_truthy, joined, lookup, normalize_duration, truncate_text, walk};
use crate::identifier::Identifier;
use crate::language::{LanguageDetector, detect_language};
use crate::record::{CanonicalRecord, FetchOutput, FieldValue};

/// Characters left as-is when an identifier is spliced into a URL path.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    InstagramPost,
    InstagramProfile,
    InstagramHashtag,
    TiktokPost,
    TiktokProfile,
    YoutubePost,
    YoutubeProfile,
    SnapchatProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity type `{0}`")]
pub struct UnknownEntityType(pub String);

impl EntityType {
    pub const ALL: [EntityType; 8] = [
        EntityType::InstagramPost,
        EntityType::InstagramProfile,
        EntityType::InstagramHashtag,
        EntityType::TiktokPost,
        EntityType::TiktokProfile,
        EntityType::YoutubePost,
        EntityType::YoutubeProfile,
        EntityType::SnapchatProfile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::InstagramPost => "instagram_post",
            EntityType::InstagramProfile => "instagram_profile",
            EntityType::InstagramHashtag => "instagram_hashtag",
            EntityType::TiktokPost => "tiktok_post",
            EntityType::TiktokProfile => "tiktok_profile",
            EntityType::YoutubePost => "youtube_post",
            EntityType::YoutubeProfile => "youtube_profile",
            EntityType::SnapchatProfile => "snapchat_profile",
        }
    }

    /// Display label of the platform, as shown in error records.
    pub fn platform(self) -> &'static str {
        match self {
            EntityType::InstagramPost | EntityType::InstagramProfile | EntityType::InstagramHashtag => {
                "Instagram"
            }
            EntityType::TiktokPost | EntityType::TiktokProfile => "Tiktok",
            EntityType::YoutubePost | EntityType::YoutubeProfile => "Youtube",
            EntityType::SnapchatProfile => "Snapchat",
        }
    }

    pub fn profile(self) -> &'static FetcherProfile {
        match self {
            EntityType::InstagramPost => &INSTAGRAM_POST,
            EntityType::InstagramProfile => &INSTAGRAM_PROFILE,
            EntityType::InstagramHashtag => &INSTAGRAM_HASHTAG,
            EntityType::TiktokPost => &TIKTOK_POST,
            EntityType::TiktokProfile => &TIKTOK_PROFILE,
            EntityType::YoutubePost => &YOUTUBE_POST,
            EntityType::YoutubeProfile => &YOUTUBE_PROFILE,
            EntityType::SnapchatProfile => &SNAPCHAT_PROFILE,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tag = raw.trim();
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == tag)
            .ok_or_else(|| UnknownEntityType(tag.to_string()))
    }
}

/// Value of a query parameter.
#[derive(Debug, Clone, Copy)]
pub enum QueryValue {
    /// The normalized identifier.
    Identifier,
    Fixed(&'static str),
}

/// Request target relative to the provider host. `{id}` in `path` is replaced
/// by the percent-encoded identifier.
#[derive(Debug)]
pub struct Endpoint {
    pub path: &'static str,
    pub query: &'static [(&'static str, QueryValue)],
}

impl Endpoint {
    pub fn render_path(&self, id: &str) -> String {
        if self.path.contains("{id}") {
            let encoded = utf8_percent_encode(id, PATH_SAFE).to_string();
            self.path.replace("{id}", &encoded)
        } else {
            self.path.to_string()
        }
    }

    /// Query pairs, unencoded; the HTTP client encodes them.
    pub fn render_query<'a>(&self, id: &'a str) -> Vec<(&'static str, Cow<'a, str>)> {
        self.query
            .iter()
            .map(|(name, value)| match value {
                QueryValue::Identifier => (*name, Cow::Borrowed(id)),
                QueryValue::Fixed(v) => (*name, Cow::Borrowed(*v)),
            })
            .collect()
    }
}

/// How one canonical field is produced. Paths are relative to the profile's
/// root (or to each feed item).
#[derive(Debug)]
pub enum FieldRule {
    Path(&'static str),
    /// `path`, or the fallback rule when `path` is missing.
    PathOr {
        path: &'static str,
        fallback: &'static FieldRule,
    },
    /// The normalized identifier that was requested.
    Identifier,
    Timestamp {
        path: &'static str,
        with_time: bool,
    },
    /// Language detected from the text at the path.
    Language(&'static str),
    /// `path` only when `flag` is truthy.
    WhenTrue {
        flag: &'static str,
        path: &'static str,
    },
    Flag(&'static str),
    Joined(&'static str),
    Truncated {
        path: &'static str,
        max_chars: usize,
    },
    Duration(&'static str),
    /// `{}` in the template replaced by the value at `path`.
    UrlFrom {
        template: &'static str,
        path: &'static str,
    },
    /// `{}` in the template replaced by an earlier field of the same record.
    UrlFromField {
        template: &'static str,
        label: &'static str,
    },
    /// `{id}` and `{kind}` replaced from the normalized identifier.
    UrlFromIdentifier(&'static str),
}

#[derive(Debug)]
pub struct FetcherProfile {
    pub entity: EntityType,
    pub host: &'static str,
    pub endpoint: Endpoint,
    /// Any one of these paths being truthy marks a usable payload.
    pub markers: &'static [&'static str],
    /// Path the field table reads from. Empty means the whole body.
    pub root: &'static str,
    /// Feeds only: path to the array of items, each mapped to one record.
    pub items: Option<&'static str>,
    pub fields: &'static [(&'static str, FieldRule)],
}

struct Scope<'a> {
    value: &'a Value,
    identifier: &'a Identifier,
    detector: &'a dyn LanguageDetector,
}

impl FetcherProfile {
    pub fn has_marker(&self, body: &Value) -> bool {
        self.markers.iter().any(|path| is_truthy(body, path))
    }

    /// Map a success payload to its canonical record(s). Callers check
    /// [`has_marker`](Self::has_marker) first.
    pub fn normalize(
        &self,
        body: &Value,
        identifier: &Identifier,
        detector: &dyn LanguageDetector,
    ) -> FetchOutput {
        let root = walk(body, self.root).unwrap_or(&Value::Null);
        match self.items {
            Some(items) => {
                let records = walk(root, items)
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .map(|item| self.build_record(item, identifier, detector))
                            .collect()
                    })
                    .unwrap_or_default();
                FetchOutput::Records(records)
            }
            None => FetchOutput::Record(self.build_record(root, identifier, detector)),
        }
    }

    pub fn build_record(
        &self,
        value: &Value,
        identifier: &Identifier,
        detector: &dyn LanguageDetector,
    ) -> CanonicalRecord {
        let scope = Scope {
            value,
            identifier,
            detector,
        };
        let mut record = CanonicalRecord::new();
        for (label, rule) in self.fields {
            let field = scope.eval(rule, &record);
            record.insert(*label, field);
        }
        record
    }
}

impl Scope<'_> {
    fn eval(&self, rule: &FieldRule, record: &CanonicalRecord) -> FieldValue {
        match rule {
            FieldRule::Path(path) => lookup(self.value, path),
            FieldRule::PathOr { path, fallback } => match lookup(self.value, path) {
                FieldValue::Missing => self.eval(fallback, record),
                found => found,
            },
            FieldRule::Identifier => FieldValue::Text(self.identifier.value.clone()),
            FieldRule::Timestamp { path, with_time } => {
                format_timestamp(&lookup(self.value, path), *with_time)
            }
            FieldRule::Language(path) => detect_language(self.detector, &lookup(self.value, path)),
            FieldRule::WhenTrue { flag, path } => {
                if is_truthy(self.value, flag) {
                    lookup(self.value, path)
                } else {
                    FieldValue::Missing
                }
            }
            FieldRule::Flag(path) => FieldValue::Bool(is_truthy(self.value, path)),
            FieldRule::Joined(path) => joined(self.value, path),
            FieldRule::Truncated { path, max_chars } => {
                truncate_text(lookup(self.value, path), *max_chars)
            }
            FieldRule::Duration(path) => normalize_duration(lookup(self.value, path)),
            FieldRule::UrlFrom { template, path } => fill(template, &lookup(self.value, path)),
            FieldRule::UrlFromField { template, label } => {
                fill(template, record.get(label).unwrap_or(&FieldValue::Missing))
            }
            FieldRule::UrlFromIdentifier(template) => FieldValue::Text(
                template
                    .replace("{id}", &self.identifier.value)
                    .replace("{kind}", self.identifier.path_kind.unwrap_or("p")),
            ),
        }
    }
}

fn fill(template: &str, value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Missing | FieldValue::Bool(_) => FieldValue::Missing,
        v => FieldValue::Text(template.replace("{}", &v.to_string())),
    }
}

// ==============================
// Instagram
// ==============================

static INSTAGRAM_POST: FetcherProfile = FetcherProfile {
    entity: EntityType::InstagramPost,
    host: "instagram-social-api.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/v1/post_info",
        query: &[("code_or_id_or_url", QueryValue::Identifier)],
    },
    markers: &["data"],
    root: "data",
    items: None,
    fields: &[
        ("Caption", FieldRule::Path("caption.text")),
        ("Likes", FieldRule::Path("metrics.like_count")),
        ("Comments", FieldRule::Path("metrics.comment_count")),
        ("Shares", FieldRule::Path("metrics.share_count")),
        (
            "Video Views",
            FieldRule::WhenTrue {
                flag: "is_video",
                path: "metrics.play_count",
            },
        ),
        (
            "Created At",
            FieldRule::Timestamp {
                path: "caption.created_at",
                with_time: true,
            },
        ),
        ("Username", FieldRule::Path("user.username")),
        ("Full Name", FieldRule::Path("user.full_name")),
        (
            "Post URL",
            FieldRule::UrlFromIdentifier("https://www.instagram.com/{kind}/{id}/"),
        ),
        (
            "Author Profile URL",
            FieldRule::UrlFrom {
                template: "https://www.instagram.com/{}/",
                path: "user.username",
            },
        ),
        ("Caption Language", FieldRule::Language("caption.text")),
    ],
};

static INSTAGRAM_PROFILE: FetcherProfile = FetcherProfile {
    entity: EntityType::InstagramProfile,
    host: "simple-instagram-api.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/account-info",
        query: &[("username", QueryValue::Identifier)],
    },
    markers: &["username"],
    root: "",
    items: None,
    fields: &[
        ("Username", FieldRule::Path("username")),
        ("Full Name", FieldRule::Path("full_name")),
        ("Followers", FieldRule::Path("edge_followed_by.count")),
        ("Following", FieldRule::Path("edge_follow.count")),
        ("Posts Count", FieldRule::Path("edge_owner_to_timeline_media.count")),
        (
            "Profile URL",
            FieldRule::UrlFrom {
                template: "https://www.instagram.com/{}/",
                path: "username",
            },
        ),
    ],
};

static INSTAGRAM_HASHTAG: FetcherProfile = FetcherProfile {
    entity: EntityType::InstagramHashtag,
    host: "instagram-social-api.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/v1/hashtag",
        query: &[("hashtag", QueryValue::Identifier)],
    },
    markers: &["data.items"],
    root: "",
    items: Some("data.items"),
    fields: &[
        ("Username", FieldRule::Path("user.username")),
        ("Full Name", FieldRule::Path("user.full_name")),
        (
            "Caption Text",
            FieldRule::Truncated {
                path: "caption.text",
                max_chars: 70,
            },
        ),
        ("Hashtags", FieldRule::Joined("caption.hashtags")),
        ("Is Video", FieldRule::Flag("is_video")),
        ("Likes", FieldRule::Path("like_count")),
        ("Comments", FieldRule::Path("comment_count")),
        (
            "Video Views",
            FieldRule::WhenTrue {
                flag: "is_video",
                path: "ig_play_count",
            },
        ),
        (
            "Created At",
            FieldRule::Timestamp {
                path: "taken_at",
                with_time: false,
            },
        ),
        (
            "Instagram URL",
            FieldRule::UrlFrom {
                template: "https://www.instagram.com/p/{}/",
                path: "code",
            },
        ),
        ("Caption Language", FieldRule::Language("caption.text")),
    ],
};

// ==============================
// TikTok
// ==============================

static TIKTOK_POST: FetcherProfile = FetcherProfile {
    entity: EntityType::TiktokPost,
    host: "tiktok89.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/tiktok",
        query: &[("link", QueryValue::Identifier)],
    },
    markers: &["ok"],
    root: "",
    items: None,
    fields: &[
        ("Views", FieldRule::Path("statistics.play_count")),
        ("Likes", FieldRule::Path("statistics.digg_count")),
        ("Comments", FieldRule::Path("statistics.comment_count")),
        ("Shares", FieldRule::Path("statistics.share_count")),
        ("Video URL", FieldRule::Path("share_url")),
        ("Author Username", FieldRule::Path("author.unique_id")),
        ("Video Duration (seconds)", FieldRule::Duration("video.duration")),
        ("Video Language", FieldRule::Path("desc_language")),
        ("Caption Language", FieldRule::Path("desc_language")),
        (
            "Created Date (UTC)",
            FieldRule::Timestamp {
                path: "create_time",
                with_time: true,
            },
        ),
    ],
};

static TIKTOK_PROFILE: FetcherProfile = FetcherProfile {
    entity: EntityType::TiktokProfile,
    host: "tiktok-api6.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/user/details",
        query: &[("username", QueryValue::Identifier)],
    },
    markers: &["username"],
    root: "",
    items: None,
    fields: &[
        ("Username", FieldRule::Path("username")),
        ("Nickname", FieldRule::Path("nickname")),
        ("Profile Followers", FieldRule::Path("followers")),
        ("Following Count", FieldRule::Path("following")),
        ("Total Likes Received", FieldRule::Path("total_heart")),
        ("Posts Count", FieldRule::Path("total_videos")),
        (
            "Profile URL",
            FieldRule::UrlFrom {
                template: "https://www.tiktok.com/@{}",
                path: "username",
            },
        ),
    ],
};

// ==============================
// YouTube
// ==============================

static YOUTUBE_POST: FetcherProfile = FetcherProfile {
    entity: EntityType::YoutubePost,
    host: "youtube-v38.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/video/details/",
        query: &[
            ("id", QueryValue::Identifier),
            ("hl", QueryValue::Fixed("en")),
            ("gl", QueryValue::Fixed("US")),
        ],
    },
    markers: &["videoId", "title"],
    root: "",
    items: None,
    fields: &[
        ("Views", FieldRule::Path("stats.views")),
        ("Likes", FieldRule::Path("stats.likes")),
        ("Comments", FieldRule::Path("stats.comments")),
        (
            "Video URL",
            FieldRule::UrlFromIdentifier("https://www.youtube.com/watch?v={id}"),
        ),
        ("Channel Name", FieldRule::Path("author.title")),
        (
            "Channel URL",
            FieldRule::UrlFrom {
                template: "https://www.youtube.com/channel/{}",
                path: "author.channelId",
            },
        ),
        ("Video Duration (seconds)", FieldRule::Path("lengthSeconds")),
        (
            "Published Date (UTC)",
            FieldRule::Timestamp {
                path: "publishedDate",
                with_time: true,
            },
        ),
        ("Description Language", FieldRule::Language("description")),
    ],
};

static YOUTUBE_PROFILE: FetcherProfile = FetcherProfile {
    entity: EntityType::YoutubeProfile,
    host: "youtube-shorts-sounds-songs-api.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/channel/handle/{id}",
        query: &[],
    },
    markers: &["id", "name"],
    root: "",
    items: None,
    fields: &[
        (
            "Channel Handle",
            FieldRule::PathOr {
                path: "handle",
                fallback: &FieldRule::Identifier,
            },
        ),
        ("Channel Name", FieldRule::Path("name")),
        ("Subscribers", FieldRule::Path("subscribers")),
        ("Total Videos", FieldRule::Path("videoCount")),
        ("Total Channel Views", FieldRule::Path("viewCount")),
        (
            "Channel URL",
            FieldRule::UrlFromField {
                template: "https://www.youtube.com/{}",
                label: "Channel Handle",
            },
        ),
    ],
};

// ==============================
// Snapchat
// ==============================

static SNAPCHAT_PROFILE: FetcherProfile = FetcherProfile {
    entity: EntityType::SnapchatProfile,
    host: "snapchat-scraper2.p.rapidapi.com",
    endpoint: Endpoint {
        path: "/api/v1/users/detail",
        query: &[("username", QueryValue::Identifier)],
    },
    markers: &["data.props.pageProps.userProfile.publicProfileInfo.username"],
    root: "data.props.pageProps",
    items: None,
    fields: &[
        (
            "Username",
            FieldRule::PathOr {
                path: "userProfile.publicProfileInfo.username",
                fallback: &FieldRule::Identifier,
            },
        ),
        ("Display Name", FieldRule::Path("userProfile.publicProfileInfo.title")),
        ("Followers", FieldRule::Path("userProfile.publicProfileInfo.subscriberCount")),
        (
            "Profile URL",
            FieldRule::PathOr {
                path: "pageLinks.snapchatCanonicalUrl",
                fallback: &FieldRule::UrlFromField {
                    template: "https://www.snapchat.com/add/{}",
                    label: "Username",
                },
            },
        ),
    ],
};
