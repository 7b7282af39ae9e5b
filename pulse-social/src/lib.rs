//! Social-media metadata fetchers.
//!
//! One generic pipeline serves every (platform, entity type) pair:
//!
//! 1. [`identifier::normalize`] turns a link or handle into the provider's id.
//! 2. [`fetcher::SocialFetcher::fetch`] calls the provider, moving through the
//!    caller's [`rotation::CredentialRotator`] on rate limits and refused keys.
//! 3. The entity's [`platform::FetcherProfile`] maps the payload into
//!    [`record::CanonicalRecord`]s.
//!
//! [`batch::collect`] runs the pipeline over a list of identifiers and
//! reports per-identifier failures inline.
pub mod batch;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod identifier;
pub mod language;
pub mod platform;
pub mod record;
pub mod rotation;

pub use batch::{BatchRequest, BatchResponse, BatchStatus, collect};
pub use error::FetchError;
pub use fetcher::SocialFetcher;
pub use platform::EntityType;
pub use record::{CanonicalRecord, ErrorRecord, FetchOutput, FieldValue};
pub use rotation::{CredentialRotator, KeyRotator, SharedRotator};
