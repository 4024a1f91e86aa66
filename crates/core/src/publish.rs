//! The npm publish payload.
//!
//! A `PUT /<package>` body carries version manifests, dist-tags, and a
//! base64-encoded tarball attachment. The first key of each map is the
//! semantically meaningful one (the version being published, the tag to
//! apply), so these maps preserve document order.

use crate::manifest::PackageManifest;
use base64::{Engine as _, engine::general_purpose};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A base64-encoded upload attachment, CouchDB style.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl Attachment {
    /// Decoded payload size, computed analytically from the encoded length
    /// without decoding: `floor(len * 3/4)` minus the trailing padding
    /// characters (standard base64 pads with 0-2 `=` at the end).
    pub fn decoded_size(&self) -> u64 {
        let encoded = self.data.as_bytes();
        let padding = encoded.iter().rev().take(2).filter(|&&b| b == b'=').count() as u64;
        (encoded.len() as u64 * 3 / 4).saturating_sub(padding)
    }

    /// Decode the payload.
    pub fn decode(&self) -> crate::Result<Vec<u8>> {
        general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| crate::Error::InvalidBase64(e.to_string()))
    }
}

/// A parsed npm publish request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub versions: IndexMap<String, PackageManifest>,

    #[serde(rename = "dist-tags", default)]
    pub dist_tags: IndexMap<String, String>,

    #[serde(rename = "_attachments", default)]
    pub attachments: IndexMap<String, Attachment>,
}

impl PublishRequest {
    /// Parse a publish request from raw JSON bytes.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::PayloadParse(e.to_string()))
    }

    /// The version being published: the first key of `versions`.
    pub fn lead_version(&self) -> Option<(&str, &PackageManifest)> {
        self.versions
            .first()
            .map(|(version, manifest)| (version.as_str(), manifest))
    }

    /// The dist-tag to apply: the first key of `dist-tags`.
    pub fn lead_dist_tag(&self) -> Option<(&str, &str)> {
        self.dist_tags
            .first()
            .map(|(tag, version)| (tag.as_str(), version.as_str()))
    }

    /// The tarball attachment under the conventional `<name>-<version>.tgz`
    /// filename.
    pub fn tarball_attachment(&self, version: &str) -> Option<&Attachment> {
        self.attachments
            .get(&format!("{}-{}.tgz", self.name, version))
    }

    /// Versions whose manifest fragment carries a `deprecated` field.
    pub fn deprecated_versions(&self) -> impl Iterator<Item = (&str, &PackageManifest)> {
        self.versions
            .iter()
            .filter(|(_, manifest)| manifest.deprecated.is_some())
            .map(|(version, manifest)| (version.as_str(), manifest))
    }
}
