//! Manifest coherence checking.
//!
//! Before a temporary package is finalized, the `package.json` embedded in
//! the uploaded tarball must agree with the identity supplied out of band:
//! same name, same version, same `scripts` object. A disagreement means the
//! tarball was tampered with or mismatched, and the publish is rejected.

use crate::error::MismatchError;
use amphora_core::PackageManifest;
use amphora_metadata::models::{NpmMetadatumRow, PackageRow};
use serde_json::{Map, Value};

/// Validate that the embedded manifest matches the persisted package.
///
/// `scripts` defaults to `{}` on both sides: a manifest without scripts is
/// coherent with a package that never recorded any. Pure gate; returns
/// without side effects on success.
pub fn check_manifest_coherence(
    package: &PackageRow,
    metadatum: Option<&NpmMetadatumRow>,
    manifest: &PackageManifest,
) -> Result<(), MismatchError> {
    let mut fields = Vec::new();

    if manifest.name != package.name {
        fields.push("name");
    }
    if manifest.version != package.version {
        fields.push("version");
    }
    if manifest.scripts != recorded_scripts(metadatum) {
        fields.push("scripts");
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(MismatchError { fields })
    }
}

/// The previously recorded scripts object, `{}` when never recorded.
fn recorded_scripts(metadatum: Option<&NpmMetadatumRow>) -> Map<String, Value> {
    metadatum
        .and_then(|m| serde_json::from_str(&m.package_json_scripts).ok())
        .unwrap_or_default()
}
