//! Authorization and protected-package policy seams.
//!
//! Both checks fail closed in the orchestrator: no placeholder package is
//! created for an actor without the create capability or for a protected
//! name.

use amphora_core::PackageType;
use async_trait::async_trait;
use uuid::Uuid;

/// Authorization decisions for package operations.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn can_create_package(&self, user_id: Uuid, project_id: Uuid) -> bool;
    async fn can_destroy_package(&self, user_id: Uuid, project_id: Uuid) -> bool;
}

/// Grants every capability. For tests and trusted internal callers.
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn can_create_package(&self, _user_id: Uuid, _project_id: Uuid) -> bool {
        true
    }

    async fn can_destroy_package(&self, _user_id: Uuid, _project_id: Uuid) -> bool {
        true
    }
}

/// Denies every capability.
pub struct DenyAll;

#[async_trait]
impl Authorizer for DenyAll {
    async fn can_create_package(&self, _user_id: Uuid, _project_id: Uuid) -> bool {
        false
    }

    async fn can_destroy_package(&self, _user_id: Uuid, _project_id: Uuid) -> bool {
        false
    }
}

/// Protected-package name check.
#[async_trait]
pub trait PackagePolicy: Send + Sync {
    async fn package_protected(&self, name: &str, package_type: PackageType) -> bool;
}

/// Pattern-list policy: a name is protected when it matches an exact pattern
/// or a `prefix*` glob.
#[derive(Default)]
pub struct ProtectedPatterns {
    patterns: Vec<String>,
}

impl ProtectedPatterns {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => name.starts_with(prefix),
                None => name == pattern,
            }
        })
    }
}

#[async_trait]
impl PackagePolicy for ProtectedPatterns {
    async fn package_protected(&self, name: &str, _package_type: PackageType) -> bool {
        self.matches(name)
    }
}
