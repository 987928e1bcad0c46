//! Tenant naming rules for kinds and record ids

use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

/// `tenant:group:type:major.minor.patch`
static KIND_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[\w\-\.]+:[\w\-\.]+:[\w\-\.]+:[0-9]+\.[0-9]+\.[0-9]+$").ok()
});

/// Check that a kind has the `tenant:group:type:version` shape and belongs to `tenant`
#[must_use]
pub fn is_kind_from_tenant_valid(kind: &str, tenant: &str) -> bool {
    let shape_ok = KIND_PATTERN.as_ref().is_some_and(|re| re.is_match(kind));
    shape_ok && first_component_matches(kind, tenant)
}

/// Check that a record id is tenant-qualified (`tenant:...`)
#[must_use]
pub fn is_record_id_valid(id: &str, tenant: &str) -> bool {
    id.contains(':') && first_component_matches(id, tenant)
}

/// Generate a new tenant-qualified record id
#[must_use]
pub fn new_record_id(tenant: &str) -> String {
    format!("{tenant}:{}", Uuid::new_v4().simple())
}

fn first_component_matches(value: &str, tenant: &str) -> bool {
    value
        .split(':')
        .next()
        .is_some_and(|first| !first.is_empty() && first.eq_ignore_ascii_case(tenant))
}
