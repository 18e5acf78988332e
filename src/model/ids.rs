//! Deterministic entity identifiers.
//!
//! IDs are path-stable strings of the shape `kind:parent-id:name:discriminator`,
//! never UUIDs or sequence counters: the same file text must yield byte-identical
//! IDs across repeated indexing runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use super::EntityKind;

/// A deterministic, printable, path-like entity identifier.
///
/// Cheap to clone (reference-counted) since IDs are used pervasively as map
/// keys and edge endpoints across worker threads.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(Arc<str>);

impl EntityId {
    /// Wrap an already-computed ID string. Prefer [`mint`] for new IDs.
    pub fn from_raw(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mint a deterministic entity ID.
///
/// `parent_id` is the owning entity's ID (empty string for File entities,
/// which have no parent). `discriminator` disambiguates overloads / distinct
/// declarations that would otherwise share `(parent_id, kind, name)` — typically
/// a signature string or a byte range; it is hashed down to a short hex suffix
/// so IDs stay short and printable regardless of how large the discriminator
/// input is.
///
/// An empty `name` mints `<anon-N>` where `N` is the caller-supplied
/// `anon_position` (typically the declaration's start byte offset), so that
/// anonymous declarations (e.g. default-exported arrow functions) still get a
/// stable, collision-free name component.
pub fn mint(parent_id: &str, kind: EntityKind, name: &str, discriminator: &str) -> EntityId {
    mint_inner(parent_id, kind, name, discriminator, None)
}

/// Mint an ID for an anonymous declaration at a known source position.
pub fn mint_anonymous(
    parent_id: &str,
    kind: EntityKind,
    discriminator: &str,
    anon_position: u32,
) -> EntityId {
    mint_inner(parent_id, kind, "", discriminator, Some(anon_position))
}

fn mint_inner(
    parent_id: &str,
    kind: EntityKind,
    name: &str,
    discriminator: &str,
    anon_position: Option<u32>,
) -> EntityId {
    let name_part = if name.is_empty() {
        format!("<anon-{}>", anon_position.unwrap_or(0))
    } else {
        name.to_string()
    };

    let raw = if discriminator.is_empty() {
        format!("{}:{}:{}", kind.as_str(), parent_id, name_part)
    } else {
        let hash8 = short_hash(discriminator);
        format!("{}:{}:{}:{}", kind.as_str(), parent_id, name_part, hash8)
    };

    EntityId::from_raw(raw)
}

/// Mint a File entity ID from its repo-relative path. Paths are already
/// unique within a repository, so no discriminator is needed.
pub fn mint_file(relative_path: &str) -> EntityId {
    mint("", EntityKind::File, relative_path, "")
}

/// Mint a GhostNode ID from its (package_name, name, kind) triple — the key
/// the spec requires to be unique per ghost (testable property 5).
pub fn mint_ghost(package_name: Option<&str>, name: &str, kind: EntityKind) -> EntityId {
    let discriminator = package_name.unwrap_or("<local>");
    mint("", EntityKind::Ghost, name, &format!("{discriminator}:{}", kind.as_str()))
}

/// Short, stable, non-cryptographic-strength-but-collision-resistant-enough
/// hash of a discriminator string, hex-encoded to 8 characters. Reuses the
/// `sha2` dependency already pulled in for file content hashing rather than
/// adding a second hashing crate for this much smaller job.
fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_is_deterministic() {
        let a = mint("file:a.rs", EntityKind::Function, "foo", "fn foo()");
        let b = mint("file:a.rs", EntityKind::Function, "foo", "fn foo()");
        assert_eq!(a, b);
    }

    #[test]
    fn mint_distinguishes_overloads_by_discriminator() {
        let a = mint("file:a.rs", EntityKind::Function, "foo", "fn foo(x: i32)");
        let b = mint("file:a.rs", EntityKind::Function, "foo", "fn foo(x: i32, y: i32)");
        assert_ne!(a, b);
    }

    #[test]
    fn mint_without_discriminator_is_stable_across_runs() {
        let id = mint_file("src/lib.rs");
        assert_eq!(id.as_str(), "file::src/lib.rs");
    }

    #[test]
    fn empty_name_uses_anon_position() {
        let a = mint_anonymous("file:a.ts", EntityKind::Function, "arrow", 42);
        let b = mint_anonymous("file:a.ts", EntityKind::Function, "arrow", 43);
        assert!(a.as_str().contains("<anon-42>"));
        assert_ne!(a, b);
    }

    #[test]
    fn ghost_id_is_keyed_by_package_name_and_kind() {
        let a = mint_ghost(Some("axios"), "get", EntityKind::Function);
        let b = mint_ghost(Some("axios"), "get", EntityKind::Function);
        let c = mint_ghost(Some("lodash"), "get", EntityKind::Function);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn id_is_printable_and_path_like() {
        let id = mint("file::a.rs", EntityKind::Function, "foo", "fn foo()");
        let s = id.to_string();
        assert!(s.chars().all(|c| !c.is_control()));
        assert!(s.starts_with("function:"));
    }
}
