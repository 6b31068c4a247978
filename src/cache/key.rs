//! Cache key fingerprinting.
//!
//! Keys read `<kind>:<sha256 hex>`, where the digest covers the resource
//! kind, every upstream path, and the content-affecting query parameters in
//! sorted order. Fields are length-prefixed and each group is tagged and
//! counted, so that no two distinct inputs share an encoding.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::resource::{RequestDescriptor, UpstreamTarget};

/// Deterministic identifier of a cacheable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `descriptor`, or `None` for static resources,
    /// which never touch the store.
    pub fn for_descriptor(descriptor: &RequestDescriptor) -> Option<Self> {
        let mut hasher = Sha256::new();
        write_field(&mut hasher, descriptor.kind.as_str());

        match &descriptor.target {
            UpstreamTarget::Static { .. } => return None,
            UpstreamTarget::Path(path) => {
                write_field(&mut hasher, "path");
                write_field(&mut hasher, path);
            }
            UpstreamTarget::Multi(sources) => {
                write_field(&mut hasher, "sources");
                hasher.update((sources.len() as u64).to_be_bytes());
                for source in sources {
                    write_field(&mut hasher, &source.name);
                    write_field(&mut hasher, &source.path);
                }
            }
        }

        // BTreeMap iteration is already sorted by parameter name
        write_field(&mut hasher, "query");
        hasher.update((descriptor.query.len() as u64).to_be_bytes());
        for (name, value) in &descriptor.query {
            write_field(&mut hasher, name);
            write_field(&mut hasher, value);
        }

        let digest = hex::encode(hasher.finalize());
        Some(Self(format!("{}:{}", descriptor.kind.as_str(), digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn write_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{InboundRequest, NamedSource, ResourceKind};
    use std::collections::BTreeMap;

    fn descriptor(kind: ResourceKind, target: UpstreamTarget, query: &[(&str, &str)]) -> RequestDescriptor {
        RequestDescriptor {
            kind,
            template: "item.html".into(),
            target,
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            request: InboundRequest::get("/"),
        }
    }

    #[test]
    fn test_same_identity_same_key() {
        let a = descriptor(ResourceKind::Item, UpstreamTarget::Path("node/1".into()), &[]);
        let b = descriptor(ResourceKind::Item, UpstreamTarget::Path("node/1".into()), &[]);
        assert_eq!(CacheKey::for_descriptor(&a), CacheKey::for_descriptor(&b));
    }

    #[test]
    fn test_key_is_prefixed_with_kind() {
        let d = descriptor(ResourceKind::List, UpstreamTarget::Path("node".into()), &[("page", "2")]);
        let key = CacheKey::for_descriptor(&d).unwrap();
        assert!(key.as_str().starts_with("list:"));
        assert_eq!(key.as_str().len(), "list:".len() + 64);
    }

    #[test]
    fn test_kind_path_and_query_all_separate_keys() {
        let base = descriptor(ResourceKind::Item, UpstreamTarget::Path("node/1".into()), &[]);
        let other_kind = descriptor(ResourceKind::List, UpstreamTarget::Path("node/1".into()), &[]);
        let other_path = descriptor(ResourceKind::Item, UpstreamTarget::Path("node/2".into()), &[]);
        let other_query = descriptor(
            ResourceKind::Item,
            UpstreamTarget::Path("node/1".into()),
            &[("page", "1")],
        );

        let key = CacheKey::for_descriptor(&base);
        assert_ne!(key, CacheKey::for_descriptor(&other_kind));
        assert_ne!(key, CacheKey::for_descriptor(&other_path));
        assert_ne!(key, CacheKey::for_descriptor(&other_query));
    }

    #[test]
    fn test_field_boundaries_do_not_collide() {
        let a = descriptor(
            ResourceKind::List,
            UpstreamTarget::Path("node".into()),
            &[("ab", "c")],
        );
        let b = descriptor(
            ResourceKind::List,
            UpstreamTarget::Path("node".into()),
            &[("a", "bc")],
        );
        assert_ne!(CacheKey::for_descriptor(&a), CacheKey::for_descriptor(&b));
    }

    #[test]
    fn test_multi_sources_are_part_of_identity() {
        let source = |name: &str, path: &str| NamedSource {
            name: name.into(),
            path: path.into(),
        };
        let a = descriptor(
            ResourceKind::Multi,
            UpstreamTarget::Multi(vec![source("news", "node/news"), source("menu", "menu/main")]),
            &[],
        );
        let b = descriptor(
            ResourceKind::Multi,
            UpstreamTarget::Multi(vec![source("news", "node/news")]),
            &[],
        );
        assert_ne!(CacheKey::for_descriptor(&a), CacheKey::for_descriptor(&b));
    }

    #[test]
    fn test_sources_and_query_do_not_collide() {
        let source = |name: &str, path: &str| NamedSource {
            name: name.into(),
            path: path.into(),
        };
        let two_sources = descriptor(
            ResourceKind::Multi,
            UpstreamTarget::Multi(vec![source("x", "p"), source("q", "v")]),
            &[],
        );
        let source_and_query = descriptor(
            ResourceKind::Multi,
            UpstreamTarget::Multi(vec![source("x", "p")]),
            &[("q", "v")],
        );
        assert_ne!(
            CacheKey::for_descriptor(&two_sources),
            CacheKey::for_descriptor(&source_and_query)
        );
    }

    #[test]
    fn test_static_has_no_key() {
        let d = descriptor(
            ResourceKind::Static,
            UpstreamTarget::Static {
                resource: "http://cms/api/about/".into(),
            },
            &[],
        );
        assert!(CacheKey::for_descriptor(&d).is_none());
    }
}
