use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered prefix to namespace mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefixMap {
    entries: IndexMap<String, String>,
}

impl PrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.entries.insert(prefix.into(), namespace.into());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Adds every entry of `other` whose prefix is not yet bound.
    pub fn merge(&mut self, other: &PrefixMap) {
        for (prefix, namespace) in other.iter() {
            self.entries
                .entry(prefix.to_string())
                .or_insert_with(|| namespace.to_string());
        }
    }

    /// Expands `prefix:local`. Returns `None` for unbound prefixes.
    pub fn expand(&self, prefix: &str, local: &str) -> Option<String> {
        self.get(prefix).map(|namespace| format!("{namespace}{local}"))
    }

    /// Shortens an IRI with the longest matching namespace, or wraps it in
    /// angle brackets.
    pub fn qualify(&self, iri: &str) -> String {
        let best = self
            .entries
            .iter()
            .filter(|(_, namespace)| !namespace.is_empty() && iri.starts_with(namespace.as_str()))
            .filter(|(_, namespace)| is_local_name(&iri[namespace.len()..]))
            .max_by_key(|(_, namespace)| namespace.len());
        match best {
            Some((prefix, namespace)) => format!("{prefix}:{}", &iri[namespace.len()..]),
            None => format!("<{iri}>"),
        }
    }
}

fn is_local_name(local: &str) -> bool {
    let mut chars = local.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_alphanumeric() || first == '_' => {
            !local.ends_with('.')
                && local
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        Some(_) => false,
    }
}

/// Resolves a possibly relative IRI reference against a base IRI.
pub fn resolve_iri(base: Option<&str>, reference: &str) -> Result<String, String> {
    match url::Url::parse(reference) {
        Ok(_) => return Ok(reference.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(error) => return Err(error.to_string()),
    }
    let Some(base) = base else {
        return Err(format!("relative IRI <{reference}> without a base"));
    };
    let base = url::Url::parse(base).map_err(|error| format!("invalid base <{base}>: {error}"))?;
    base.join(reference)
        .map(|joined| joined.to_string())
        .map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_with_longest_namespace() {
        let mut map = PrefixMap::new();
        map.insert("ex", "http://example.org/");
        map.insert("exs", "http://example.org/shapes/");
        assert_eq!(map.qualify("http://example.org/shapes/Person"), "exs:Person");
        assert_eq!(map.qualify("http://example.org/a"), "ex:a");
        assert_eq!(map.qualify("http://other.org/a"), "<http://other.org/a>");
        assert_eq!(map.qualify("http://example.org/a/b"), "<http://example.org/a/b>");
    }

    #[test]
    fn resolves_relative_references() {
        assert_eq!(
            resolve_iri(Some("internal://base/"), "a").as_deref(),
            Ok("internal://base/a")
        );
        assert_eq!(
            resolve_iri(None, "http://example.org/x").as_deref(),
            Ok("http://example.org/x")
        );
        assert!(resolve_iri(None, "a").is_err());
    }
}
