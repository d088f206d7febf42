//! Configuration environment of the host process.

use std::collections::BTreeMap;

use devtools_config::PropertySource;
use serde::Serialize;

/// Replacement shown for sensitive property values.
pub const MASK: &str = "******";

const SENSITIVE_MARKERS: [&str; 3] = ["password", "secret", "key"];

/// Returns `true` when a property's value must not be shown.
#[must_use]
pub fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

/// One named, enumerable set of properties.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PropertyMap {
    name: String,
    values: BTreeMap<String, String>,
}

impl PropertyMap {
    /// Creates an empty source.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the keys defined by this source.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            name: String::from("properties"),
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Active profiles plus ordered property sources; earlier sources win.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    active_profiles: Vec<String>,
    sources: Vec<PropertyMap>,
}

impl Environment {
    /// Creates an environment without profiles or sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates a profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.active_profiles.push(profile.into());
        self
    }

    /// Appends a source with lower precedence than those already added.
    #[must_use]
    pub fn with_source(mut self, source: PropertyMap) -> Self {
        self.sources.push(source);
        self
    }

    /// Returns the active profiles in activation order.
    #[must_use]
    pub fn active_profiles(&self) -> &[String] {
        &self.active_profiles
    }

    /// Returns the sources in precedence order.
    #[must_use]
    pub fn sources(&self) -> &[PropertyMap] {
        &self.sources
    }

    /// Resolves a property; the first source defining it wins.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.sources.iter().find_map(|source| source.get(key))
    }

    /// Returns every resolved property whose key starts with `prefix`, with
    /// sensitive values masked.
    #[must_use]
    pub fn properties(&self, prefix: Option<&str>) -> BTreeMap<String, String> {
        self.sources
            .iter()
            .flat_map(PropertyMap::keys)
            .filter(|key| prefix.is_none_or(|prefix| key.starts_with(prefix)))
            .filter_map(|key| {
                let value = self.get(key)?;
                let shown = if is_sensitive(key) { MASK } else { value };
                Some((key.to_owned(), shown.to_owned()))
            })
            .collect()
    }
}

impl PropertySource for Environment {
    fn name(&self) -> &str {
        "host environment"
    }

    fn property(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment() -> Environment {
        Environment::new()
            .with_profile("dev")
            .with_source(
                PropertyMap::new("overrides")
                    .with("server.port", "8081")
                    .with("db.password", "hunter2"),
            )
            .with_source(
                PropertyMap::new("defaults")
                    .with("server.port", "8080")
                    .with("server.name", "demo")
                    .with("api.KEY", "abc"),
            )
    }

    #[test]
    fn earlier_sources_win() {
        let env = environment();
        assert_eq!(env.get("server.port"), Some("8081"));
        assert_eq!(env.property("server.name").as_deref(), Some("demo"));
        assert_eq!(env.active_profiles(), ["dev"]);
    }

    #[test]
    fn properties_are_filtered_and_masked() {
        let env = environment();
        let all = env.properties(None);
        assert_eq!(all.len(), 4);
        assert_eq!(all["db.password"], MASK);
        assert_eq!(all["api.KEY"], MASK);
        assert_eq!(all["server.port"], "8081");

        let server = env.properties(Some("server."));
        assert_eq!(server.keys().collect::<Vec<_>>(), ["server.name", "server.port"]);
    }

    #[test]
    fn sensitivity_is_case_insensitive() {
        assert!(is_sensitive("Spring.Datasource.PASSWORD"));
        assert!(is_sensitive("client-secret"));
        assert!(is_sensitive("monkey.count"));
        assert!(!is_sensitive("server.port"));
    }
}
