//! Segment naming configuration.
//!
//! A segment is always named. The name starts out as the default supplied by
//! the application, can be overridden through the environment, and, with
//! dynamic naming, is taken from the request's `Host` header when that host
//! matches a wildcard pattern.

use std::env;
use std::fmt;

use crate::error::ConfigurationError;

/// Overrides the default segment name when set to a non-empty value.
pub const TRACING_NAME_ENV: &str = "SEGMENT_TRACING_NAME";

/// Enables dynamic naming with the given host pattern.
pub const HOST_PATTERN_ENV: &str = "SEGMENT_TRACING_HOST_PATTERN";

/// A validated, non-blank segment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultName(String);

impl DefaultName {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigurationError);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<Option<&str>> for DefaultName {
    type Error = ConfigurationError;

    fn try_from(name: Option<&str>) -> Result<Self, Self::Error> {
        name.ok_or(ConfigurationError).and_then(Self::new)
    }
}

impl fmt::Display for DefaultName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How each segment gets its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentNaming {
    /// Every segment uses the default name.
    Fixed,
    /// Segments use the request host if it matches the pattern, and the
    /// default name otherwise.
    Dynamic { host_pattern: String },
}

/// Configuration for the open hook.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    default_name: DefaultName,
    naming: SegmentNaming,
}

impl SegmentConfig {
    /// Configures fixed naming with the given default name.
    pub fn new(default_name: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            default_name: DefaultName::new(default_name)?,
            naming: SegmentNaming::Fixed,
        })
    }

    /// Like [`SegmentConfig::new`], then applies [`TRACING_NAME_ENV`] and
    /// [`HOST_PATTERN_ENV`] if they are set.
    ///
    /// The supplied default name is still validated even when the
    /// environment overrides it.
    pub fn from_env(default_name: &str) -> Result<Self, ConfigurationError> {
        let mut config = Self::new(default_name)?;
        if let Some(name) = non_empty_var(TRACING_NAME_ENV) {
            config.default_name = DefaultName::new(name)?;
        }
        if let Some(host_pattern) = non_empty_var(HOST_PATTERN_ENV) {
            config.naming = SegmentNaming::Dynamic { host_pattern };
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_naming(mut self, naming: SegmentNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn default_name(&self) -> &DefaultName {
        &self.default_name
    }

    pub fn naming(&self) -> &SegmentNaming {
        &self.naming
    }

    /// Picks the name for a request arriving with the given `Host` header.
    pub fn resolve_name(&self, host: Option<&str>) -> String {
        match (&self.naming, host) {
            (SegmentNaming::Dynamic { host_pattern }, Some(host))
                if wildcard_match(host_pattern, host) =>
            {
                host.to_owned()
            }
            _ => self.default_name.0.clone(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Case-insensitive glob match, where `*` matches any run of characters and
/// `?` matches exactly one.
pub(crate) fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen, and the text index it was matched at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(&'*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_any_non_blank_name() {
        for name in ["my-service", "a", " padded ", "ünïcode"] {
            assert!(SegmentConfig::new(name).is_ok(), "{name:?} should be accepted");
        }
    }

    #[test]
    fn rejects_missing_or_blank_names() {
        assert_eq!(SegmentConfig::new("").unwrap_err(), ConfigurationError);
        assert_eq!(SegmentConfig::new("   ").unwrap_err(), ConfigurationError);
        assert_eq!(DefaultName::try_from(None::<&str>), Err(ConfigurationError));
        assert_eq!(
            DefaultName::try_from(Some("svc")).map(|name| name.to_string()),
            Ok("svc".to_owned())
        );
    }

    #[test]
    fn fixed_naming_ignores_the_host() {
        let config = SegmentConfig::new("my-service").unwrap();
        assert_eq!(config.resolve_name(Some("api.example.com")), "my-service");
        assert_eq!(config.resolve_name(None), "my-service");
    }

    #[test]
    fn dynamic_naming_uses_matching_hosts() {
        let config = SegmentConfig::new("my-service")
            .unwrap()
            .with_naming(SegmentNaming::Dynamic {
                host_pattern: "*.example.com".to_owned(),
            });
        assert_eq!(config.resolve_name(Some("api.example.com")), "api.example.com");
        assert_eq!(config.resolve_name(Some("example.org")), "my-service");
        assert_eq!(config.resolve_name(None), "my-service");
    }

    // The only test touching these variables; nothing else calls `from_env`.
    #[test]
    fn the_environment_overrides_the_default() {
        env::set_var(TRACING_NAME_ENV, "renamed");
        env::set_var(HOST_PATTERN_ENV, "*.internal");
        let config = SegmentConfig::from_env("my-service");
        let blank = SegmentConfig::from_env(" ");
        env::remove_var(TRACING_NAME_ENV);
        env::remove_var(HOST_PATTERN_ENV);

        let config = config.unwrap();
        assert_eq!(config.default_name().as_str(), "renamed");
        assert_eq!(
            config.naming(),
            &SegmentNaming::Dynamic {
                host_pattern: "*.internal".to_owned()
            }
        );
        assert_eq!(blank.unwrap_err(), ConfigurationError);
    }

    #[test]
    fn wildcards() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a?c", "abc"));
        assert!(!wildcard_match("a?c", "ac"));
        assert!(wildcard_match("*.Example.com", "api.example.COM"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("a*b*c", "axxbyy"));
        assert!(wildcard_match("a*a", "aaa"));
        assert!(!wildcard_match("abc", "abcd"));
    }
}
