//! Discovery arguments.
//!
//! The host framework hands every provider the same flat `key=value` set. This
//! module owns the defaulting rules for the keys the Swarm provider reads, so
//! the pipelines never interpret raw strings themselves.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use crate::error::{Error, Result};

/// Namespace used when the `namespace` argument is unset.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Network name used when the `network` argument is unset.
pub const DEFAULT_NETWORK: &str = "default";

/// Immutable argument set for one resolution call.
///
/// Unset keys read as the empty string, matching the framework's
/// `map[string]string` semantics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Args(HashMap<String, String>);

impl Args {
    /// Returns the raw value for `key`, or `""` when unset.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map_or("", String::as_str)
    }

    /// The `provider` argument.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.get("provider")
    }

    /// The `type` argument.
    #[must_use]
    pub fn discovery_type(&self) -> &str {
        self.get("type")
    }

    /// The `host` argument. Empty means "let the client pick".
    #[must_use]
    pub fn host(&self) -> &str {
        self.get("host")
    }

    /// Server-side node role filter; `None` for unset or `all`.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        match self.get("role") {
            "" | "all" => None,
            role => Some(role),
        }
    }

    /// The `namespace` argument, defaulting to [`DEFAULT_NAMESPACE`].
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self.get("namespace") {
            "" => DEFAULT_NAMESPACE,
            namespace => namespace,
        }
    }

    /// Fully-qualified service name, `{namespace}_{service}`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingServiceName`] when `service` is empty.
    pub fn qualified_service(&self) -> Result<String> {
        match self.get("service") {
            "" => Err(Error::MissingServiceName),
            service => Ok(format!("{}_{service}", self.namespace())),
        }
    }

    /// Fully-qualified network selector, `{namespace}_{network}`.
    #[must_use]
    pub fn network_selector(&self) -> String {
        let network = match self.get("network") {
            "" => DEFAULT_NETWORK,
            network => network,
        };

        format!("{}_{network}", self.namespace())
    }

    /// Whether host addresses should be used instead of overlay addresses.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] unless the value is empty, `true` or `false`.
    pub fn host_network(&self) -> Result<bool> {
        match self.get("host_network") {
            "" => Ok(false),
            value => value.parse().map_err(|_| Error::InvalidArgument {
                key: "host_network".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl From<HashMap<String, String>> for Args {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Args
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parses the framework's config string: `provider=dockerswarm service="my app"`.
///
/// Pairs are separated by whitespace. Values may be double-quoted to contain
/// whitespace; inside quotes `\"` and `\\` are unescaped.
impl FromStr for Args {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut map = HashMap::new();
        let mut chars = s.chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }

            let key = take_bare(&mut chars, true);
            if key.is_empty() || chars.next_if_eq(&'=').is_none() {
                let rest = take_bare(&mut chars, false);
                return Err(Error::InvalidArgument { key, value: rest });
            }

            let value = if chars.next_if_eq(&'"').is_some() {
                take_quoted(&mut chars, &key)?
            } else {
                take_bare(&mut chars, false)
            };

            map.insert(key, value);
        }

        Ok(Self(map))
    }
}

/// Consumes characters up to whitespace (and `=` when reading a key).
fn take_bare(chars: &mut Peekable<Chars<'_>>, key: bool) -> String {
    let mut out = String::new();
    while let Some(c) = chars.next_if(|c| !c.is_whitespace() && !(key && *c == '=')) {
        out.push(c);
    }
    out
}

/// Consumes a quoted value; the opening quote has already been read.
fn take_quoted(chars: &mut Peekable<Chars<'_>>, key: &str) -> Result<String> {
    let mut out = String::new();

    loop {
        match chars.next() {
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some(c @ ('"' | '\\')) => out.push(c),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => break,
            },
            Some(c) => out.push(c),
            None => break,
        }
    }

    Err(Error::InvalidArgument {
        key: key.to_string(),
        value: format!("\"{out}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> Args {
        pairs.iter().copied().collect()
    }

    #[test]
    fn unset_keys_read_as_empty() {
        let args = Args::default();

        assert_eq!(args.get("provider"), "");
        assert_eq!(args.discovery_type(), "");
        assert_eq!(args.host(), "");
    }

    #[test]
    fn namespace_defaults() {
        let empty = args(&[("namespace", "")]);
        let set = args(&[("namespace", "ns")]);

        assert_eq!(Args::default().namespace(), "default");
        assert_eq!(empty.namespace(), "default");
        assert_eq!(set.namespace(), "ns");
    }

    #[test]
    fn qualified_service_uses_namespace() {
        let namespaced = args(&[("namespace", "ns"), ("service", "web")]);
        assert_eq!(namespaced.qualified_service().unwrap(), "ns_web");

        let defaulted = args(&[("service", "web")]);
        assert_eq!(defaulted.qualified_service().unwrap(), "default_web");
    }

    #[test]
    fn qualified_service_requires_service() {
        for args in [
            Args::default(),
            args(&[("namespace", "ns"), ("network", "api")]),
            args(&[("service", "")]),
        ] {
            let err = args.qualified_service().unwrap_err();
            assert!(matches!(err, Error::MissingServiceName));
        }
    }

    #[test]
    fn network_selector_defaults() {
        let network = args(&[("network", "api")]);
        let namespace = args(&[("namespace", "ns")]);
        let both = args(&[("namespace", "ns"), ("network", "api")]);

        assert_eq!(Args::default().network_selector(), "default_default");
        assert_eq!(network.network_selector(), "default_api");
        assert_eq!(namespace.network_selector(), "ns_default");
        assert_eq!(both.network_selector(), "ns_api");
    }

    #[test]
    fn role_all_means_no_filter() {
        assert_eq!(Args::default().role(), None);
        assert_eq!(args(&[("role", "all")]).role(), None);
        assert_eq!(args(&[("role", "manager")]).role(), Some("manager"));
        assert_eq!(args(&[("role", "worker")]).role(), Some("worker"));
    }

    #[test]
    fn host_network_parsing() {
        let on = args(&[("host_network", "true")]);
        let off = args(&[("host_network", "false")]);

        assert!(!Args::default().host_network().unwrap());
        assert!(on.host_network().unwrap());
        assert!(!off.host_network().unwrap());
    }

    #[test]
    fn host_network_rejects_other_values() {
        let err = args(&[("host_network", "yes")]).host_network().unwrap_err();

        let Error::InvalidArgument { key, value } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(key, "host_network");
        assert_eq!(value, "yes");
    }

    #[test]
    fn parse_config_string() {
        let line = "provider=dockerswarm  type=service\tservice=web network=api";
        let args: Args = line.parse().unwrap();

        assert_eq!(args.provider(), "dockerswarm");
        assert_eq!(args.discovery_type(), "service");
        assert_eq!(args.get("service"), "web");
        assert_eq!(args.network_selector(), "default_api");
    }

    #[test]
    fn parse_quoted_values() {
        let line = r#"host="unix:///run/my docker.sock" label="a \"b\" \\c" empty="""#;
        let args: Args = line.parse().unwrap();

        assert_eq!(args.host(), "unix:///run/my docker.sock");
        assert_eq!(args.get("label"), r#"a "b" \c"#);
        assert_eq!(args.get("empty"), "");
    }

    #[test]
    fn parse_empty_string() {
        let args: Args = "   ".parse().unwrap();
        assert_eq!(args, Args::default());
    }

    #[test]
    fn parse_allows_empty_unquoted_value() {
        let args: Args = "namespace= service=web".parse().unwrap();
        assert_eq!(args.namespace(), "default");
        assert_eq!(args.qualified_service().unwrap(), "default_web");
    }

    #[test]
    fn parse_rejects_token_without_equals() {
        let err = "provider=dockerswarm oops".parse::<Args>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { key, .. } if key == "oops"));
    }

    #[test]
    fn parse_rejects_empty_key() {
        let err = "=value".parse::<Args>().unwrap_err();

        let Error::InvalidArgument { key, value } = err else {
            panic!("unexpected error: {err}");
        };
        assert!(key.is_empty());
        assert_eq!(value, "=value");
    }

    #[test]
    fn parse_rejects_unterminated_quote() {
        let err = r#"service="web"#.parse::<Args>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { key, .. } if key == "service"));
    }
}
