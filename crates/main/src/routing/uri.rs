use crate::errors::MainError;

/// Parsed `scheme:path` endpoint address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointUri {
    scheme: String,
    path: String,
}

impl EndpointUri {
    /// Parse an endpoint address. `direct://start` and `direct:start` are the same endpoint.
    pub fn parse(uri: &str) -> Result<Self, MainError> {
        let (scheme, rest) = uri
            .trim()
            .split_once(':')
            .ok_or_else(|| MainError::route_install(uri, "endpoint URI must look like 'scheme:name'"))?;

        let path = rest.trim_start_matches("//");
        if scheme.is_empty() || path.is_empty() {
            return Err(MainError::route_install(
                uri,
                "endpoint URI must look like 'scheme:name'",
            ));
        }
        if path.contains('?') {
            return Err(MainError::route_install(
                uri,
                "endpoint options are not supported; configure the component instead",
            ));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            path: path.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Display for EndpointUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_slashes() {
        let plain = EndpointUri::parse("direct:start").unwrap();
        let slashed = EndpointUri::parse("direct://start").unwrap();

        assert_eq!(plain, slashed);
        assert_eq!(plain.scheme(), "direct");
        assert_eq!(plain.path(), "start");
        assert_eq!(slashed.to_string(), "direct:start");
    }

    #[test]
    fn test_parse_rejects_bad_uris() {
        for uri in ["start", ":start", "seda:", "seda:orders?size=5"] {
            let err = EndpointUri::parse(uri).unwrap_err();
            assert!(err.is_route_install(), "{} should be rejected", uri);
        }
    }
}
