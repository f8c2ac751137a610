//! Identity records reported by the resolution service.

use serde::{Deserialize, Serialize};

/// Originating address and metadata as observed by the resolution service.
///
/// The service speaks `{"ip", "country", "asOrganization", ...}`; extra fields
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "ip")]
    pub address: String,
    #[serde(rename = "country", default)]
    pub group: String,
    #[serde(rename = "asOrganization", default)]
    pub org: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityParseError {
    #[error("invalid identity JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("identity has an empty address")]
    EmptyAddress,
}

impl Identity {
    /// Parse a resolution-service response body.
    pub fn parse(body: &[u8]) -> Result<Self, IdentityParseError> {
        let identity: Identity = serde_json::from_slice(body)?;
        if identity.address.trim().is_empty() {
            return Err(IdentityParseError::EmptyAddress);
        }
        Ok(identity)
    }
}

/// The caller's own identity, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineIdentity(Identity);

impl BaselineIdentity {
    pub fn new(identity: Identity) -> Self {
        Self(identity)
    }

    pub fn address(&self) -> &str {
        &self.0.address
    }

    /// Whether `observed` is still the caller's own address.
    pub fn is_exposed_by(&self, observed: &Identity) -> bool {
        observed.address == self.0.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_service_fields() {
        let body = json!({
            "ip": "2.2.2.2",
            "proxyip": false,
            "country": "US",
            "asOrganization": "OrgA",
            "colo": "SJC"
        });
        let identity = Identity::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(identity.address, "2.2.2.2");
        assert_eq!(identity.group, "US");
        assert_eq!(identity.org, "OrgA");
    }

    #[test]
    fn test_missing_metadata_defaults_empty() {
        let identity = Identity::parse(br#"{"ip":"9.9.9.9"}"#).unwrap();
        assert_eq!(identity.group, "");
        assert_eq!(identity.org, "");
    }

    #[test]
    fn test_missing_or_empty_ip_rejected() {
        assert!(matches!(
            Identity::parse(br#"{"country":"US"}"#),
            Err(IdentityParseError::Json(_))
        ));
        assert!(matches!(
            Identity::parse(br#"{"ip":"  "}"#),
            Err(IdentityParseError::EmptyAddress)
        ));
        assert!(Identity::parse(b"<html>blocked</html>").is_err());
    }

    #[test]
    fn test_baseline_exposure() {
        let baseline = BaselineIdentity::new(Identity::parse(br#"{"ip":"1.1.1.1"}"#).unwrap());
        let same = Identity::parse(br#"{"ip":"1.1.1.1","country":"DE"}"#).unwrap();
        let other = Identity::parse(br#"{"ip":"2.2.2.2"}"#).unwrap();
        assert!(baseline.is_exposed_by(&same));
        assert!(!baseline.is_exposed_by(&other));
    }
}
