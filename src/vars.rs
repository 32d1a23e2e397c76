//! @ai:module:intent Decode submission metadata and resolve its campaign
//! @ai:module:layer domain
//! @ai:module:public_api Vars, resolve_campaign
//! @ai:module:stateless true

use crate::config::CampaignSet;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::form_urlencoded;

/// @ai:intent Decoded `vars` member: field name to ordered values
///
/// Fields may repeat; order of values within a field is preserved.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    fields: BTreeMap<String, Vec<String>>,
}

impl Vars {
    /// @ai:intent Decode a URL-encoded query-string blob
    /// @ai:effects pure
    pub fn parse(raw: &[u8]) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, value) in form_urlencoded::parse(raw) {
            fields
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }

        Self { fields }
    }

    /// @ai:intent First value of a field, if present
    /// @ai:effects pure
    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// @ai:intent All values of a field in submission order
    /// @ai:effects pure
    pub fn all(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// @ai:intent Determine which campaign a submission belongs to
///
/// Policy, in order: an explicit `config` field wins; otherwise the
/// submitter's `path` field is matched against campaign names in ascending
/// lexicographic order and the first name occurring as a substring wins.
/// Anything else is a ConfigResolution error. The fixed match order replaces
/// an order-dependent lookup that could classify the same ambiguous
/// submission differently between runs.
/// @ai:effects pure
pub fn resolve_campaign(vars: &Vars, campaigns: &CampaignSet, archive_key: &str) -> Result<String> {
    if let Some(name) = vars.first("config") {
        return Ok(name.to_string());
    }

    if let Some(remote_path) = vars.first("path") {
        tracing::debug!("inferring campaign from submitter path {remote_path}");

        for name in campaigns.names() {
            if remote_path.contains(name) {
                return Ok(name.to_string());
            }
        }

        return Err(Error::ConfigResolution {
            path: PathBuf::from(archive_key),
            reason: format!("no campaign name occurs in submitter path {remote_path:?}"),
        });
    }

    Err(Error::ConfigResolution {
        path: PathBuf::from(archive_key),
        reason: "vars has neither config nor path".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Campaign, CampaignFile, Tools};
    use pretty_assertions::assert_eq;

    fn campaigns(names: &[&str]) -> CampaignSet {
        let campaigns = names
            .iter()
            .map(|name| Campaign {
                name: name.to_string(),
                dataset: PathBuf::from("data.pb"),
                districts: 9,
                evaluator_args: vec![],
                renderer_args: vec![],
            })
            .collect();
        CampaignSet::from_file(CampaignFile {
            tools: Tools::default(),
            campaigns,
        })
        .unwrap()
    }

    #[test]
    fn test_parse_repeating_fields() {
        let vars = Vars::parse(b"a=1&b=2&a=3");
        assert_eq!(vars.all("a"), &["1".to_string(), "3".to_string()]);
        assert_eq!(vars.first("b"), Some("2"));
        assert_eq!(vars.first("missing"), None);
    }

    #[test]
    fn test_parse_percent_decoding() {
        let vars = Vars::parse(b"path=%2Frundir%2FMA_Congress%2Flink1");
        assert_eq!(vars.first("path"), Some("/rundir/MA_Congress/link1"));
    }

    #[test]
    fn test_explicit_config_wins() {
        let set = campaigns(&["CA_Congress", "MA_Congress"]);
        let vars = Vars::parse(b"config=MA_Congress&path=/rundir/CA_Congress/x");
        let resolved = resolve_campaign(&vars, &set, "/a.tar.gz").unwrap();
        assert_eq!(resolved, "MA_Congress");
    }

    #[test]
    fn test_path_substring_inference() {
        let set = campaigns(&["CA_Congress", "MA_Congress"]);
        let vars = Vars::parse(b"path=/rundir/MA_Congress/link1/bestKmpp.dsz");
        let resolved = resolve_campaign(&vars, &set, "/a.tar.gz").unwrap();
        assert_eq!(resolved, "MA_Congress");
    }

    #[test]
    fn test_ambiguous_path_picks_first_name_ascending() {
        // both names occur; the lexicographically smaller one must win
        let set = campaigns(&["MA_Congress", "CA_Congress"]);
        let vars = Vars::parse(b"path=/x/MA_Congress/CA_Congress/y");
        let resolved = resolve_campaign(&vars, &set, "/a.tar.gz").unwrap();
        assert_eq!(resolved, "CA_Congress");
    }

    #[test]
    fn test_unresolvable_is_config_resolution_error() {
        let set = campaigns(&["CA_Congress"]);

        let no_fields = Vars::parse(b"other=1");
        assert!(matches!(
            resolve_campaign(&no_fields, &set, "/a.tar.gz"),
            Err(Error::ConfigResolution { .. })
        ));

        let no_match = Vars::parse(b"path=/rundir/TX_Congress/x");
        assert!(matches!(
            resolve_campaign(&no_match, &set, "/a.tar.gz"),
            Err(Error::ConfigResolution { .. })
        ));
    }

    #[test]
    fn test_empty_campaign_set_cannot_resolve_path() {
        let set = campaigns(&[]);
        let vars = Vars::parse(b"path=/rundir/CA_Congress/x");
        assert!(matches!(
            resolve_campaign(&vars, &set, "/a.tar.gz"),
            Err(Error::ConfigResolution { .. })
        ));
    }
}
