//! @ai:module:intent Typed campaign configuration loaded from TOML
//! @ai:module:layer infrastructure
//! @ai:module:public_api Campaign, CampaignSet, Tools, CampaignFile
//! @ai:module:stateless true

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// @ai:intent One optimization target: a dataset plus tool argument sets
///
/// Every field the evaluator and renderer need is a named field here,
/// validated once at load time, never looked up by ad hoc key at use time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub name: String,
    pub dataset: PathBuf,
    pub districts: u32,
    #[serde(default)]
    pub evaluator_args: Vec<String>,
    #[serde(default)]
    pub renderer_args: Vec<String>,
}

/// @ai:intent External tool locations for the scoring and publish pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tools {
    #[serde(default)]
    pub bindir: Option<PathBuf>,
    #[serde(default = "default_evaluator")]
    pub evaluator: String,
    #[serde(default = "default_renderer")]
    pub renderer: String,
    #[serde(default = "default_resizer")]
    pub resizer: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            bindir: None,
            evaluator: default_evaluator(),
            renderer: default_renderer(),
            resizer: default_resizer(),
        }
    }
}

impl Tools {
    /// @ai:intent Resolve a tool name against the optional bindir
    /// @ai:effects pure
    pub fn command(&self, tool: &str) -> PathBuf {
        match &self.bindir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    pub fn evaluator_command(&self) -> PathBuf {
        self.command(&self.evaluator)
    }

    pub fn renderer_command(&self) -> PathBuf {
        self.command(&self.renderer)
    }

    pub fn resizer_command(&self) -> PathBuf {
        self.command(&self.resizer)
    }
}

fn default_evaluator() -> String {
    "analyze".to_string()
}

fn default_renderer() -> String {
    "drend".to_string()
}

fn default_resizer() -> String {
    "convert".to_string()
}

/// @ai:intent On-disk TOML layout of the campaign file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignFile {
    #[serde(default)]
    pub tools: Tools,
    #[serde(default, rename = "campaign")]
    pub campaigns: Vec<Campaign>,
}

impl CampaignFile {
    /// @ai:intent Save a campaign file skeleton to TOML
    /// @ai:effects fs:write
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::CampaignFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// @ai:intent Validated, immutable set of campaigns keyed by name
///
/// Name order is ascending lexicographic everywhere the set is iterated,
/// which makes substring-based configuration inference deterministic.
#[derive(Debug, Clone)]
pub struct CampaignSet {
    tools: Tools,
    by_name: BTreeMap<String, Campaign>,
}

impl CampaignSet {
    /// @ai:intent Load and validate a campaign file
    /// @ai:pre path points to a TOML file in the CampaignFile layout
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::CampaignFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let file: CampaignFile = toml::from_str(&content)?;
        Self::from_file(file).map_err(|e| match e {
            Error::CampaignFile { message, .. } => Error::CampaignFile {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// @ai:intent Build a set from an already-parsed campaign file
    /// @ai:effects pure
    pub fn from_file(file: CampaignFile) -> Result<Self> {
        let mut by_name = BTreeMap::new();

        for campaign in file.campaigns {
            validate_campaign(&campaign)?;

            let name = campaign.name.clone();
            if by_name.insert(name.clone(), campaign).is_some() {
                return Err(campaign_file_error(format!(
                    "duplicate campaign name: {name}"
                )));
            }
        }

        Ok(Self {
            tools: file.tools,
            by_name,
        })
    }

    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    /// @ai:intent Look up a campaign by name
    /// @ai:effects pure
    pub fn get(&self, name: &str) -> Option<&Campaign> {
        self.by_name.get(name)
    }

    /// @ai:intent Campaign names in ascending lexicographic order
    /// @ai:effects pure
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// @ai:intent Campaigns in name order
    /// @ai:effects pure
    pub fn iter(&self) -> impl Iterator<Item = &Campaign> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn campaign_file_error(message: String) -> Error {
    Error::CampaignFile {
        path: PathBuf::new(),
        message,
    }
}

/// @ai:intent Reject campaigns that would fail at tool-invocation time
/// @ai:effects pure
fn validate_campaign(campaign: &Campaign) -> Result<()> {
    if campaign.name.is_empty() {
        return Err(campaign_file_error(
            "campaign name must not be empty".to_string(),
        ));
    }

    if campaign.name.contains(['/', '\\']) || campaign.name.chars().any(char::is_whitespace) {
        return Err(campaign_file_error(format!(
            "campaign name {:?} must not contain separators or whitespace",
            campaign.name
        )));
    }

    if campaign.dataset.as_os_str().is_empty() {
        return Err(campaign_file_error(format!(
            "campaign {}: dataset path is empty",
            campaign.name
        )));
    }

    if campaign.districts == 0 {
        return Err(campaign_file_error(format!(
            "campaign {}: district count must be at least 1",
            campaign.name
        )));
    }

    Ok(())
}
