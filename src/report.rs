//! @ai:module:intent Operator-facing summary reports and client config hints
//! @ai:module:layer infrastructure
//! @ai:module:public_api ReportWriter
//! @ai:module:stateless true

use crate::best::BestResult;
use crate::config::CampaignSet;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// @ai:intent Writes the summary report and the client config-override file
pub struct ReportWriter;

impl ReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Write the per-campaign HTML summary table
    /// @ai:effects fs:write
    pub fn write_html(&self, best: &BTreeMap<String, BestResult>, path: &Path) -> Result<()> {
        let generated = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let mut out = String::new();
        let _ = write!(
            out,
            "<!doctype html>\n\
             <html><head><title>solution report</title>\
             <link rel=\"stylesheet\" href=\"report.css\" /></head><body>\
             <h1>solution report</h1>\
             <p class=\"gentime\">Generated {generated}</p>\n\
             <table><tr><th>config name</th><th>num<br>solutions<br>reported</th>\
             <th>best kmpp</th><th>spread</th><th>id</th><th>path</th></tr>\n"
        );

        for (name, result) in best {
            let _ = write!(
                out,
                "<tr><td>{name}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                result.count,
                result.solution.kmpp,
                result.solution.spread,
                result.solution.id,
                result.solution.path,
            );
        }

        out.push_str("</table>\n</body></html>\n");
        std::fs::write(path, out)?;
        tracing::info!("report written to {}", path.display());
        Ok(())
    }

    /// @ai:intent Write the same summary as machine-readable JSON
    /// @ai:effects fs:write
    pub fn write_json(&self, best: &BTreeMap<String, BestResult>, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(best)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// @ai:intent Write per-campaign send hints for remote submitters
    ///
    /// Campaigns with no recorded submissions accept anything; the rest are
    /// throttled. A sibling `<path>_manual` file, when present, is appended
    /// verbatim so operators can pin overrides across regenerations.
    /// @ai:effects fs:read, fs:write
    pub fn write_config_override(
        &self,
        campaigns: &CampaignSet,
        best: &BTreeMap<String, BestResult>,
        path: &Path,
    ) -> Result<()> {
        let mut out = String::new();

        for name in campaigns.names() {
            if best.contains_key(name) {
                let _ = writeln!(out, "{name}:sendAnything: False");
            } else {
                let _ = writeln!(out, "{name}:sendAnything");
            }
        }

        let manual = path.with_file_name(format!(
            "{}_manual",
            path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        ));
        if manual.exists() {
            out.push_str(&std::fs::read_to_string(&manual)?);
        }

        std::fs::write(path, out)?;
        Ok(())
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best::BestSolution;
    use crate::config::{Campaign, CampaignFile, CampaignSet, Tools};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn best_map() -> BTreeMap<String, BestResult> {
        let mut map = BTreeMap::new();
        map.insert(
            "CA_Congress".to_string(),
            BestResult {
                count: 4,
                solution: BestSolution {
                    id: 7,
                    kmpp: 12.345,
                    spread: 200,
                    path: "/2024/sub1.tar.gz".to_string(),
                },
            },
        );
        map
    }

    fn campaigns(names: &[&str]) -> CampaignSet {
        CampaignSet::from_file(CampaignFile {
            tools: Tools::default(),
            campaigns: names
                .iter()
                .map(|name| Campaign {
                    name: name.to_string(),
                    dataset: PathBuf::from("data.pb"),
                    districts: 9,
                    evaluator_args: vec![],
                    renderer_args: vec![],
                })
                .collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_html_report_has_one_row_per_campaign() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.html");
        ReportWriter::new().write_html(&best_map(), &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("<td>CA_Congress</td>"));
        assert!(html.contains("<td>12.345</td>"));
        assert!(html.contains("/2024/sub1.tar.gz"));
    }

    #[test]
    fn test_json_report_is_parseable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("results.json");
        ReportWriter::new().write_json(&best_map(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["CA_Congress"]["count"], 4);
        assert_eq!(value["CA_Congress"]["spread"], 200);
    }

    #[test]
    fn test_config_override_distinguishes_empty_campaigns() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("override");
        let set = campaigns(&["CA_Congress", "MA_House"]);

        ReportWriter::new()
            .write_config_override(&set, &best_map(), &path)
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("CA_Congress:sendAnything: False"));
        assert!(text.contains("MA_House:sendAnything\n"));
    }

    #[test]
    fn test_config_override_appends_manual_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("override");
        std::fs::write(temp.path().join("override_manual"), "XX_Pinned:disabled\n").unwrap();

        ReportWriter::new()
            .write_config_override(&campaigns(&["CA_Congress"]), &best_map(), &path)
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("XX_Pinned:disabled\n"));
    }
}
