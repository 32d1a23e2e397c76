//! @ai:module:intent Derive display artifacts for best results and swap them live
//! @ai:module:layer application
//! @ai:module:public_api Publisher, StatSummary, parse_statsum
//! @ai:module:stateless false

use crate::archive::extract_members;
use crate::best::BestResult;
use crate::config::CampaignSet;
use crate::error::{Error, Result};
use rand::Rng;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const MAP_NAME: &str = "map.png";
const MAP_SMALL_NAME: &str = "map500.png";
const PAGE_NAME: &str = "index.html";
const RESIZE_BOUND: &str = "500x500";

/// @ai:intent Display metrics parsed from an archive's statsum member
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatSummary {
    pub kmpp: f64,
    pub spread: i64,
    pub std_dev: f64,
}

/// @ai:intent Parse the fixed-format statsum text
///
/// Searches rather than matches: unrelated numbers may surround the
/// expected tokens.
/// @ai:effects pure
pub fn parse_statsum(text: &str) -> Option<StatSummary> {
    let kmpp_re = Regex::new(crate::scorer::KMPP_PATTERN).expect("static pattern");
    let max_min_re = Regex::new(crate::scorer::MAX_MIN_PATTERN).expect("static pattern");
    let std_re = Regex::new(r"std=([0-9.]+)").expect("static pattern");

    let kmpp: f64 = kmpp_re.captures(text)?[1].parse().ok()?;
    let caps = max_min_re.captures(text)?;
    let max: i64 = caps[1].parse().ok()?;
    let min: i64 = caps[2].parse().ok()?;
    let std_dev: f64 = std_re.captures(text)?[1].parse().ok()?;

    Some(StatSummary {
        kmpp,
        spread: max - min,
        std_dev,
    })
}

/// @ai:intent Atomically replace dest with a link to src
///
/// Materializes the replacement under a randomized temporary name in the
/// destination's directory, then renames it over the destination. A reader
/// always sees either the old artifact or the new one, never a missing or
/// partially-written file. Two racing replacements leave whichever renamed
/// last, each candidate being complete.
/// @ai:effects fs:write
pub(crate) fn atomic_link(src: &Path, dest: &Path) -> std::io::Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    let tmp = dir.join(format!(".{name}.{suffix}"));

    std::fs::hard_link(src, &tmp)?;
    if let Err(e) = std::fs::rename(&tmp, dest) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// @ai:intent Publishes per-campaign best-so-far artifact directories
///
/// Layout: `<outdir>/<campaign>/<id>/{map.png,map500.png,index.html}` with
/// "current" aliases at `<outdir>/<campaign>/` swapped via atomic_link.
pub struct Publisher<'a> {
    campaigns: &'a CampaignSet,
    soldir: PathBuf,
    outdir: PathBuf,
    root_url: String,
}

impl<'a> Publisher<'a> {
    pub fn new(campaigns: &'a CampaignSet, soldir: &Path, outdir: &Path, root_url: &str) -> Self {
        Self {
            campaigns,
            soldir: soldir.to_path_buf(),
            outdir: outdir.to_path_buf(),
            root_url: root_url.trim_end_matches('/').to_string(),
        }
    }

    /// @ai:intent Publish every campaign's best result, then the index
    ///
    /// A failure publishing one campaign is logged and deferred to the next
    /// invocation; the others proceed unaffected.
    /// @ai:effects fs:write, io
    pub fn publish_all(&self, best: &BTreeMap<String, BestResult>) -> Result<()> {
        std::fs::create_dir_all(&self.outdir)?;

        for (name, result) in best {
            if let Err(e) = self.publish_one(name, result, best) {
                tracing::warn!("publication deferred for {name}: {e}");
            }
        }

        self.write_top_index(best)
    }

    /// @ai:intent Materialize and swap artifacts for one campaign's best
    /// @ai:effects fs:write, io
    fn publish_one(
        &self,
        name: &str,
        result: &BestResult,
        all: &BTreeMap<String, BestResult>,
    ) -> Result<()> {
        let publish_error = |message: String| Error::Publish {
            campaign: name.to_string(),
            message,
        };

        let current_dir = self.outdir.join(name);
        let result_dir = current_dir.join(result.solution.id.to_string());
        std::fs::create_dir_all(&result_dir)?;

        let page_path = result_dir.join(PAGE_NAME);
        if page_path.exists() {
            // artifacts for this (campaign, id) are complete; re-running is free
            tracing::debug!("{name}/{} already published", result.solution.id);
            return Ok(());
        }

        let campaign = self
            .campaigns
            .get(name)
            .ok_or_else(|| publish_error("campaign no longer loaded".to_string()))?;

        let archive_path = self
            .soldir
            .join(result.solution.path.trim_start_matches('/'));
        let mut members = extract_members(&archive_path, &["solution", "statsum"])?;
        let solution = members
            .remove("solution")
            .ok_or_else(|| publish_error("archive has no solution member".to_string()))?;
        let statsum_raw = members
            .remove("statsum")
            .ok_or_else(|| publish_error("archive has no statsum member".to_string()))?;

        let map_path = result_dir.join(MAP_NAME);
        if !map_path.exists() {
            self.render_map(campaign, &solution, &map_path)
                .map_err(|e| publish_error(format!("renderer: {e}")))?;
        }

        let map_small_path = result_dir.join(MAP_SMALL_NAME);
        if !map_small_path.exists() {
            self.resize_map(&map_path, &map_small_path)
                .map_err(|e| publish_error(format!("resizer: {e}")))?;
        }

        let statsum = parse_statsum(&String::from_utf8_lossy(&statsum_raw))
            .ok_or_else(|| publish_error("unparseable statsum member".to_string()))?;

        // the page is written last: its presence marks the directory complete
        let nav = nav_fragment(Some(name), all, &self.root_url);
        let page = self.result_page(name, result, &statsum, &nav);
        std::fs::write(&page_path, page)?;

        for artifact in [MAP_NAME, MAP_SMALL_NAME, PAGE_NAME] {
            atomic_link(&result_dir.join(artifact), &current_dir.join(artifact))
                .map_err(|e| publish_error(format!("swapping {artifact}: {e}")))?;
        }

        tracing::info!("published {name}/{}", result.solution.id);
        Ok(())
    }

    /// @ai:intent Run the renderer process for one solution
    /// @ai:effects io
    fn render_map(
        &self,
        campaign: &crate::config::Campaign,
        solution: &[u8],
        png_path: &Path,
    ) -> std::io::Result<()> {
        let program = self.campaigns.tools().renderer_command();
        let mut args = campaign.renderer_args.clone();
        args.push("--loadSolution".to_string());
        args.push("-".to_string());
        args.push("--pngout".to_string());
        args.push(png_path.display().to_string());
        tracing::debug!("run {} {}", program.display(), args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(solution)?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    /// @ai:intent Produce the bounded-size derivative image
    /// @ai:effects io
    fn resize_map(&self, src: &Path, dest: &Path) -> std::io::Result<()> {
        let program = self.campaigns.tools().resizer_command();
        let output = Command::new(&program)
            .arg(src)
            .arg("-resize")
            .arg(RESIZE_BOUND)
            .arg(dest)
            .output()?;

        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    /// @ai:intent Build the result page for one campaign's best solution
    /// @ai:effects pure
    fn result_page(
        &self,
        name: &str,
        result: &BestResult,
        statsum: &StatSummary,
        nav: &str,
    ) -> String {
        let permalink = format!("{}/{}/{}/", self.root_url, name, result.solution.id);
        format!(
            "<!doctype html>\n\
             <html><head><title>{name} best solution</title>\n\
             <link rel=\"stylesheet\" href=\"{}/report.css\" /></head><body>\n\
             {nav}\n\
             <h1>{name}</h1>\n\
             <p><a href=\"{MAP_NAME}\"><img src=\"{MAP_SMALL_NAME}\" alt=\"{name} map\" /></a></p>\n\
             <table>\n\
             <tr><th>Km/person</th><td>{}</td></tr>\n\
             <tr><th>spread</th><td>{}</td></tr>\n\
             <tr><th>std</th><td>{}</td></tr>\n\
             <tr><th>solutions reported</th><td>{}</td></tr>\n\
             </table>\n\
             <p><a href=\"{permalink}\">permalink</a></p>\n\
             </body></html>\n",
            self.root_url, statsum.kmpp, statsum.spread, statsum.std_dev, result.count,
        )
    }

    /// @ai:intent Regenerate the cross-campaign index page
    ///
    /// Written under a temporary name and renamed into place so index
    /// readers get the same no-partial-content guarantee as artifacts.
    /// @ai:effects fs:write
    fn write_top_index(&self, best: &BTreeMap<String, BestResult>) -> Result<()> {
        let nav = nav_fragment(None, best, &self.root_url);
        let page = format!(
            "<!doctype html>\n\
             <html><head><title>best solutions so far</title>\n\
             <link rel=\"stylesheet\" href=\"{}/report.css\" /></head><body>\n\
             <h1>best solutions so far</h1>\n\
             {nav}\n\
             </body></html>\n",
            self.root_url,
        );

        let suffix: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        let tmp = self.outdir.join(format!(".{PAGE_NAME}.{suffix}"));
        std::fs::write(&tmp, page)?;
        std::fs::rename(&tmp, self.outdir.join(PAGE_NAME))?;
        Ok(())
    }
}

/// @ai:intent Navigation fragment linking every campaign's current page
///
/// Campaigns are grouped by the region prefix before the first underscore;
/// regions and variants are ordered lexicographically with Congress pinned
/// first, and the current campaign is bolded instead of linked.
/// @ai:effects pure
fn nav_fragment(
    current: Option<&str>,
    configs: &BTreeMap<String, BestResult>,
    root_url: &str,
) -> String {
    let mut regions: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for name in configs.keys() {
        let (region, variant) = name.split_once('_').unwrap_or((name.as_str(), ""));
        regions.entry(region).or_default().push(variant);
    }

    let mut out = String::from("<div class=\"snl\">");
    for (region, mut variants) in regions {
        variants.sort_unstable();
        if let Some(pos) = variants.iter().position(|v| *v == "Congress") {
            variants.remove(pos);
            variants.insert(0, "Congress");
        }

        let mut links = Vec::with_capacity(variants.len());
        let mut is_current_region = false;
        for variant in variants {
            let full = if variant.is_empty() {
                region.to_string()
            } else {
                format!("{region}_{variant}")
            };
            let label = if variant.is_empty() { region } else { variant };

            if current == Some(full.as_str()) {
                is_current_region = true;
                links.push(format!("<b>{label}</b>"));
            } else {
                links.push(format!("<a href=\"{root_url}/{full}/\">{label}</a>"));
            }
        }

        let class = if is_current_region { "slgC" } else { "slg" };
        out.push_str(&format!(
            "<div class=\"{class}\">{region} {}</div>",
            links.join(" ")
        ));
    }
    out.push_str("</div>");
    out
}
