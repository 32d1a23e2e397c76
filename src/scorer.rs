//! @ai:module:intent Score solutions by running the external evaluator
//! @ai:module:layer infrastructure
//! @ai:module:public_api ScoreSolution, Scorer, Score
//! @ai:module:stateless true

use crate::config::CampaignSet;
use crate::error::{Error, Result};
use regex::Regex;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

// Example evaluator output:
// generation 0: 21.679798418 Km/person
// population avg=634910 std=1707.11778
// max=638656 (dist# 10)  min=632557 (dist# 7)  median=634306 (dist# 6)
pub(crate) const KMPP_PATTERN: &str = r"([0-9.]+)\s+Km/person";
pub(crate) const MAX_MIN_PATTERN: &str = r"max=([0-9]+).*min=([0-9]+)";

/// @ai:intent Metrics recorded for one scored solution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub kmpp: f64,
    pub spread: i64,
}

/// @ai:intent Trait for scoring a solution blob against a named campaign
pub trait ScoreSolution: Send + Sync {
    fn score(&self, solution: &[u8], campaign_name: &str) -> Result<Score>;
}

/// @ai:intent Scores solutions by invoking the evaluator process
///
/// One synchronous evaluator invocation per call; the wait is blocking.
pub struct Scorer<'a> {
    campaigns: &'a CampaignSet,
    kmpp_re: Regex,
    max_min_re: Regex,
}

impl<'a> Scorer<'a> {
    /// @ai:intent Create a scorer over the loaded campaign set
    /// @ai:effects pure
    pub fn new(campaigns: &'a CampaignSet) -> Self {
        Self {
            campaigns,
            kmpp_re: Regex::new(KMPP_PATTERN).expect("static pattern"),
            max_min_re: Regex::new(MAX_MIN_PATTERN).expect("static pattern"),
        }
    }

    /// @ai:intent Build the evaluator command line for a campaign
    /// @ai:effects pure
    fn evaluator_command(&self, campaign_name: &str) -> Result<(PathBuf, Vec<String>)> {
        let campaign = self.campaigns.get(campaign_name).ok_or_else(|| {
            Error::ConfigResolution {
                path: PathBuf::new(),
                reason: format!("campaign {campaign_name} referenced but not loaded"),
            }
        })?;

        let mut args = campaign.evaluator_args.clone();
        args.push("-P".to_string());
        args.push(campaign.dataset.display().to_string());
        args.push("-d".to_string());
        args.push(campaign.districts.to_string());
        args.push("--loadSolution".to_string());
        args.push("-".to_string());

        Ok((self.campaigns.tools().evaluator_command(), args))
    }
}

impl ScoreSolution for Scorer<'_> {
    /// @ai:intent Feed the solution to the evaluator and parse its metrics
    ///
    /// Nonzero exit, or a zero exit whose output lacks either expected
    /// pattern, is a Score error carrying the captured output.
    /// @ai:effects io
    fn score(&self, solution: &[u8], campaign_name: &str) -> Result<Score> {
        let (program, args) = self.evaluator_command(campaign_name)?;
        tracing::debug!("run {} {}", program.display(), args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Score {
                message: format!("failed to spawn {}: {e}", program.display()),
                diagnostic: String::new(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // an early evaluator exit shows up here as a broken pipe
            if let Err(e) = stdin.write_all(solution) {
                let _ = child.wait();
                return Err(Error::Score {
                    message: format!("failed to write solution to evaluator: {e}"),
                    diagnostic: String::new(),
                });
            }
        }

        let output = child.wait_with_output()?;
        let raw = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if !output.status.success() {
            return Err(Error::Score {
                message: format!("evaluator exited with {}", output.status),
                diagnostic: raw,
            });
        }

        let kmpp = match self.kmpp_re.captures(&raw) {
            Some(caps) => caps[1].parse::<f64>().map_err(|e| Error::Score {
                message: format!("unparseable Km/person value: {e}"),
                diagnostic: raw.clone(),
            })?,
            None => {
                return Err(Error::Score {
                    message: "no Km/person value in evaluator output".to_string(),
                    diagnostic: raw,
                })
            }
        };

        let spread = match self.max_min_re.captures(&raw) {
            Some(caps) => {
                let max: i64 = caps[1].parse().map_err(|e| Error::Score {
                    message: format!("unparseable max value: {e}"),
                    diagnostic: raw.clone(),
                })?;
                let min: i64 = caps[2].parse().map_err(|e| Error::Score {
                    message: format!("unparseable min value: {e}"),
                    diagnostic: raw.clone(),
                })?;
                max - min
            }
            None => {
                return Err(Error::Score {
                    message: "no max/min pair in evaluator output".to_string(),
                    diagnostic: raw,
                })
            }
        };

        Ok(Score { kmpp, spread })
    }
}
