//! @ai:module:intent Drive the scan/extract/score/record ingestion pass
//! @ai:module:layer application
//! @ai:module:public_api ingest, IngestOptions, IngestSummary
//! @ai:module:stateless true

use crate::archive::extract_members;
use crate::config::CampaignSet;
use crate::error::{Error, Result};
use crate::scanner::{ArchiveScanner, FoundArchive};
use crate::scorer::ScoreSolution;
use crate::store::{NewSubmission, SubmissionStore};
use crate::vars::{resolve_campaign, Vars};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// @ai:intent Ingestion behavior toggles
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// keep scanning after a per-archive failure instead of aborting
    pub keep_going: bool,
}

/// @ai:intent Counts of what one ingestion pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub recorded: u64,
    pub already_present: u64,
    pub failed: u64,
}

/// @ai:intent Ingest every archive under the solutions directory
///
/// Each archive is processed independently: an abort after N archives
/// leaves exactly those N durably recorded. Already-recorded paths are
/// skipped before any scoring work. Per-archive failures are logged and,
/// with keep-going enabled, do not stop the scan; otherwise the first
/// failure aborts the remaining scan (already-inserted rows stay).
/// @ai:effects fs:read, fs:write, io
pub fn ingest<S: ScoreSolution>(
    store: &SubmissionStore,
    campaigns: &CampaignSet,
    scorer: &S,
    solutions_dir: &Path,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    let scanner = ArchiveScanner::new(solutions_dir)?;
    let mut summary = IngestSummary::default();

    for found in scanner.scan() {
        if store.exists(&found.key)? {
            summary.already_present += 1;
            continue;
        }

        match score_archive(campaigns, scorer, &found) {
            Ok(submission) => match store.insert(&submission) {
                Ok(id) => {
                    summary.recorded += 1;
                    tracing::info!(
                        "added {} as #{id}: {} kmpp={} spread={}",
                        found.key,
                        submission.config,
                        submission.kmpp,
                        submission.spread
                    );
                }
                Err(Error::DuplicatePath(path)) => {
                    // another writer raced us; its record stands
                    summary.already_present += 1;
                    tracing::debug!("lost insert race for {path}");
                }
                Err(e) => return Err(e),
            },
            Err(e) => {
                summary.failed += 1;
                tracing::warn!("failed to process {}: {e}", found.key);

                if !options.keep_going {
                    return Err(e);
                }
            }
        }
    }

    Ok(summary)
}

/// @ai:intent Turn one archive into a fully-formed submission record
/// @ai:effects fs:read, io
fn score_archive<S: ScoreSolution>(
    campaigns: &CampaignSet,
    scorer: &S,
    found: &FoundArchive,
) -> Result<NewSubmission> {
    let unixtime = std::fs::metadata(&found.path)?
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let mut members = extract_members(&found.path, &["vars", "solution"])?;

    let vars_raw = members.remove("vars").ok_or_else(|| Error::Archive {
        path: found.path.clone(),
        message: "missing required member vars".to_string(),
    })?;
    let solution = members.remove("solution").ok_or_else(|| Error::Archive {
        path: found.path.clone(),
        message: "missing required member solution".to_string(),
    })?;

    let vars = Vars::parse(&vars_raw);
    let config = resolve_campaign(&vars, campaigns, &found.key)?;
    let score = scorer.score(&solution, &config)?;

    Ok(NewSubmission {
        vars: String::from_utf8_lossy(&vars_raw).into_owned(),
        unixtime,
        kmpp: score.kmpp,
        spread: score.spread,
        path: found.key.clone(),
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Campaign, CampaignFile, Tools};
    use crate::scorer::Score;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct MockScorer {
        score: Score,
    }

    impl ScoreSolution for MockScorer {
        fn score(&self, _solution: &[u8], campaign_name: &str) -> Result<Score> {
            if campaign_name.starts_with("FAIL") {
                return Err(Error::Score {
                    message: "mock evaluator rejected solution".to_string(),
                    diagnostic: String::new(),
                });
            }
            Ok(self.score)
        }
    }

    fn campaign_set(names: &[&str]) -> CampaignSet {
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

    fn write_archive(path: &Path, members: &[(&str, &[u8])]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = std::fs::File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
    }

    fn mock() -> MockScorer {
        MockScorer {
            score: Score {
                kmpp: 12.345,
                spread: 200,
            },
        }
    }

    #[test]
    fn test_records_one_row_per_archive() {
        let soldir = TempDir::new().unwrap();
        write_archive(
            &soldir.path().join("2024/sub1.tar.gz"),
            &[("vars", b"config=CA_Congress&path=/x/y"), ("solution", b"blob")],
        );

        let store = SubmissionStore::open_in_memory().unwrap();
        let campaigns = campaign_set(&["CA_Congress"]);
        let summary = ingest(
            &store,
            &campaigns,
            &mock(),
            soldir.path(),
            &IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.recorded, 1);
        let row = store.lookup_by_path("/2024/sub1.tar.gz").unwrap().unwrap();
        assert_eq!(row.config, "CA_Congress");
        assert_eq!(row.kmpp, 12.345);
        assert_eq!(row.spread, 200);
        assert_eq!(row.vars, "config=CA_Congress&path=/x/y");
        assert!(row.unixtime > 0);
    }

    #[test]
    fn test_reingestion_is_idempotent() {
        let soldir = TempDir::new().unwrap();
        write_archive(
            &soldir.path().join("sub1.tar.gz"),
            &[("vars", b"config=CA_Congress"), ("solution", b"blob")],
        );
        write_archive(
            &soldir.path().join("sub2.tar.gz"),
            &[("vars", b"config=CA_Congress"), ("solution", b"blob")],
        );

        let store = SubmissionStore::open_in_memory().unwrap();
        let campaigns = campaign_set(&["CA_Congress"]);
        let options = IngestOptions::default();

        let first = ingest(&store, &campaigns, &mock(), soldir.path(), &options).unwrap();
        assert_eq!(first.recorded, 2);

        let second = ingest(&store, &campaigns, &mock(), soldir.path(), &options).unwrap();
        assert_eq!(second.recorded, 0);
        assert_eq!(second.already_present, 2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_missing_vars_member_writes_nothing() {
        let soldir = TempDir::new().unwrap();
        write_archive(&soldir.path().join("sub1.tar.gz"), &[("solution", b"blob")]);

        let store = SubmissionStore::open_in_memory().unwrap();
        let campaigns = campaign_set(&["CA_Congress"]);
        let summary = ingest(
            &store,
            &campaigns,
            &mock(),
            soldir.path(),
            &IngestOptions { keep_going: true },
        )
        .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_unresolvable_config_writes_nothing() {
        let soldir = TempDir::new().unwrap();
        write_archive(
            &soldir.path().join("sub1.tar.gz"),
            &[("vars", b"path=/nothing/here"), ("solution", b"blob")],
        );

        let store = SubmissionStore::open_in_memory().unwrap();
        let campaigns = campaign_set(&["CA_Congress"]);
        let summary = ingest(
            &store,
            &campaigns,
            &mock(),
            soldir.path(),
            &IngestOptions { keep_going: true },
        )
        .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_keep_going_records_later_archives_past_a_failure() {
        let soldir = TempDir::new().unwrap();
        write_archive(
            &soldir.path().join("bad.tar.gz"),
            &[("vars", b"config=FAIL_Congress"), ("solution", b"blob")],
        );
        write_archive(
            &soldir.path().join("good.tar.gz"),
            &[("vars", b"config=CA_Congress"), ("solution", b"blob")],
        );

        let store = SubmissionStore::open_in_memory().unwrap();
        let campaigns = campaign_set(&["CA_Congress", "FAIL_Congress"]);
        let summary = ingest(
            &store,
            &campaigns,
            &mock(),
            soldir.path(),
            &IngestOptions { keep_going: true },
        )
        .unwrap();

        assert_eq!(summary.recorded, 1);
        assert_eq!(summary.failed, 1);
        assert!(store.exists("/good.tar.gz").unwrap());
    }

    #[test]
    fn test_fail_fast_aborts_but_keeps_durable_rows() {
        let soldir = TempDir::new().unwrap();
        write_archive(
            &soldir.path().join("good.tar.gz"),
            &[("vars", b"config=CA_Congress"), ("solution", b"blob")],
        );

        let store = SubmissionStore::open_in_memory().unwrap();
        let campaigns = campaign_set(&["CA_Congress", "FAIL_Congress"]);
        let options = IngestOptions { keep_going: false };

        ingest(&store, &campaigns, &mock(), soldir.path(), &options).unwrap();
        assert!(store.exists("/good.tar.gz").unwrap());

        // a later bad archive aborts the run but the earlier row survives
        write_archive(
            &soldir.path().join("bad.tar.gz"),
            &[("vars", b"config=FAIL_Congress"), ("solution", b"blob")],
        );
        let result = ingest(&store, &campaigns, &mock(), soldir.path(), &options);
        assert!(result.is_err());
        assert!(store.exists("/good.tar.gz").unwrap());
        assert!(!store.exists("/bad.tar.gz").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_end_to_end_with_stub_evaluator() {
        use crate::scorer::Scorer;
        use std::os::unix::fs::PermissionsExt;

        let bindir = TempDir::new().unwrap();
        let script = bindir.path().join("analyze");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat >/dev/null\n\
             echo 'generation 0: 12.345 Km/person'\n\
             echo 'max=500 (dist# 1)  min=300 (dist# 2)'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let soldir = TempDir::new().unwrap();
        write_archive(
            &soldir.path().join("2024/sub1.tar.gz"),
            &[("vars", b"config=CA_Congress&path=/x/y"), ("solution", b"blob")],
        );

        let campaigns = CampaignSet::from_file(CampaignFile {
            tools: Tools {
                bindir: Some(bindir.path().to_path_buf()),
                ..Tools::default()
            },
            campaigns: vec![Campaign {
                name: "CA_Congress".to_string(),
                dataset: PathBuf::from("data/CA/ca.pb"),
                districts: 53,
                evaluator_args: vec![],
                renderer_args: vec![],
            }],
        })
        .unwrap();

        let store = SubmissionStore::open_in_memory().unwrap();
        let scorer = Scorer::new(&campaigns);
        let summary = ingest(
            &store,
            &campaigns,
            &scorer,
            soldir.path(),
            &IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.recorded, 1);
        let row = store.lookup_by_path("/2024/sub1.tar.gz").unwrap().unwrap();
        assert_eq!(row.config, "CA_Congress");
        assert_eq!(row.kmpp, 12.345);
        assert_eq!(row.spread, 200);
    }
}
