//! @ai:module:intent Compute best-so-far submissions per campaign
//! @ai:module:layer domain
//! @ai:module:public_api BestTracker, BestResult, BestSolution
//! @ai:module:stateless true

use crate::error::Result;
use crate::store::SubmissionStore;
use rusqlite::params;
use serde::Serialize;
use std::collections::BTreeMap;

/// @ai:intent The winning submission for one campaign
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestSolution {
    pub id: i64,
    pub kmpp: f64,
    pub spread: i64,
    pub path: String,
}

/// @ai:intent Per-campaign summary: submission count plus the winner
///
/// Derived on demand from submission rows; never cached across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestResult {
    pub count: u64,
    #[serde(flatten)]
    pub solution: BestSolution,
}

/// @ai:intent Read-only queries over the store for best-result selection
pub struct BestTracker<'a> {
    store: &'a SubmissionStore,
}

impl<'a> BestTracker<'a> {
    pub fn new(store: &'a SubmissionStore) -> Self {
        Self { store }
    }

    /// @ai:intent Submission counts grouped by campaign name
    /// @ai:effects fs:read
    pub fn counts_by_config(&self) -> Result<BTreeMap<String, u64>> {
        let mut stmt = self
            .store
            .conn()
            .prepare("SELECT config, count(*) FROM submissions GROUP BY config")?;

        let mut counts = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (config, count) = row?;
            counts.insert(config, count as u64);
        }

        Ok(counts)
    }

    /// @ai:intent The single best submission for a campaign, if it has any
    ///
    /// Best means the numerically largest kmpp, ties broken by lowest id.
    /// The descending order matches what the campaign has always recorded
    /// as best; changing the direction would reshuffle every published
    /// result, so it is fixed here in one place.
    /// @ai:effects fs:read
    pub fn best_for(&self, config: &str) -> Result<Option<BestSolution>> {
        use rusqlite::OptionalExtension;

        let row = self
            .store
            .conn()
            .query_row(
                "SELECT id, kmpp, spread, path FROM submissions
                 WHERE config = ?1
                 ORDER BY kmpp DESC, id ASC
                 LIMIT 1",
                params![config],
                |row| {
                    Ok(BestSolution {
                        id: row.get(0)?,
                        kmpp: row.get(1)?,
                        spread: row.get(2)?,
                        path: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }

    /// @ai:intent Best result for every campaign with at least one submission
    /// @ai:effects fs:read
    pub fn best_all(&self) -> Result<BTreeMap<String, BestResult>> {
        let mut out = BTreeMap::new();

        for (config, count) in self.counts_by_config()? {
            if let Some(solution) = self.best_for(&config)? {
                out.insert(config, BestResult { count, solution });
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewSubmission;
    use pretty_assertions::assert_eq;

    fn insert(store: &SubmissionStore, path: &str, config: &str, kmpp: f64) -> i64 {
        store
            .insert(&NewSubmission {
                vars: String::new(),
                unixtime: 0,
                kmpp,
                spread: 100,
                path: path.to_string(),
                config: config.to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_counts_group_by_campaign() {
        let store = SubmissionStore::open_in_memory().unwrap();
        insert(&store, "/a", "CA_Congress", 10.0);
        insert(&store, "/b", "CA_Congress", 11.0);
        insert(&store, "/c", "MA_House", 9.0);

        let tracker = BestTracker::new(&store);
        let counts = tracker.counts_by_config().unwrap();
        assert_eq!(counts["CA_Congress"], 2);
        assert_eq!(counts["MA_House"], 1);
    }

    #[test]
    fn test_best_is_largest_kmpp_ties_by_lowest_id() {
        let store = SubmissionStore::open_in_memory().unwrap();
        insert(&store, "/a", "CA_Congress", 10.0);
        let first_tied = insert(&store, "/b", "CA_Congress", 12.5);
        insert(&store, "/c", "CA_Congress", 12.5);

        let tracker = BestTracker::new(&store);
        let best = tracker.best_for("CA_Congress").unwrap().unwrap();
        assert_eq!(best.id, first_tied);
        assert_eq!(best.kmpp, 12.5);
        assert_eq!(best.path, "/b");
    }

    #[test]
    fn test_best_for_empty_campaign_is_none() {
        let store = SubmissionStore::open_in_memory().unwrap();
        let tracker = BestTracker::new(&store);
        assert!(tracker.best_for("CA_Congress").unwrap().is_none());
    }

    #[test]
    fn test_best_all_composes_counts_and_winners() {
        let store = SubmissionStore::open_in_memory().unwrap();
        insert(&store, "/a", "CA_Congress", 10.0);
        insert(&store, "/b", "CA_Congress", 12.5);
        insert(&store, "/c", "MA_House", 9.0);

        let tracker = BestTracker::new(&store);
        let all = tracker.best_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["CA_Congress"].count, 2);
        assert_eq!(all["CA_Congress"].solution.kmpp, 12.5);
        assert_eq!(all["MA_House"].solution.path, "/c");
    }
}
