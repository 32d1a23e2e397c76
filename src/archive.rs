//! @ai:module:intent Extract named members from compressed submission archives
//! @ai:module:layer infrastructure
//! @ai:module:public_api extract_members
//! @ai:module:stateless true

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// @ai:intent Read the requested members of a .tar.gz archive into memory
///
/// Members not in `names` are skipped without being read. A well-formed
/// archive that lacks some or all requested names yields a partial (possibly
/// empty) map; only an unreadable or undecodable archive is an error.
/// Callers must check for the keys they require.
/// @ai:effects fs:read
pub fn extract_members(path: &Path, names: &[&str]) -> Result<BTreeMap<String, Vec<u8>>> {
    let archive_error = |message: String| Error::Archive {
        path: path.to_path_buf(),
        message,
    };

    let file = std::fs::File::open(path).map_err(|e| archive_error(e.to_string()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut out = BTreeMap::new();

    let entries = archive
        .entries()
        .map_err(|e| archive_error(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(e.to_string()))?;

        let name = {
            let raw = entry.path().map_err(|e| archive_error(e.to_string()))?;
            // some tar writers prefix member names with ./
            raw.to_string_lossy()
                .trim_start_matches("./")
                .to_string()
        };

        if !names.contains(&name.as_str()) {
            continue;
        }

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| archive_error(format!("reading member {name}: {e}")))?;
        out.insert(name, data);
    }

    Ok(out)
}
