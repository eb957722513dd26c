//! # Source Enumeration
//!
//! Lists the scans of one product/year/day-of-year in an object store. GOES
//! archives group scans by hour, so a day holds `product/YYYY/DDD/HH/*.nc`.

use crate::storage::{ObjectEntry, StorageBackend, StorageResult};
use log::debug;

/// Key prefix of one day's directory, with a trailing `/`
pub fn day_prefix(product: &str, year: i32, jday: u32) -> String {
    format!("{}/{}/{:03}/", product, year, jday)
}

/// Matches `<prefix>*/*.nc`: exactly one directory level below the day
fn matches_day_glob(key: &str, prefix: &str) -> bool {
    let Some(rest) = key.strip_prefix(prefix) else {
        return false;
    };
    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(hour), Some(name), None) => {
            !hour.is_empty() && name.len() > ".nc".len() && name.ends_with(".nc")
        }
        _ => false,
    }
}

/// Lists the NetCDF scans of one day, sorted by key.
///
/// An empty vector means the day has no data; deciding whether that is an
/// error is left to the caller.
pub async fn list_day_objects<S: StorageBackend + ?Sized>(
    store: &S,
    product: &str,
    year: i32,
    jday: u32,
) -> StorageResult<Vec<ObjectEntry>> {
    let prefix = day_prefix(product, year, jday);
    let entries: Vec<ObjectEntry> = store
        .list(&prefix)
        .await?
        .into_iter()
        .filter(|e| matches_day_glob(&e.key, &prefix))
        .collect();
    debug!("Found {} objects under {}", entries.len(), prefix);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    #[test]
    fn test_day_prefix_pads_day() {
        assert_eq!(day_prefix("ABI-L2-LSTF", 2024, 5), "ABI-L2-LSTF/2024/005/");
        assert_eq!(day_prefix("ABI-L2-LSTF", 2024, 215), "ABI-L2-LSTF/2024/215/");
    }

    #[test]
    fn test_day_glob() {
        let prefix = "P/2024/015/";
        assert!(matches_day_glob("P/2024/015/12/OR_x_s2024015120000.nc", prefix));
        assert!(!matches_day_glob("P/2024/015/OR_x.nc", prefix));
        assert!(!matches_day_glob("P/2024/015/12/extra/OR_x.nc", prefix));
        assert!(!matches_day_glob("P/2024/015/12/OR_x.nc.md5", prefix));
        assert!(!matches_day_glob("P/2024/015/12/.nc", prefix));
        assert!(!matches_day_glob("P/2024/016/12/OR_x.nc", prefix));
    }

    #[tokio::test]
    async fn test_list_day_objects_filters_and_sorts() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        for key in [
            "P/2024/015/13/OR_b.nc",
            "P/2024/015/00/OR_a.nc",
            "P/2024/015/00/README.txt",
            "P/2024/015/top.nc",
            "P/2024/016/00/OR_c.nc",
        ] {
            let path = root.join(key);
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(path, b"x")?;
        }

        let store = LocalStorage::new(root);
        let keys: Vec<String> = list_day_objects(&store, "P", 2024, 15)
            .await?
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["P/2024/015/00/OR_a.nc", "P/2024/015/13/OR_b.nc"]);

        assert!(list_day_objects(&store, "P", 2024, 17).await?.is_empty());
        Ok(())
    }
}
