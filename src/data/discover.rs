use std::path::Path;

use log::debug;

use super::model::Partition;
use crate::error::Result;

/// List `<prefix>_<YYYY>-<MM>.<extension>` files directly under `dir`,
/// sorted by path. Other entries are ignored; a missing `dir` holds nothing.
pub fn discover_partitions(dir: &Path, prefix: &str, extension: &str) -> Result<Vec<Partition>> {
    let mut partitions = Vec::new();
    if !dir.is_dir() {
        debug!("{} is not a directory", dir.display());
        return Ok(partitions);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        match Partition::from_path(&path, prefix, extension) {
            Some(p) => partitions.push(p),
            None => debug!("Skipping {}", path.display()),
        }
    }
    partitions.sort();
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_sorted_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "fhvhv_tripdata_2023-02.parquet",
            "fhvhv_tripdata_2023-01.parquet",
            "notes.txt",
            "fhvhv_tripdata_latest.parquet",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("fhvhv_tripdata_2023-03.parquet")).unwrap();

        let found = discover_partitions(dir.path(), "fhvhv_tripdata", "parquet").unwrap();
        let months: Vec<&str> = found.iter().map(|p| p.month_key.as_str()).collect();
        assert_eq!(months, vec!["2023-01", "2023-02"]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let found = discover_partitions(&missing, "fhvhv_tripdata", "parquet").unwrap();
        assert!(found.is_empty());
    }
}
