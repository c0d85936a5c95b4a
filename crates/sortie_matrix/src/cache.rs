use std::{
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    distance_matrix::{DistanceMatrix, MatrixPoint},
    threat_zone::ThreatZone,
    visibility_graph::MatrixParams,
};

const CACHE_FOLDER_ENV_VAR: &str = "SORTIE_CACHE_FOLDER";

fn cache_folder() -> Result<PathBuf, anyhow::Error> {
    let cache_folder_path = std::env::var(CACHE_FOLDER_ENV_VAR)?;
    let cache_folder = PathBuf::from(&cache_folder_path);

    if !cache_folder.is_dir() {
        return Err(anyhow::anyhow!(
            "Path {} is not a directory",
            cache_folder_path
        ));
    }

    Ok(cache_folder)
}

fn get_filename(fingerprint: u64) -> String {
    format!("{:016x}.json", fingerprint)
}

pub fn cache_matrix(matrix: &DistanceMatrix) -> Result<(), anyhow::Error> {
    cache_matrix_in(&cache_folder()?, matrix)
}

pub fn get_cached_matrix(
    points: &[MatrixPoint],
    zones: &[ThreatZone],
    params: &MatrixParams,
) -> Result<Option<DistanceMatrix>, anyhow::Error> {
    get_cached_matrix_in(&cache_folder()?, points, zones, params)
}

pub fn cache_matrix_in(folder: &Path, matrix: &DistanceMatrix) -> Result<(), anyhow::Error> {
    let file = std::fs::File::create(folder.join(get_filename(matrix.fingerprint())))?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    serde_json::to_writer(&mut writer, matrix)?;
    writer.flush()?;

    Ok(())
}

pub fn get_cached_matrix_in(
    folder: &Path,
    points: &[MatrixPoint],
    zones: &[ThreatZone],
    params: &MatrixParams,
) -> Result<Option<DistanceMatrix>, anyhow::Error> {
    let fingerprint = DistanceMatrix::compute_fingerprint(points, zones, params);
    let file_path = folder.join(get_filename(fingerprint));

    if !file_path.is_file() {
        return Ok(None);
    }

    let file = std::fs::File::open(file_path)?;
    let matrix: DistanceMatrix = serde_json::from_reader(BufReader::new(file))?;

    if matrix.fingerprint() != fingerprint {
        debug!(fingerprint, "Ignoring stale cached matrix");
        return Ok(None);
    }

    Ok(Some(matrix))
}

/// Loads the matrix from the cache folder when available, otherwise builds it
/// and stores it. Cache failures are logged and never fail the build.
pub fn build_cached(
    points: Vec<MatrixPoint>,
    zones: Vec<ThreatZone>,
    params: &MatrixParams,
) -> Result<DistanceMatrix, crate::error::MatrixError> {
    match get_cached_matrix(&points, &zones, params) {
        Ok(Some(matrix)) => {
            debug!("Loaded distance matrix from cache");
            return Ok(matrix);
        }
        Ok(None) => {}
        Err(err) => debug!("Matrix cache unavailable: {err}"),
    }

    let matrix = DistanceMatrix::build(points, zones, params)?;

    if let Err(err) = cache_matrix(&matrix) {
        debug!("Failed to cache distance matrix: {err}");
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use geo::coord;

    use super::*;

    #[test]
    fn test_cache_roundtrip_in_folder() {
        let folder = std::env::temp_dir().join(format!("sortie-cache-{}", std::process::id()));
        std::fs::create_dir_all(&folder).unwrap();

        let points = vec![
            MatrixPoint::new("A", coord! { x: 0.0, y: 0.0 }),
            MatrixPoint::new("B", coord! { x: 10.0, y: 0.0 }),
        ];
        let zones = vec![ThreatZone::new(coord! { x: 5.0, y: 0.0 }, 2.0)];
        let params = MatrixParams::default();

        assert!(
            get_cached_matrix_in(&folder, &points, &zones, &params)
                .unwrap()
                .is_none()
        );

        let matrix = DistanceMatrix::build(points.clone(), zones.clone(), &params).unwrap();
        cache_matrix_in(&folder, &matrix).unwrap();

        let cached = get_cached_matrix_in(&folder, &points, &zones, &params)
            .unwrap()
            .unwrap();
        assert_eq!(cached.fingerprint(), matrix.fingerprint());
        assert!((cached.distance(0, 1) - matrix.distance(0, 1)).abs() < 1e-9);
        assert_eq!(
            cached.leg(0, 1).unwrap().polyline().len(),
            matrix.leg(0, 1).unwrap().polyline().len()
        );

        std::fs::remove_dir_all(&folder).unwrap();
    }
}
