//! Sample-set discovery and summaries.

use std::path::Path;
use sz_core::{detect_source_type, SampleSetName, SourceType};
use sz_store::SampleSetStore;

use crate::config::SyncConfig;
use crate::error::AppResult;
use crate::session::SyncSession;

/// Summary of a sample set for listing.
#[derive(Debug, Clone)]
pub struct SampleSetSummary {
    pub name: SampleSetName,
    pub measurements: usize,
    pub centroids: usize,
    pub source_type: SourceType,
    pub annotated: usize,
}

pub fn summarize(store: &SampleSetStore) -> SampleSetSummary {
    let measurements = store.list_measurements();
    SampleSetSummary {
        name: store.name().clone(),
        measurements: measurements.len(),
        centroids: store.list_centroids().len(),
        source_type: detect_source_type(measurements),
        annotated: measurements
            .iter()
            .filter(|m| m.annotations.cluster_id.is_some())
            .count(),
    }
}

/// Summaries of every sample set in `data_dir`, by name.
pub fn list_sample_sets(data_dir: &Path) -> AppResult<Vec<SampleSetSummary>> {
    let mut summaries = Vec::new();
    for name in sz_store::list_sample_sets(data_dir)? {
        let store = SampleSetStore::open(data_dir, &name)?;
        summaries.push(summarize(&store));
    }
    Ok(summaries)
}

/// Open a session for a user-typed sample-set name.
pub fn open_session(data_dir: &Path, raw_name: &str, config: &SyncConfig) -> AppResult<SyncSession> {
    let name = SampleSetName::new(raw_name)?;
    SyncSession::open(data_dir, &name, config)
}
