//! Sync session: refresh (store -> view) and commit (view -> store) for one sample set.

use crate::error::AppResult;
use crate::progress::{CommitProgress, CommitProgressEvent, CommitStage};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sz_core::{
    derive_identity_from_data_id, detect_source_type, ClusterId, MeasurementIdentity, Projection,
    SampleSetName, SourceType,
};
use sz_sheet::{
    classify_row, GridRow, MergeConflict, MergePolicy, Reconciler, Row, RowAction, RowError,
    RowSet, SheetLayout,
};
use sz_store::SampleSetStore;

use crate::config::SyncConfig;

/// Rows reconciled between store flushes and progress callbacks.
pub const DEFAULT_COMMIT_CHUNK: usize = 64;

/// Outcome of a commit. Row-scoped failures are collected, never raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    pub updated: usize,
    pub inserted: usize,
    pub skipped: usize,
    /// Centroid records written.
    pub centroids: usize,
    pub errors: Vec<RowError>,
    pub conflicts: Vec<MergeConflict>,
    pub cancelled: bool,
    /// Whether anything in the store actually changed.
    pub store_changed: bool,
}

/// Sent to listeners after a commit or clear that changed the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub sample_set: SampleSetName,
    pub inserted: usize,
    pub updated: usize,
    pub centroids: usize,
}

pub type ChangeListener = Box<dyn FnMut(&ChangeEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    Incremental,
    Full,
}

#[derive(Debug, Default)]
struct RefreshQueue {
    committing: bool,
    pending: VecDeque<RefreshKind>,
}

/// Cloneable handle views use to request a re-pull. Requests made while a
/// commit is in flight stay queued until the session drains them.
#[derive(Debug, Clone, Default)]
pub struct RefreshHandle {
    inner: Arc<Mutex<RefreshQueue>>,
}

impl RefreshHandle {
    fn lock(&self) -> MutexGuard<'_, RefreshQueue> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a refresh. Returns `true` when it was deferred behind a commit.
    pub fn request(&self, kind: RefreshKind) -> bool {
        let mut queue = self.lock();
        queue.pending.push_back(kind);
        queue.committing
    }

    pub fn is_committing(&self) -> bool {
        self.lock().committing
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    fn begin_commit(&self) -> CommitGuard<'_> {
        self.lock().committing = true;
        CommitGuard { handle: self }
    }

    /// Take every queued request, or nothing while a commit runs.
    fn take_pending(&self) -> Vec<RefreshKind> {
        let mut queue = self.lock();
        if queue.committing {
            return Vec::new();
        }
        queue.pending.drain(..).collect()
    }
}

struct CommitGuard<'a> {
    handle: &'a RefreshHandle,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.handle.lock().committing = false;
    }
}

/// Result of one auto-refresh tick.
#[derive(Debug, Clone)]
pub struct AutoRefresh {
    pub rows: RowSet,
    pub committed: Option<CommitReport>,
    /// The tick found a commit in flight and queued itself instead.
    pub deferred: bool,
}

/// SHA-256 over every cell, row by row.
pub fn fingerprint_rows(rows: &RowSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rows.layout.header_row.to_le_bytes());
    hasher.update(rows.layout.band.start.to_le_bytes());
    for row in &rows.rows {
        for cell in row.cells() {
            hasher.update(cell.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

/// Owns one sample set's store plus the view-facing state around it.
pub struct SyncSession {
    store: SampleSetStore,
    layout: SheetLayout,
    projection: Projection,
    buffer_rows: usize,
    chunk_size: usize,
    /// Fingerprint of the rows last handed to or accepted from a view.
    last_fingerprint: Option<String>,
    refresh: RefreshHandle,
    listeners: Vec<ChangeListener>,
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("sample_set", self.store.name())
            .field("layout", &self.layout)
            .field("projection", &self.projection)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SyncSession {
    pub fn open(data_dir: &Path, name: &SampleSetName, config: &SyncConfig) -> AppResult<Self> {
        let store = SampleSetStore::open(data_dir, name)?;
        Ok(Self::from_store(store, config))
    }

    pub fn from_store(store: SampleSetStore, config: &SyncConfig) -> Self {
        Self {
            store,
            layout: config.layout(),
            projection: config.projection(),
            buffer_rows: config.buffer_rows,
            chunk_size: DEFAULT_COMMIT_CHUNK,
            last_fingerprint: None,
            refresh: RefreshHandle::default(),
            listeners: Vec::new(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn name(&self) -> &SampleSetName {
        self.store.name()
    }

    pub fn store(&self) -> &SampleSetStore {
        &self.store
    }

    /// Direct store access for collaborators such as the sampling pipeline or
    /// a clustering step. Callers flush through [`SyncSession::flush`].
    pub fn store_mut(&mut self) -> &mut SampleSetStore {
        &mut self.store
    }

    pub fn flush(&mut self) -> AppResult<()> {
        self.store.flush()?;
        Ok(())
    }

    pub fn layout(&self) -> SheetLayout {
        self.layout
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn source_type(&self) -> SourceType {
        detect_source_type(self.store.list_measurements())
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Regenerate every row from the store: header, centroid band, one data
    /// row per measurement in store order, then blank buffer rows.
    pub fn full_rebuild(&mut self) -> RowSet {
        let mut rows = RowSet::skeleton(self.layout);
        for cluster_id in ClusterId::all() {
            if let Some(centroid) = self.store.centroid(cluster_id) {
                let idx = self.layout.band.row_for_position(cluster_id.get() as usize);
                rows.rows[idx] = GridRow::from_centroid(centroid);
            }
        }
        for m in self.store.list_measurements() {
            rows.rows.push(GridRow::from_measurement(m, self.projection));
        }
        let len = rows.len() + self.buffer_rows;
        rows.pad_to(len);

        tracing::info!(set = %self.store.name(), rows = rows.len(), "full rebuild");
        self.last_fingerprint = Some(fingerprint_rows(&rows));
        rows
    }

    /// Patch the view in place: stored measurements overwrite only their
    /// coordinate and DataID cells; unknown measurements are appended with
    /// defaults; rows the store lacks are left alone.
    pub fn incremental_refresh(&mut self, current: &RowSet) -> RowSet {
        let mut out = current.clone();
        let layout = out.layout;
        out.pad_to(layout.reserved_rows());

        let mut by_identity: HashMap<MeasurementIdentity, usize> = HashMap::new();
        let mut last_used = layout.data_start;
        for (idx, row) in out.data_rows() {
            if !row.is_blank() {
                last_used = idx + 1;
            }
            if row.data_id().is_empty() {
                continue;
            }
            if let Ok(identity) = derive_identity_from_data_id(row.data_id()) {
                by_identity.entry(identity).or_insert(idx);
            }
        }

        let mut patched = 0usize;
        let mut appended = 0usize;
        for m in self.store.list_measurements() {
            match by_identity.get(&m.identity()) {
                Some(&idx) => {
                    out.rows[idx].set_identity_cells(m, self.projection);
                    patched += 1;
                }
                None => {
                    let row = GridRow::fresh_for_measurement(m, self.projection);
                    if last_used < out.rows.len() {
                        out.rows[last_used] = row;
                    } else {
                        out.rows.push(row);
                    }
                    last_used += 1;
                    appended += 1;
                }
            }
        }
        out.pad_to(last_used + self.buffer_rows);

        tracing::debug!(set = %self.store.name(), patched, appended, "incremental refresh");
        self.last_fingerprint = Some(fingerprint_rows(&out));
        out
    }

    /// Whether the view's rows differ from what this session last handed out
    /// or accepted.
    pub fn has_pending_edits(&self, rows: &RowSet) -> bool {
        self.last_fingerprint.as_deref() != Some(fingerprint_rows(rows).as_str())
    }

    /// Commit an edited view. Supplied annotation cells overwrite stored ones.
    pub fn commit(&mut self, rows: &RowSet) -> AppResult<CommitReport> {
        self.commit_with(rows, MergePolicy::Overwrite, None)
    }

    pub fn commit_with_progress(
        &mut self,
        rows: &RowSet,
        progress: CommitProgress<'_>,
    ) -> AppResult<CommitReport> {
        self.commit_with(rows, MergePolicy::Overwrite, Some(progress))
    }

    /// Reconcile every row in order under `policy`.
    ///
    /// Each row applies fully or not at all. The store is flushed after each
    /// chunk; a cancelled commit keeps the chunks already applied.
    pub fn commit_with(
        &mut self,
        rows: &RowSet,
        policy: MergePolicy,
        mut progress: Option<CommitProgress<'_>>,
    ) -> AppResult<CommitReport> {
        let refresh = self.refresh.clone();
        let _guard = refresh.begin_commit();

        let reconciler = Reconciler::new(policy)
            .with_source(self.source_type())
            .with_projection(self.projection);
        let mut report = CommitReport::default();
        let total = rows.len();
        let mut processed = 0usize;

        for chunk in rows.rows.chunks(self.chunk_size) {
            for row in chunk {
                let row_index = processed;
                processed += 1;
                let classified = classify_row(row, row_index, &rows.layout);
                if matches!(classified, Row::Header) {
                    continue;
                }
                match reconciler.reconcile(&mut self.store, &classified)? {
                    Ok(outcome) => {
                        record_action(&mut report, &outcome.action);
                        report.conflicts.extend(outcome.conflicts);
                    }
                    Err(err) => {
                        tracing::warn!(%err, "row skipped");
                        report.errors.push(err);
                    }
                }
            }

            report.store_changed |= self.store.is_dirty();
            self.store.flush()?;

            if let Some(cb) = progress.as_deref_mut() {
                let event = progress_event(&report, CommitStage::Reconciling, processed, total);
                if cb(&event).is_break() {
                    report.cancelled = true;
                    tracing::info!(set = %self.store.name(), processed, total, "commit cancelled");
                    break;
                }
            }
        }

        if let Some(cb) = progress.as_deref_mut() {
            let stage = if report.cancelled {
                CommitStage::Cancelled
            } else {
                CommitStage::Completed
            };
            let _ = cb(&progress_event(&report, stage, processed, total));
        }

        for conflict in &report.conflicts {
            tracing::warn!(
                data_id = %conflict.data_id,
                field = conflict.field,
                stored = %conflict.stored,
                incoming = %conflict.incoming,
                "kept stored annotation"
            );
        }
        tracing::info!(
            set = %self.store.name(),
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "commit finished"
        );

        if !report.cancelled {
            self.last_fingerprint = Some(fingerprint_rows(rows));
        }
        if report.store_changed {
            self.notify(ChangeEvent {
                sample_set: self.store.name().clone(),
                inserted: report.inserted,
                updated: report.updated,
                centroids: report.centroids,
            });
        }
        Ok(report)
    }

    /// Serve queued refresh requests against the view's current rows.
    /// Returns `None` while a commit runs or when nothing is queued.
    pub fn drain_refresh(&mut self, current: &RowSet) -> Option<RowSet> {
        let pending = self.refresh.take_pending();
        if pending.is_empty() {
            return None;
        }
        if pending.contains(&RefreshKind::Full) {
            Some(self.full_rebuild())
        } else {
            Some(self.incremental_refresh(current))
        }
    }

    /// Timer-driven refresh: patch the view from the store, then commit it
    /// if the view carried unsaved edits.
    pub fn auto_refresh_tick(&mut self, view: &RowSet) -> AppResult<AutoRefresh> {
        if self.refresh.is_committing() {
            self.refresh.request(RefreshKind::Incremental);
            return Ok(AutoRefresh {
                rows: view.clone(),
                committed: None,
                deferred: true,
            });
        }

        let pending_edits = self.has_pending_edits(view);
        let rows = self.incremental_refresh(view);
        let committed = if pending_edits {
            Some(self.commit(&rows)?)
        } else {
            None
        };
        Ok(AutoRefresh {
            rows,
            committed,
            deferred: false,
        })
    }

    /// Null every measurement's cluster fields and drop all centroid records.
    /// Raw values are untouched. Returns `(measurements, centroids)` affected.
    pub fn clear_cluster_data(&mut self) -> AppResult<(usize, usize)> {
        let measurements = self.store.clear_annotations();
        let centroids = self.store.clear_centroids();
        self.store.flush()?;
        if measurements + centroids > 0 {
            self.notify(ChangeEvent {
                sample_set: self.store.name().clone(),
                inserted: 0,
                updated: measurements,
                centroids,
            });
        }
        Ok((measurements, centroids))
    }

    fn notify(&mut self, event: ChangeEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

fn record_action(report: &mut CommitReport, action: &RowAction) {
    match action {
        RowAction::Inserted(_) => report.inserted += 1,
        RowAction::Updated { .. } => report.updated += 1,
        RowAction::Centroid { .. } => report.centroids += 1,
        RowAction::Skipped => report.skipped += 1,
    }
}

fn progress_event(
    report: &CommitReport,
    stage: CommitStage,
    processed: usize,
    total: usize,
) -> CommitProgressEvent {
    CommitProgressEvent {
        stage,
        rows_processed: processed,
        rows_total: total,
        inserted: report.inserted,
        updated: report.updated,
        errors: report.errors.len(),
    }
}
