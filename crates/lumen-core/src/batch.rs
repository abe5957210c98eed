//! The batch coordinator: ordered work items, full and failed-only
//! reprocessing, and the artifact-lifecycle ledger.
//!
//! The coordinator exclusively owns the work-item collection; the pipeline
//! gets copies of inputs and returns values. At most one batch operation
//! (submit, reprocess_all, reprocess_failed) runs at a time. A reentrant
//! call is answered with [`BatchOutcome::Busy`] instead of queuing, so two
//! passes can never race to overwrite the same item's handles. There is no
//! way to cancel an operation once started; only the busy answer guards
//! overlap.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::encoder::HostEncoder;
use crate::formats::{FallbackDecision, OutputFormat};
use crate::pipeline::{run_limited, EncodingPipeline, TranscodeOutcome, TranscodeRequest};
use crate::probe::CapabilityProbe;
use crate::store::{ArtifactHandle, ArtifactStore};

/// One input accepted into a batch.
pub struct BatchInput {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Processing state of a work item.
///
/// An item is exactly one of pending, succeeded, or failed; the variant
/// carries what that state needs, so error and artifact can never coexist.
#[derive(Debug)]
pub enum ItemState {
    Pending,
    Succeeded {
        artifact: ArtifactHandle,
        artifact_size: u64,
        actual: OutputFormat,
        output_name: String,
        fallback: Option<FallbackDecision>,
    },
    Failed {
        reason: String,
    },
}

impl ItemState {
    pub fn is_failed(&self) -> bool {
        matches!(self, ItemState::Failed { .. })
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, ItemState::Succeeded { .. })
    }
}

/// One queued image and its processing state.
#[derive(Debug)]
pub struct WorkItem {
    /// Stable identifier: content-hash prefix plus acceptance sequence
    pub id: String,
    /// Original file name
    pub file_name: String,
    /// Declared input size in bytes
    pub input_size: u64,
    /// Handle to the original input bytes; lives until removal/teardown
    original: ArtifactHandle,
    /// Current processing state
    pub state: ItemState,
}

/// Read-only view of a work item for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: String,
    pub file_name: String,
    pub input_size: u64,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Statistics for one batch operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Items processed in this pass
    pub total: usize,

    /// Items that produced an artifact
    pub succeeded: usize,

    /// Items that ended failed
    pub failed: usize,

    /// Successes that landed on a substituted format
    pub fallbacks: usize,

    /// Wall time of the pass in seconds
    pub total_seconds: f64,

    /// Processing rate in items per second
    pub items_per_second: f64,
}

impl BatchStats {
    fn finish(mut self, elapsed: Duration) -> Self {
        self.total = self.succeeded + self.failed;
        self.total_seconds = elapsed.as_secs_f64();
        self.items_per_second = if self.total_seconds > 0.0 {
            self.total as f64 / self.total_seconds
        } else {
            0.0
        };
        self
    }
}

/// Result of requesting a batch operation.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The operation ran to completion
    Completed(BatchStats),
    /// Another batch operation was already in flight; nothing happened
    Busy,
}

impl BatchOutcome {
    pub fn is_busy(&self) -> bool {
        matches!(self, BatchOutcome::Busy)
    }

    pub fn stats(&self) -> Option<&BatchStats> {
        match self {
            BatchOutcome::Completed(stats) => Some(stats),
            BatchOutcome::Busy => None,
        }
    }
}

/// A `{filename, artifact}` pair for an external packager.
#[derive(Clone)]
pub struct ExportEntry {
    pub filename: String,
    pub bytes: Arc<Vec<u8>>,
    pub media_type: String,
}

/// Called after each completed item with `(completed, total)`.
pub type ProgressHook = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Releases the busy flag when a batch operation leaves scope.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the ordered work-item collection and drives processing passes.
pub struct BatchCoordinator {
    pipeline: EncodingPipeline,
    probe: Arc<CapabilityProbe>,
    store: ArtifactStore,
    items: Mutex<Vec<WorkItem>>,
    busy: AtomicBool,
    sequence: AtomicU64,
    concurrency: usize,
    progress: Option<ProgressHook>,
}

impl BatchCoordinator {
    /// Create a coordinator around a host encoder.
    ///
    /// The capability probe is constructed here, once, and shared by every
    /// pipeline invocation: all items in all passes see one snapshot.
    pub fn new(encoder: Arc<dyn HostEncoder>, concurrency: usize) -> Self {
        let probe = Arc::new(CapabilityProbe::new(Arc::clone(&encoder)));
        Self {
            pipeline: EncodingPipeline::new(encoder, Arc::clone(&probe)),
            probe,
            store: ArtifactStore::new(),
            items: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            concurrency,
            progress: None,
        }
    }

    /// Install a per-item completion hook (progress reporting).
    pub fn on_progress(&mut self, hook: ProgressHook) {
        self.progress = Some(hook);
    }

    /// The shared capability probe, for format-support display.
    pub fn probe(&self) -> &Arc<CapabilityProbe> {
        &self.probe
    }

    /// The shared artifact store (read access, ledger accounting).
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Accept inputs, process them, and append them to the collection.
    pub async fn submit(
        &self,
        inputs: Vec<BatchInput>,
        format: OutputFormat,
        quality: f32,
    ) -> BatchOutcome {
        let Some(_guard) = self.try_begin("submit") else {
            return BatchOutcome::Busy;
        };
        let start = Instant::now();

        let mut requests = Vec::with_capacity(inputs.len());
        {
            let mut items = self.items.lock().await;
            for input in inputs {
                let id = self.next_id(&input.bytes);
                let input_size = input.bytes.len() as u64;
                let original = self.store.insert(input.bytes, "application/octet-stream");
                let bytes = match self.store.get(original) {
                    Some(stored) => stored.bytes,
                    None => Arc::new(Vec::new()),
                };
                requests.push((
                    id.clone(),
                    TranscodeRequest {
                        bytes,
                        file_name: input.file_name.clone(),
                        format,
                        quality,
                    },
                ));
                items.push(WorkItem {
                    id,
                    file_name: input.file_name,
                    input_size,
                    original,
                    state: ItemState::Pending,
                });
            }
        }

        tracing::info!(count = requests.len(), %format, "batch submit");
        let outcomes = self.run_pipeline(&requests).await;
        BatchOutcome::Completed(self.apply_outcomes(outcomes, start).await)
    }

    /// Rerun every item with the given settings, in place.
    pub async fn reprocess_all(&self, format: OutputFormat, quality: f32) -> BatchOutcome {
        let Some(_guard) = self.try_begin("reprocess_all") else {
            return BatchOutcome::Busy;
        };
        let start = Instant::now();

        let requests = self.requests_for(format, quality, |_| true).await;
        tracing::info!(count = requests.len(), %format, "reprocessing all items");
        let outcomes = self.run_pipeline(&requests).await;
        BatchOutcome::Completed(self.apply_outcomes(outcomes, start).await)
    }

    /// Rerun only the currently-failed items with the given settings.
    ///
    /// With no failed items this is a strict no-op: no pipeline
    /// invocations, collection untouched.
    pub async fn reprocess_failed(&self, format: OutputFormat, quality: f32) -> BatchOutcome {
        let Some(_guard) = self.try_begin("reprocess_failed") else {
            return BatchOutcome::Busy;
        };
        let start = Instant::now();

        let requests = self
            .requests_for(format, quality, |item| item.state.is_failed())
            .await;
        if requests.is_empty() {
            return BatchOutcome::Completed(BatchStats::default());
        }

        tracing::info!(count = requests.len(), %format, "retrying failed items");
        let outcomes = self.run_pipeline(&requests).await;
        BatchOutcome::Completed(self.apply_outcomes(outcomes, start).await)
    }

    /// Detach one item and release its handles. Unknown ids are a no-op;
    /// a second removal can never double-release.
    pub async fn remove(&self, id: &str) -> bool {
        let mut items = self.items.lock().await;
        let Some(position) = items.iter().position(|item| item.id == id) else {
            return false;
        };
        let item = items.remove(position);
        drop(items);

        self.store.release(item.original);
        if let ItemState::Succeeded { artifact, .. } = item.state {
            self.store.release(artifact);
        }
        tracing::debug!(%id, "item removed");
        true
    }

    /// Release everything. The collection is empty afterwards.
    pub async fn clear(&self) {
        let mut items = self.items.lock().await;
        for item in items.drain(..) {
            self.store.release(item.original);
            if let ItemState::Succeeded { artifact, .. } = item.state {
                self.store.release(artifact);
            }
        }
    }

    /// Number of items in the collection.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Number of items currently failed.
    pub async fn failed_count(&self) -> usize {
        self.items
            .lock()
            .await
            .iter()
            .filter(|item| item.state.is_failed())
            .count()
    }

    /// Ordered read-only views for display.
    pub async fn snapshots(&self) -> Vec<ItemSnapshot> {
        self.items
            .lock()
            .await
            .iter()
            .map(|item| match &item.state {
                ItemState::Pending => ItemSnapshot {
                    id: item.id.clone(),
                    file_name: item.file_name.clone(),
                    input_size: item.input_size,
                    status: ItemStatus::Pending,
                    error: None,
                    fallback: None,
                    actual_format: None,
                    artifact_size: None,
                    output_name: None,
                },
                ItemState::Succeeded {
                    artifact_size,
                    actual,
                    output_name,
                    fallback,
                    ..
                } => ItemSnapshot {
                    id: item.id.clone(),
                    file_name: item.file_name.clone(),
                    input_size: item.input_size,
                    status: ItemStatus::Succeeded,
                    error: None,
                    fallback: fallback.clone(),
                    actual_format: Some(*actual),
                    artifact_size: Some(*artifact_size),
                    output_name: Some(output_name.clone()),
                },
                ItemState::Failed { reason } => ItemSnapshot {
                    id: item.id.clone(),
                    file_name: item.file_name.clone(),
                    input_size: item.input_size,
                    status: ItemStatus::Failed,
                    error: Some(reason.clone()),
                    fallback: None,
                    actual_format: None,
                    artifact_size: None,
                    output_name: None,
                },
            })
            .collect()
    }

    /// `{filename, artifact}` pairs for every succeeded item, in order.
    /// Archive packaging and delivery happen outside the coordinator.
    pub async fn export_pairs(&self) -> Vec<ExportEntry> {
        let items = self.items.lock().await;
        items
            .iter()
            .filter_map(|item| match &item.state {
                ItemState::Succeeded {
                    artifact,
                    output_name,
                    ..
                } => self.store.get(*artifact).map(|stored| ExportEntry {
                    filename: output_name.clone(),
                    bytes: stored.bytes,
                    media_type: stored.media_type,
                }),
                _ => None,
            })
            .collect()
    }

    // ── internals ──

    fn try_begin(&self, operation: &str) -> Option<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(BusyGuard(&self.busy))
        } else {
            tracing::warn!(operation, "batch operation already in flight, call ignored");
            None
        }
    }

    fn next_id(&self, bytes: &[u8]) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let digest = blake3::hash(bytes).to_hex();
        format!("{}-{sequence:04}", &digest.as_str()[..12])
    }

    /// Build pipeline requests for items matching `filter`, copying what
    /// the pipeline needs so it never touches shared state.
    async fn requests_for(
        &self,
        format: OutputFormat,
        quality: f32,
        filter: impl Fn(&WorkItem) -> bool,
    ) -> Vec<(String, TranscodeRequest)> {
        let items = self.items.lock().await;
        items
            .iter()
            .filter(|item| filter(item))
            .filter_map(|item| {
                let stored = self.store.get(item.original)?;
                Some((
                    item.id.clone(),
                    TranscodeRequest {
                        bytes: stored.bytes,
                        file_name: item.file_name.clone(),
                        format,
                        quality,
                    },
                ))
            })
            .collect()
    }

    async fn run_pipeline(
        &self,
        requests: &[(String, TranscodeRequest)],
    ) -> Vec<(String, TranscodeOutcome)> {
        let completed = AtomicUsize::new(0);
        let total = requests.len();
        let completed = &completed;

        run_limited(requests, self.concurrency, |(id, request), _| {
            let id = id.clone();
            let request = request.clone();
            async move {
                let outcome = self.pipeline.transcode(&request).await;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(hook) = &self.progress {
                    hook(done, total);
                }
                (id, outcome)
            }
        })
        .await
    }

    /// Write outcomes back into the collection by item identity,
    /// releasing each superseded artifact handle before overwriting it.
    /// The original-input handle is never touched here.
    async fn apply_outcomes(
        &self,
        outcomes: Vec<(String, TranscodeOutcome)>,
        start: Instant,
    ) -> BatchStats {
        let mut stats = BatchStats::default();
        let mut items = self.items.lock().await;

        for (id, outcome) in outcomes {
            // An item removed mid-run has no slot anymore; its outcome's
            // artifact was never stored, so nothing leaks.
            let Some(item) = items.iter_mut().find(|item| item.id == id) else {
                continue;
            };

            if let ItemState::Succeeded { artifact, .. } = &item.state {
                self.store.release(*artifact);
            }

            item.state = match outcome {
                TranscodeOutcome::Succeeded {
                    artifact,
                    actual,
                    output_name,
                    fallback,
                } => {
                    stats.succeeded += 1;
                    if fallback.is_some() {
                        stats.fallbacks += 1;
                    }
                    let artifact_size = artifact.len() as u64;
                    let handle = self.store.insert(artifact.bytes, artifact.media_type);
                    ItemState::Succeeded {
                        artifact: handle,
                        artifact_size,
                        actual,
                        output_name,
                        fallback,
                    }
                }
                TranscodeOutcome::Failed { reason } => {
                    stats.failed += 1;
                    tracing::warn!(%id, name = %item.file_name, %reason, "item failed");
                    ItemState::Failed { reason }
                }
            };
        }

        let stats = stats.finish(start.elapsed());
        tracing::info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            fallbacks = stats.fallbacks,
            elapsed_s = stats.total_seconds,
            "batch pass complete"
        );
        stats
    }
}

impl Drop for BatchCoordinator {
    fn drop(&mut self) {
        // Teardown discharges every outstanding handle obligation.
        let items = self.items.get_mut();
        for item in items.drain(..) {
            self.store.release(item.original);
            if let ItemState::Succeeded { artifact, .. } = item.state {
                self.store.release(artifact);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEncoder;

    fn coordinator_with(encoder: MockEncoder, concurrency: usize) -> BatchCoordinator {
        BatchCoordinator::new(Arc::new(encoder), concurrency)
    }

    fn inputs(count: usize) -> Vec<BatchInput> {
        (0..count)
            .map(|i| BatchInput {
                file_name: format!("image_{i}.png"),
                bytes: vec![i as u8 + 1; 32],
            })
            .collect()
    }

    const ALL: &[OutputFormat] = &[
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::WebP,
        OutputFormat::Avif,
    ];

    #[tokio::test]
    async fn test_submit_five_items_limit_four() {
        // All succeed, no fallback records, results in submission order.
        let coordinator = coordinator_with(MockEncoder::supporting(ALL).with_jitter(1..10), 4);

        let outcome = coordinator
            .submit(inputs(5), OutputFormat::WebP, 0.8)
            .await;
        let stats = outcome.stats().expect("completed").clone();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.succeeded, 5);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.fallbacks, 0);

        let snapshots = coordinator.snapshots().await;
        assert_eq!(snapshots.len(), 5);
        for (i, snapshot) in snapshots.iter().enumerate() {
            assert_eq!(snapshot.file_name, format!("image_{i}.png"));
            assert_eq!(snapshot.status, ItemStatus::Succeeded);
            assert!(snapshot.fallback.is_none());
            assert_eq!(snapshot.actual_format, Some(OutputFormat::WebP));
            assert_eq!(
                snapshot.output_name.as_deref().unwrap(),
                format!("image_{i}.webp")
            );
        }

        // Ledger: one original plus one artifact per item.
        assert_eq!(coordinator.store().live_count(), 10);
    }

    #[tokio::test]
    async fn test_submit_records_fallback_decisions() {
        let coordinator = coordinator_with(
            MockEncoder::supporting(&[OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP]),
            2,
        );

        let outcome = coordinator
            .submit(inputs(3), OutputFormat::Avif, 0.8)
            .await;
        assert_eq!(outcome.stats().unwrap().fallbacks, 3);

        for snapshot in coordinator.snapshots().await {
            let fallback = snapshot.fallback.expect("fallback recorded");
            assert_eq!(fallback.requested, OutputFormat::Avif);
            assert_eq!(fallback.actual, OutputFormat::WebP);
            assert_eq!(snapshot.actual_format, Some(OutputFormat::WebP));
        }
    }

    #[tokio::test]
    async fn test_failed_items_carry_reason_only() {
        let coordinator =
            coordinator_with(MockEncoder::supporting(ALL).with_decode_failure(), 2);

        let outcome = coordinator
            .submit(inputs(2), OutputFormat::WebP, 0.8)
            .await;
        assert_eq!(outcome.stats().unwrap().failed, 2);

        for snapshot in coordinator.snapshots().await {
            assert_eq!(snapshot.status, ItemStatus::Failed);
            assert!(snapshot.error.unwrap().contains("Decode error"));
            assert!(snapshot.artifact_size.is_none());
        }

        // Only the originals are held for failed items.
        assert_eq!(coordinator.store().live_count(), 2);
    }

    #[tokio::test]
    async fn test_reprocess_all_replaces_handles_in_place() {
        let coordinator = coordinator_with(MockEncoder::supporting(ALL), 2);
        coordinator
            .submit(inputs(3), OutputFormat::WebP, 0.8)
            .await;

        let before: Vec<String> = coordinator
            .snapshots()
            .await
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(coordinator.store().live_count(), 6);

        let outcome = coordinator.reprocess_all(OutputFormat::Png, 0.8).await;
        assert_eq!(outcome.stats().unwrap().succeeded, 3);

        let after = coordinator.snapshots().await;
        let after_ids: Vec<String> = after.iter().map(|s| s.id.clone()).collect();
        // Identity and position preserved.
        assert_eq!(before, after_ids);
        for snapshot in &after {
            assert_eq!(snapshot.actual_format, Some(OutputFormat::Png));
            assert!(snapshot.output_name.as_ref().unwrap().ends_with(".png"));
        }

        // Old artifacts were released before their replacements landed.
        assert_eq!(coordinator.store().live_count(), 6);
    }

    #[tokio::test]
    async fn test_reprocess_failed_with_zero_failed_is_noop() {
        let encoder = Arc::new(MockEncoder::supporting(ALL));
        let coordinator = BatchCoordinator::new(
            Arc::clone(&encoder) as Arc<dyn HostEncoder>,
            2,
        );
        coordinator
            .submit(inputs(3), OutputFormat::WebP, 0.8)
            .await;

        let decodes_before = encoder.decode_calls();
        let live_before = coordinator.store().live_count();

        let outcome = coordinator.reprocess_failed(OutputFormat::Png, 0.8).await;
        let stats = outcome.stats().unwrap();
        assert_eq!(stats.total, 0);

        // No pipeline invocations, collection untouched.
        assert_eq!(encoder.decode_calls(), decodes_before);
        assert_eq!(coordinator.store().live_count(), live_before);
        for snapshot in coordinator.snapshots().await {
            assert_eq!(snapshot.actual_format, Some(OutputFormat::WebP));
        }
    }

    #[tokio::test]
    async fn test_reprocess_failed_touches_only_failed_items() {
        // Empty bytes fail decode, non-empty succeed: one of each.
        let coordinator = coordinator_with(MockEncoder::supporting(ALL), 2);
        let mixed = vec![
            BatchInput {
                file_name: "good.png".to_string(),
                bytes: vec![1; 16],
            },
            BatchInput {
                file_name: "bad.png".to_string(),
                bytes: Vec::new(),
            },
        ];
        coordinator.submit(mixed, OutputFormat::WebP, 0.8).await;
        assert_eq!(coordinator.failed_count().await, 1);

        let good_artifact_before = coordinator.snapshots().await[0].artifact_size;

        let outcome = coordinator.reprocess_failed(OutputFormat::WebP, 0.8).await;
        let stats = outcome.stats().unwrap();
        assert_eq!(stats.total, 1);
        // Empty bytes still fail; the succeeded sibling was untouched.
        assert_eq!(stats.failed, 1);
        let snapshots = coordinator.snapshots().await;
        assert_eq!(snapshots[0].artifact_size, good_artifact_before);
        assert_eq!(snapshots[1].status, ItemStatus::Failed);
    }

    #[tokio::test]
    async fn test_remove_releases_handles_exactly_once() {
        let coordinator = coordinator_with(MockEncoder::supporting(ALL), 2);
        coordinator
            .submit(inputs(2), OutputFormat::WebP, 0.8)
            .await;
        assert_eq!(coordinator.store().live_count(), 4);

        let id = coordinator.snapshots().await[0].id.clone();
        assert!(coordinator.remove(&id).await);
        assert_eq!(coordinator.store().live_count(), 2);
        assert_eq!(coordinator.len().await, 1);

        // Second removal of the same id: no-op, no double release.
        assert!(!coordinator.remove(&id).await);
        assert_eq!(coordinator.store().live_count(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_operations_second_is_busy() {
        // Two reprocess_all calls in rapid succession: one wins, one is Busy.
        let coordinator =
            coordinator_with(MockEncoder::supporting(ALL).with_jitter(5..15), 2);
        coordinator
            .submit(inputs(4), OutputFormat::WebP, 0.8)
            .await;

        let (first, second) = tokio::join!(
            coordinator.reprocess_all(OutputFormat::Png, 0.8),
            coordinator.reprocess_all(OutputFormat::Jpeg, 0.8),
        );

        let busy_count = [&first, &second].iter().filter(|o| o.is_busy()).count();
        assert_eq!(busy_count, 1);

        // Exactly one pass ran: one original + one artifact per item.
        assert_eq!(coordinator.store().live_count(), 8);
    }

    #[tokio::test]
    async fn test_export_pairs_only_succeeded_items() {
        let coordinator = coordinator_with(MockEncoder::supporting(ALL), 2);
        let mixed = vec![
            BatchInput {
                file_name: "good.png".to_string(),
                bytes: vec![1; 16],
            },
            BatchInput {
                file_name: "bad.png".to_string(),
                bytes: Vec::new(),
            },
        ];
        coordinator.submit(mixed, OutputFormat::Jpeg, 0.8).await;

        let pairs = coordinator.export_pairs().await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].filename, "good.jpg");
        assert_eq!(pairs[0].media_type, "image/jpeg");
        assert!(!pairs[0].bytes.is_empty());
    }

    #[tokio::test]
    async fn test_clear_balances_ledger() {
        let coordinator = coordinator_with(MockEncoder::supporting(ALL), 2);
        coordinator
            .submit(inputs(3), OutputFormat::WebP, 0.8)
            .await;
        coordinator.reprocess_all(OutputFormat::Png, 0.8).await;
        assert!(coordinator.store().live_count() > 0);

        coordinator.clear().await;
        assert_eq!(coordinator.store().live_count(), 0);
        assert!(coordinator.is_empty().await);
    }

    #[tokio::test]
    async fn test_ids_are_stable_and_unique() {
        let coordinator = coordinator_with(MockEncoder::supporting(ALL), 2);
        // Identical bytes in two items must still get distinct ids.
        let twins = vec![
            BatchInput {
                file_name: "a.png".to_string(),
                bytes: vec![7; 8],
            },
            BatchInput {
                file_name: "b.png".to_string(),
                bytes: vec![7; 8],
            },
        ];
        coordinator.submit(twins, OutputFormat::WebP, 0.8).await;

        let snapshots = coordinator.snapshots().await;
        assert_ne!(snapshots[0].id, snapshots[1].id);
        // Same content prefix, different sequence suffix.
        assert_eq!(
            snapshots[0].id.split('-').next(),
            snapshots[1].id.split('-').next()
        );
    }

    #[tokio::test]
    async fn test_progress_hook_sees_every_item() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut coordinator = coordinator_with(MockEncoder::supporting(ALL), 2);
        let seen_hook = Arc::clone(&seen);
        coordinator.on_progress(Arc::new(move |done, total| {
            seen_hook.lock().unwrap().push((done, total));
        }));

        coordinator
            .submit(inputs(4), OutputFormat::WebP, 0.8)
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|(_, total)| *total == 4));
        assert!(seen.iter().any(|(done, _)| *done == 4));
    }
}
