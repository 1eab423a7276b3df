// 🔀 Dual-Mode Event Processor - apply now vs. persist-then-replay
//
// Both lanes are folds over the same immutable baseline and the same ordered
// events; neither touches the other's state.
//
//   real-time: for each event → before, apply, after, audit      (Idle → Applying → Logged)
//   batch:     ingest all events to the durable log (fsync)       (phase 1)
//              job_start, replay log: before, apply, after, audit (phase 2)
//              job_end
//
// Started from the same baseline with the same events, both lanes must end in
// identical records.

use crate::audit::{AuditLogEntry, AuditSink, BatchJobMarker, Lane};
use crate::error::Result;
use crate::events::{apply, check_order, check_order_from, UpdateEvent};
use crate::model::GoldenRecord;
use crate::wal::{EventLog, IngestReceipt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::thread;
use tracing::{debug, info, warn};

// ============================================================================
// OUTCOMES
// ============================================================================

/// End state of one lane plus its audit entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneOutcome {
    pub lane: Lane,
    pub final_state: GoldenRecord,
    pub entries: Vec<AuditLogEntry>,
    /// Batch lane only: wall-clock job brackets
    pub job_started_at: Option<DateTime<Utc>>,
    pub job_ended_at: Option<DateTime<Utc>>,
}

impl LaneOutcome {
    pub fn events_applied(&self) -> usize {
        self.entries.len()
    }
}

/// Fingerprint comparison of the two lanes' final records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub realtime_fingerprint: String,
    pub batch_fingerprint: String,
    pub converged: bool,
    pub events_applied: usize,
}

impl ConvergenceReport {
    pub fn compare(realtime: &LaneOutcome, batch: &LaneOutcome) -> Result<Self> {
        let realtime_fingerprint = realtime.final_state.fingerprint()?;
        let batch_fingerprint = batch.final_state.fingerprint()?;
        let converged =
            realtime_fingerprint == batch_fingerprint && realtime.final_state == batch.final_state;

        Ok(ConvergenceReport {
            realtime_fingerprint,
            batch_fingerprint,
            converged,
            events_applied: realtime.events_applied(),
        })
    }

    pub fn summary(&self) -> String {
        if self.converged {
            format!(
                "Lanes converged after {} events (sha256 {})",
                self.events_applied,
                &self.realtime_fingerprint[..12.min(self.realtime_fingerprint.len())]
            )
        } else {
            format!(
                "Lanes DIVERGED after {} events: real-time {} vs batch {}",
                self.events_applied, self.realtime_fingerprint, self.batch_fingerprint
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualModeOutcome {
    pub realtime: LaneOutcome,
    pub batch: LaneOutcome,
    pub report: ConvergenceReport,
}

// ============================================================================
// PROCESSOR
// ============================================================================

pub struct DualModeEventProcessor {
    event_log: EventLog,
}

impl DualModeEventProcessor {
    pub fn new(event_log: EventLog) -> Self {
        DualModeEventProcessor { event_log }
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Real-time lane: apply each event immediately, audit as it goes
    pub fn run_realtime(
        &self,
        baseline: &GoldenRecord,
        events: &[UpdateEvent],
        sink: &mut dyn AuditSink,
    ) -> Result<LaneOutcome> {
        check_order_from(baseline.updated_at, events)?;
        info!(events = events.len(), "real-time lane started");

        let (final_state, entries) = fold_lane(Lane::RealTime, baseline, events, sink)?;
        sink.flush()?;

        info!(events = entries.len(), "real-time lane finished");
        Ok(LaneOutcome {
            lane: Lane::RealTime,
            final_state,
            entries,
            job_started_at: None,
            job_ended_at: None,
        })
    }

    /// Batch phase 1: durably persist the whole sequence
    pub fn ingest(&self, events: &[UpdateEvent]) -> Result<IngestReceipt> {
        check_order(events)?;
        self.event_log.ingest(events)
    }

    /// Batch phase 2: replay a committed log against the baseline as one job
    pub fn replay(
        &self,
        baseline: &GoldenRecord,
        receipt: &IngestReceipt,
        sink: &mut dyn AuditSink,
    ) -> Result<LaneOutcome> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let started = Utc::now();
        sink.job_marker(&BatchJobMarker::Start {
            job_id: job_id.clone(),
            at: started,
            log_path: receipt.path().to_path_buf(),
        })?;
        info!(job_id = %job_id, log = %receipt.path().display(), "batch job started");

        let events = self.event_log.replay(receipt)?;
        check_order_from(baseline.updated_at, &events)?;
        let (final_state, entries) = fold_lane(Lane::Batch, baseline, &events, sink)?;

        let ended = Utc::now();
        sink.job_marker(&BatchJobMarker::End {
            job_id: job_id.clone(),
            at: ended,
            final_state: final_state.clone(),
        })?;
        sink.flush()?;
        info!(job_id = %job_id, events = entries.len(), "batch job finished");

        Ok(LaneOutcome {
            lane: Lane::Batch,
            final_state,
            entries,
            job_started_at: Some(started),
            job_ended_at: Some(ended),
        })
    }

    /// Batch lane end to end: ingest must commit before replay begins
    pub fn run_batch(
        &self,
        baseline: &GoldenRecord,
        events: &[UpdateEvent],
        sink: &mut dyn AuditSink,
    ) -> Result<LaneOutcome> {
        check_order_from(baseline.updated_at, events)?;
        let receipt = self.ingest(events)?;
        self.replay(baseline, &receipt, sink)
    }

    /// Run both lanes concurrently on their own threads and compare the results
    pub fn run<R, B>(
        &self,
        baseline: &GoldenRecord,
        events: &[UpdateEvent],
        realtime_sink: &mut R,
        batch_sink: &mut B,
    ) -> Result<DualModeOutcome>
    where
        R: AuditSink + Send,
        B: AuditSink + Send,
    {
        check_order_from(baseline.updated_at, events)?;

        let (realtime, batch) = thread::scope(|scope| {
            let rt = scope.spawn(|| self.run_realtime(baseline, events, realtime_sink));
            let bt = scope.spawn(|| self.run_batch(baseline, events, batch_sink));
            (join_lane(rt), join_lane(bt))
        });
        let (realtime, batch) = (realtime?, batch?);

        let report = ConvergenceReport::compare(&realtime, &batch)?;
        if report.converged {
            info!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
        }

        Ok(DualModeOutcome {
            realtime,
            batch,
            report,
        })
    }
}

fn join_lane(handle: thread::ScopedJoinHandle<'_, Result<LaneOutcome>>) -> Result<LaneOutcome> {
    match handle.join() {
        Ok(outcome) => outcome,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Shared per-lane loop: snapshot before, apply, snapshot after, audit
fn fold_lane(
    lane: Lane,
    baseline: &GoldenRecord,
    events: &[UpdateEvent],
    sink: &mut dyn AuditSink,
) -> Result<(GoldenRecord, Vec<AuditLogEntry>)> {
    let mut state = baseline.clone();
    let mut entries = Vec::with_capacity(events.len());

    for event in events {
        let after = apply(&state, event)?;
        let entry = AuditLogEntry::new(lane, event, state, after.clone());
        sink.record(&entry)?;
        debug!(lane = lane.as_str(), op = %entry.summary, "event applied");

        entries.push(entry);
        state = after;
    }

    Ok((state, entries))
}

// ============================================================================
// TESTS
// ============================================================================
