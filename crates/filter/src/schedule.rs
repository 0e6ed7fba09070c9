//! The message schedule: who said what, when.
//!
//! A concurrent two-level map `identifier → signer → Mark`. The outer levels
//! are lock-free hash maps so parallel validation of unrelated instances
//! never contends; each mark carries its own read-write lock for the short
//! mutation sections.
//!
//! The schedule is bounded: beyond `max_entries` the least recently touched
//! marks are evicted. Losing a mark only relaxes the filter back to its
//! first-contact behavior, so eviction is always safe.

use crate::config::FilterConfig;
use crate::mark::Mark;
use crate::metrics;
use dashmap::DashMap;
use dvgate_types::{ConsensusMessageType, Height, MessageId, OperatorId, Round, SignedConsensusMessage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct MessageSchedule {
    /// identifier → signer → mark.
    marks: DashMap<MessageId, DashMap<OperatorId, Arc<Mark>>>,

    /// Live (identifier, signer) entries across both levels.
    entries: AtomicUsize,

    /// Reference instant for last-touch bookkeeping.
    epoch: Instant,

    /// Held by at most one evicting thread; others skip the sweep.
    evict_lock: Mutex<()>,

    config: FilterConfig,
}

impl MessageSchedule {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            marks: DashMap::new(),
            entries: AtomicUsize::new(0),
            epoch: Instant::now(),
            evict_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Number of live (identifier, signer) entries.
    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a consensus message from one signer.
    pub fn mark_consensus(
        &self,
        id: &MessageId,
        signer: OperatorId,
        round: Round,
        msg_type: ConsensusMessageType,
        now: Instant,
    ) {
        let mark = self.fetch_or_create(id, signer, now);
        mark.record_consensus(round, msg_type, now);
    }

    /// Whether a consensus message at (`round`, `msg_type`) from `signer` is
    /// timely. A signer never seen before is always timely.
    pub fn is_consensus_timely(
        &self,
        id: &MessageId,
        signer: OperatorId,
        round: Round,
        msg_type: ConsensusMessageType,
        now: Instant,
    ) -> bool {
        match self.get(id, signer) {
            None => true,
            Some(mark) => {
                mark.consensus_timely(round, msg_type, now, |r| self.config.round_timeout(r))
            }
        }
    }

    /// Record a decided commit: every signer's mark absorbs the observation,
    /// each with the full signer-set size so `max_signers` reflects the
    /// aggregate, not per-signer membership.
    pub fn mark_decided(
        &self,
        id: &MessageId,
        signers: &[OperatorId],
        height: Height,
        now: Instant,
    ) {
        for &signer in signers {
            let mark = self.fetch_or_create(id, signer, now);
            mark.record_decided(height, signers.len(), now);
        }
    }

    /// Whether a decided commit is timely: true if any signer's mark says so.
    pub fn is_decided_timely(
        &self,
        id: &MessageId,
        signers: &[OperatorId],
        height: Height,
        now: Instant,
    ) -> bool {
        signers.iter().any(|&signer| match self.get(id, signer) {
            None => true,
            Some(mark) => mark.decided_timely(
                height,
                now,
                self.config.decided_count_threshold,
                self.config.decided_beat,
            ),
        })
    }

    /// Whether a strictly stronger commit at this commit's height is already
    /// on record for its instance.
    pub fn has_better_message(&self, commit: &SignedConsensusMessage) -> bool {
        let Some(inner) = self.marks.get(&commit.message.identifier) else {
            return false;
        };
        let result = inner
            .iter()
            .any(|entry| entry.value().has_better_commit(commit.message.height, commit.signers.len()));
        result
    }

    /// Drop every instance whose signers have all decided strictly below
    /// `watermark`. Callers derive the watermark from the current duty
    /// height. Returns the number of entries removed.
    pub fn retire_below(&self, watermark: Height) -> usize {
        let retired: Vec<MessageId> = self
            .marks
            .iter()
            .filter(|outer| {
                !outer.value().is_empty()
                    && outer
                        .value()
                        .iter()
                        .all(|entry| entry.value().decided_below(watermark))
            })
            .map(|outer| *outer.key())
            .collect();

        let mut removed = 0;
        for id in retired {
            if let Some((_, inner)) = self.marks.remove(&id) {
                removed += inner.len();
            }
        }
        if removed > 0 {
            self.entries.fetch_sub(removed, Ordering::Relaxed);
            metrics::set_schedule_entries(self.len());
            debug!(removed, watermark = %watermark, "retired decided instances");
        }
        removed
    }

    fn get(&self, id: &MessageId, signer: OperatorId) -> Option<Arc<Mark>> {
        let inner = self.marks.get(id)?;
        let mark = inner.get(&signer)?;
        Some(Arc::clone(mark.value()))
    }

    fn fetch_or_create(&self, id: &MessageId, signer: OperatorId, now: Instant) -> Arc<Mark> {
        let mut created = false;
        let mark = {
            let inner = self.marks.entry(*id).or_default();
            let mark = inner.entry(signer).or_insert_with(|| {
                created = true;
                Arc::new(Mark::new(now))
            });
            Arc::clone(mark.value())
        };
        mark.touch(self.touch_millis(now));

        if created {
            self.entries.fetch_add(1, Ordering::Relaxed);
            metrics::set_schedule_entries(self.len());
            self.evict_if_needed();
        }
        mark
    }

    fn touch_millis(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }

    /// Evict the least recently touched entries once the hard ceiling is hit,
    /// down to 90% of capacity. One thread sweeps; concurrent creators skip.
    fn evict_if_needed(&self) {
        if self.len() <= self.config.max_entries {
            return;
        }
        let Some(_guard) = self.evict_lock.try_lock() else {
            return;
        };

        let target = self.config.max_entries * 9 / 10;
        let mut all: Vec<(MessageId, OperatorId, u64)> = Vec::with_capacity(self.len());
        for outer in self.marks.iter() {
            let id = *outer.key();
            for entry in outer.value().iter() {
                all.push((id, *entry.key(), entry.value().last_touch()));
            }
        }
        all.sort_unstable_by_key(|&(_, _, touch)| touch);

        let mut removed = 0usize;
        for (id, signer, _) in all {
            if self.len() <= target {
                break;
            }
            if let Some(inner) = self.marks.get(&id) {
                if inner.remove(&signer).is_some() {
                    self.entries.fetch_sub(1, Ordering::Relaxed);
                    removed += 1;
                }
            }
        }
        self.marks.retain(|_, inner| !inner.is_empty());

        if removed > 0 {
            metrics::record_schedule_evictions(removed);
            metrics::set_schedule_entries(self.len());
            debug!(removed, live = self.len(), "evicted stale schedule entries");
        }
    }
}
