//! Per-(identifier, signer) consensus history.

use dvgate_types::{ConsensusMessageType, Height, Round};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Compact set of message types observed in the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TypeSet(u8);

impl TypeSet {
    fn bit(msg_type: ConsensusMessageType) -> u8 {
        match msg_type {
            ConsensusMessageType::Proposal => 1,
            ConsensusMessageType::Prepare => 1 << 1,
            ConsensusMessageType::Commit => 1 << 2,
            ConsensusMessageType::RoundChange => 1 << 3,
        }
    }

    pub(crate) fn insert(&mut self, msg_type: ConsensusMessageType) {
        self.0 |= Self::bit(msg_type);
    }

    pub(crate) fn contains(&self, msg_type: ConsensusMessageType) -> bool {
        self.0 & Self::bit(msg_type) != 0
    }

    pub(crate) fn clear(&mut self) {
        self.0 = 0;
    }
}

struct MarkState {
    /// Largest round observed from this signer at the current height.
    /// `Round::NONE` until the first message, and again after a height
    /// advance resets the round state.
    highest_round: Round,
    /// When the first message at `highest_round` arrived.
    first_msg_in_round: Option<Instant>,
    /// Message types already seen at `highest_round`.
    types_in_round: TypeSet,

    /// Largest decided height observed, `None` before the first decided.
    highest_decided: Option<Height>,
    /// The two most recent decided observation times; index 0 is the most
    /// recent. Initialized to the mark's creation time.
    last_two_decided: [Instant; 2],
    /// Decided observations recorded at `highest_decided`.
    decided_count: u32,
    /// Largest signer-set cardinality seen at `highest_decided`.
    max_signers: usize,
}

impl MarkState {
    fn reset_for_new_round(&mut self, round: Round, msg_type: ConsensusMessageType, now: Instant) {
        self.highest_round = round;
        self.first_msg_in_round = Some(now);
        self.types_in_round.clear();
        self.types_in_round.insert(msg_type);
    }

    fn record_same_round_type(&mut self, msg_type: ConsensusMessageType) {
        self.types_in_round.insert(msg_type);
    }

    fn shift_decided_time(&mut self, now: Instant) {
        self.last_two_decided[1] = self.last_two_decided[0];
        self.last_two_decided[0] = now;
    }

    /// Time since the decided observation before the most recent one. With
    /// an incoming decided counted at `now`, this spans the last three
    /// observations.
    fn duration_since_prior_decided(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_two_decided[1])
    }
}

/// Bookkeeping record for one (identifier, signer) pair.
///
/// Readers take the shared lock; the writer sections are short and never
/// call out while holding the lock.
pub struct Mark {
    state: RwLock<MarkState>,
    /// Milliseconds since the owning schedule's epoch; drives eviction.
    last_touch: AtomicU64,
}

impl Mark {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            state: RwLock::new(MarkState {
                highest_round: Round::NONE,
                first_msg_in_round: None,
                types_in_round: TypeSet::default(),
                highest_decided: None,
                last_two_decided: [now; 2],
                decided_count: 0,
                max_signers: 0,
            }),
            last_touch: AtomicU64::new(0),
        }
    }

    pub(crate) fn touch(&self, epoch_millis: u64) {
        self.last_touch.store(epoch_millis, Ordering::Relaxed);
    }

    pub(crate) fn last_touch(&self) -> u64 {
        self.last_touch.load(Ordering::Relaxed)
    }

    /// Record a consensus message. Strictly higher rounds reset the round
    /// state; the current round accumulates its message type; stale rounds
    /// are ignored.
    pub(crate) fn record_consensus(
        &self,
        round: Round,
        msg_type: ConsensusMessageType,
        now: Instant,
    ) {
        let mut state = self.state.write();
        if round > state.highest_round {
            state.reset_for_new_round(round, msg_type, now);
        } else if round == state.highest_round {
            state.record_same_round_type(msg_type);
        }
    }

    /// Whether a consensus message at (`round`, `msg_type`) is timely.
    ///
    /// - A higher round is timely once the current round has outlived its
    ///   timeout, so a signer cannot race through rounds.
    /// - The current round admits each message type once.
    /// - Past rounds are never timely.
    pub(crate) fn consensus_timely(
        &self,
        round: Round,
        msg_type: ConsensusMessageType,
        now: Instant,
        round_timeout: impl Fn(Round) -> Duration,
    ) -> bool {
        let state = self.state.read();
        match round.cmp(&state.highest_round) {
            std::cmp::Ordering::Greater => match state.first_msg_in_round {
                None => true,
                Some(first) => now >= first + round_timeout(state.highest_round),
            },
            std::cmp::Ordering::Equal => !state.types_in_round.contains(msg_type),
            std::cmp::Ordering::Less => false,
        }
    }

    /// Record a decided observation. The whole compare-and-update runs under
    /// the write lock, so two concurrent equal-height updates serialize.
    pub(crate) fn record_decided(&self, height: Height, signer_count: usize, now: Instant) {
        let mut state = self.state.write();
        match state.highest_decided {
            Some(current) if height < current => return,
            Some(current) if height == current => {
                state.decided_count += 1;
                if signer_count > state.max_signers {
                    state.max_signers = signer_count;
                }
            }
            _ => {
                // New height: restart the decided tally and release the
                // round state so the next instance starts fresh.
                state.highest_decided = Some(height);
                state.decided_count = 1;
                state.max_signers = signer_count;
                state.highest_round = Round::NONE;
                state.first_msg_in_round = None;
                state.types_in_round.clear();
            }
        }
        state.shift_decided_time(now);
    }

    /// Per-signer decided timeliness. The threshold counts the incoming
    /// observation, so with the default threshold of 2 the beat throttle
    /// engages on the first repeat at a height.
    pub(crate) fn decided_timely(
        &self,
        height: Height,
        now: Instant,
        threshold: u32,
        beat: Duration,
    ) -> bool {
        let state = self.state.read();
        if let Some(current) = state.highest_decided {
            if height < current {
                return false;
            }
        }
        if state.decided_count + 1 >= threshold {
            return state.duration_since_prior_decided(now) >= beat;
        }
        true
    }

    /// Whether this mark proves a strictly stronger commit at `height`.
    pub(crate) fn has_better_commit(&self, height: Height, signer_count: usize) -> bool {
        let state = self.state.read();
        state.highest_decided == Some(height) && state.max_signers > signer_count
    }

    /// Whether this signer has decided, and only below the watermark.
    /// Undecided marks return false: an instance that never decided is left
    /// to LRU eviction instead of retirement.
    pub(crate) fn decided_below(&self, watermark: Height) -> bool {
        let state = self.state.read();
        state.highest_decided.is_some_and(|h| h < watermark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);
    const BEAT: Duration = Duration::from_secs(2);

    fn timeout(_: Round) -> Duration {
        TIMEOUT
    }

    #[test]
    fn type_set_tracks_each_type() {
        let mut set = TypeSet::default();
        assert!(!set.contains(ConsensusMessageType::Prepare));

        set.insert(ConsensusMessageType::Prepare);
        set.insert(ConsensusMessageType::Commit);
        assert!(set.contains(ConsensusMessageType::Prepare));
        assert!(set.contains(ConsensusMessageType::Commit));
        assert!(!set.contains(ConsensusMessageType::Proposal));
        assert!(!set.contains(ConsensusMessageType::RoundChange));

        set.clear();
        assert!(!set.contains(ConsensusMessageType::Prepare));
    }

    #[test]
    fn one_type_per_round() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_consensus(Round::FIRST, ConsensusMessageType::Prepare, now);

        assert!(!mark.consensus_timely(Round::FIRST, ConsensusMessageType::Prepare, now, timeout));
        assert!(mark.consensus_timely(Round::FIRST, ConsensusMessageType::Commit, now, timeout));
    }

    #[test]
    fn round_advance_waits_for_timeout() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_consensus(Round::FIRST, ConsensusMessageType::Prepare, now);

        let early = now + Duration::from_secs(1);
        assert!(!mark.consensus_timely(Round(2), ConsensusMessageType::Prepare, early, timeout));

        let late = now + TIMEOUT;
        assert!(mark.consensus_timely(Round(2), ConsensusMessageType::Prepare, late, timeout));
    }

    #[test]
    fn past_rounds_never_timely() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_consensus(Round(3), ConsensusMessageType::Prepare, now);

        let much_later = now + Duration::from_secs(60);
        assert!(!mark.consensus_timely(
            Round(2),
            ConsensusMessageType::Prepare,
            much_later,
            timeout
        ));
    }

    #[test]
    fn stale_round_not_recorded() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_consensus(Round(3), ConsensusMessageType::Prepare, now);
        mark.record_consensus(Round(2), ConsensusMessageType::Commit, now);

        // A commit at round 3 is still fresh: the stale round-2 commit must
        // not have touched the round-3 type set.
        assert!(mark.consensus_timely(Round(3), ConsensusMessageType::Commit, now, timeout));
    }

    #[test]
    fn decided_stale_height_ignored() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_decided(Height(5), 3, now);
        mark.record_decided(Height(4), 4, now);

        assert!(mark.has_better_commit(Height(5), 2));
        assert!(!mark.has_better_commit(Height(4), 2));
    }

    #[test]
    fn decided_repeat_raises_max_signers() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_decided(Height(5), 3, now);
        mark.record_decided(Height(5), 4, now);

        assert!(mark.has_better_commit(Height(5), 3));
        assert!(!mark.has_better_commit(Height(5), 4));
    }

    #[test]
    fn decided_advance_resets_max_signers() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_decided(Height(5), 4, now);
        mark.record_decided(Height(6), 3, now);

        // The height-5 tally is gone; only height 6 with 3 signers remains.
        assert!(!mark.has_better_commit(Height(5), 2));
        assert!(!mark.has_better_commit(Height(6), 3));
        assert!(mark.has_better_commit(Height(6), 2));
    }

    #[test]
    fn decided_advance_resets_round_state() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_consensus(Round(4), ConsensusMessageType::Prepare, now);
        assert!(!mark.consensus_timely(Round::FIRST, ConsensusMessageType::Prepare, now, timeout));

        mark.record_decided(Height(1), 3, now);
        assert!(mark.consensus_timely(Round::FIRST, ConsensusMessageType::Prepare, now, timeout));
    }

    #[test]
    fn decided_beat_throttles_repeats() {
        let now = Instant::now();
        let mark = Mark::new(now);

        // Fresh mark: first decided is timely.
        assert!(mark.decided_timely(Height(1), now, 2, BEAT));
        mark.record_decided(Height(1), 3, now);

        // Immediate repeat: the prior observation time is the creation
        // instant, so no beat has elapsed.
        assert!(!mark.decided_timely(Height(1), now, 2, BEAT));

        // One beat later the repeat goes through.
        assert!(mark.decided_timely(Height(1), now + BEAT, 2, BEAT));
    }

    #[test]
    fn decided_below_highest_is_too_old() {
        let now = Instant::now();
        let mark = Mark::new(now);
        mark.record_decided(Height(2), 3, now);

        assert!(!mark.decided_timely(Height(1), now + Duration::from_secs(60), 2, BEAT));
    }
}
