//! The staged admission pipeline.
//!
//! Stage order is deliberate: every cheap check runs before the signature
//! verification, so an attacker cannot spend our CPU without first getting
//! past decode, share lookup, syntactic shape, and timeliness. The schedule
//! is only updated after a signature verifies.

use crate::clock::Clock;
use crate::metrics;
use crate::schedule::MessageSchedule;
use crate::verdict::{ValidationReason, Verdict};
use crate::verify::SignatureVerifier;
use dvgate_messages::{decode_envelope, decode_signed_message, EnvelopeKind};
use dvgate_registry::ShareStore;
use dvgate_types::{ConsensusMessageType, Share, SignatureKind, SignedConsensusMessage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Validates raw gossip payloads into admission verdicts.
///
/// One validator (with its schedule) is created per gossip subsystem and
/// shared by all worker threads; every dependency is injected.
pub struct MessageValidator {
    schedule: Arc<MessageSchedule>,
    shares: Arc<dyn ShareStore>,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
}

impl MessageValidator {
    pub fn new(
        schedule: Arc<MessageSchedule>,
        shares: Arc<dyn ShareStore>,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedule,
            shares,
            verifier,
            clock,
        }
    }

    pub fn schedule(&self) -> &Arc<MessageSchedule> {
        &self.schedule
    }

    /// Run the full pipeline on one inbound payload.
    ///
    /// Terminates with exactly one verdict for every input. Side effects are
    /// limited to the schedule and only happen on `Accept`.
    pub fn validate(
        &self,
        ctx: &CancellationToken,
        peer: &str,
        topic: &str,
        data: &[u8],
    ) -> Verdict {
        let _active = metrics::active_validation(topic);

        if data.is_empty() {
            return report(ValidationReason::NoData, Verdict::Reject, peer);
        }

        let envelope = match decode_envelope(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(peer, error = %e, "cannot decode envelope");
                return report(ValidationReason::Encoding, Verdict::Reject, peer);
            }
        };

        match envelope.kind {
            EnvelopeKind::Consensus => {}
            // Other kinds are validated by their own subsystems after
            // delivery; the envelope itself decoded, so let them through.
            EnvelopeKind::DecidedSync | EnvelopeKind::PartialSignature => {
                return Verdict::Accept;
            }
        }

        let share = match self.shares.lookup(&envelope.msg_id.validator_public_key()) {
            Ok(Some(share)) => share,
            Ok(None) => {
                debug!(peer, msg_id = %envelope.msg_id, "no share for validator");
                return report(ValidationReason::NoValidator, Verdict::Reject, peer);
            }
            Err(e) => {
                warn!(peer, error = %e, "share store lookup failed");
                return report(ValidationReason::NoValidator, Verdict::Reject, peer);
            }
        };

        let signed = match decode_signed_message(&envelope.data) {
            Ok(signed) => signed,
            Err(e) => {
                debug!(peer, error = %e, "cannot decode signed message");
                return report(ValidationReason::Encoding, Verdict::Reject, peer);
            }
        };

        if let Err(e) = signed.validate() {
            debug!(peer, error = %e, "syntactic check failed");
            return report(ValidationReason::SyntacticCheck, Verdict::Reject, peer);
        }
        if signed.signers.len() > share.committee.len() {
            debug!(
                peer,
                signers = signed.signers.len(),
                committee = share.committee.len(),
                "too many signers"
            );
            return report(ValidationReason::SyntacticCheck, Verdict::Reject, peer);
        }

        // Decided commits propagate across all the instance's topics and get
        // their own throttle; everything else follows the per-round rules.
        if is_decided(&signed, &share) {
            self.validate_decided(ctx, peer, &signed, &share)
        } else {
            self.validate_undecided(ctx, peer, &signed, &share)
        }
    }

    fn validate_undecided(
        &self,
        ctx: &CancellationToken,
        peer: &str,
        signed: &SignedConsensusMessage,
        share: &Share,
    ) -> Verdict {
        let msg = &signed.message;
        // Base validation guarantees at least one signer; the first one is
        // authoritative for round bookkeeping.
        let signer = signed.signers[0];

        if !self.schedule.is_consensus_timely(
            &msg.identifier,
            signer,
            msg.round,
            msg.msg_type,
            self.clock.now(),
        ) {
            debug!(peer, %signer, round = %msg.round, msg_type = %msg.msg_type, "not timely");
            return report(ValidationReason::NotTimely, Verdict::Reject, peer);
        }

        if ctx.is_cancelled() {
            debug!(peer, "validation cancelled before signature verify");
            return Verdict::Ignore;
        }

        if let Err(e) = self.verify_signature(signed, share) {
            debug!(peer, error = %e, msg_type = %msg.msg_type, "invalid signature");
            return report(ValidationReason::InvalidSig, Verdict::Reject, peer);
        }

        self.schedule.mark_consensus(
            &msg.identifier,
            signer,
            msg.round,
            msg.msg_type,
            self.clock.now(),
        );
        report(ValidationReason::Valid, Verdict::Accept, peer)
    }

    fn validate_decided(
        &self,
        ctx: &CancellationToken,
        peer: &str,
        signed: &SignedConsensusMessage,
        share: &Share,
    ) -> Verdict {
        let msg = &signed.message;

        // A stronger commit at this height is already known; withholding the
        // weaker one is safe for consensus, so no peer penalty.
        if self.schedule.has_better_message(signed) {
            debug!(peer, height = %msg.height, signers = signed.signers.len(), "better commit known");
            return report(ValidationReason::BetterMessage, Verdict::Ignore, peer);
        }

        if !self
            .schedule
            .is_decided_timely(&msg.identifier, &signed.signers, msg.height, self.clock.now())
        {
            debug!(peer, height = %msg.height, "decided not timely");
            return report(ValidationReason::NotTimely, Verdict::Reject, peer);
        }

        if let Err(e) = signed.validate_decided(share.quorum()) {
            debug!(peer, error = %e, "decided syntactic check failed");
            return report(ValidationReason::SyntacticCheck, Verdict::Reject, peer);
        }

        if ctx.is_cancelled() {
            debug!(peer, "validation cancelled before signature verify");
            return Verdict::Ignore;
        }

        if let Err(e) = self.verify_signature(signed, share) {
            debug!(peer, error = %e, height = %msg.height, "invalid aggregate signature");
            return report(ValidationReason::InvalidSig, Verdict::Reject, peer);
        }

        self.schedule
            .mark_decided(&msg.identifier, &signed.signers, msg.height, self.clock.now());
        report(ValidationReason::Valid, Verdict::Accept, peer)
    }

    fn verify_signature(
        &self,
        signed: &SignedConsensusMessage,
        share: &Share,
    ) -> Result<(), crate::verify::SignatureError> {
        let _timer = metrics::metrics().signature_verify_seconds.start_timer();
        self.verifier.verify(
            signed,
            share.domain_type,
            SignatureKind::Qbft,
            &share.committee,
        )
    }
}

/// A message is decided iff it is a commit carrying a quorum of signers.
fn is_decided(signed: &SignedConsensusMessage, share: &Share) -> bool {
    signed.message.msg_type == ConsensusMessageType::Commit
        && signed.signers.len() >= share.quorum()
}

fn report(reason: ValidationReason, verdict: Verdict, peer: &str) -> Verdict {
    metrics::record_validation_result(reason);
    debug!(peer, reason = reason.as_label(), %verdict, "validation result");
    verdict
}
