//! # lease
//!
//! Offline-operation leases: a station can keep accepting events without a
//! network connection as long as it holds a signed, unexpired lease. Signing
//! and verification are HMAC-SHA256 over a canonical JSON payload, mirroring
//! the audit chain's "sign what you can verify later, never trust bytes off
//! disk" posture.

use chrono::DateTime;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};
use vision_types::{Event, Lease, VisionError};

type HmacSha256 = Hmac<Sha256>;

const MIN_DURATION_HOURS: u32 = 1;
const MAX_DURATION_HOURS: u32 = 100;

/// Issues and verifies [`Lease`] tokens against a shared secret.
pub struct LeaseSigner {
    secret: Vec<u8>,
}

impl LeaseSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    /// Issue a new lease. `duration_hours` must fall within `[1, 100]`.
    pub fn issue(
        &self,
        lease_id: impl Into<String>,
        issued_at: DateTime<Utc>,
        duration_hours: u32,
    ) -> Result<Lease, VisionError> {
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&duration_hours) {
            return Err(VisionError::InvalidLease(format!(
                "duration_hours must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS}, got {duration_hours}"
            )));
        }
        let lease_id = lease_id.into();
        let token = self.sign(&lease_id, issued_at, duration_hours);
        Ok(Lease { lease_id, issued_at, duration_hours, token })
    }

    /// Canonical signing payload: keys sorted alphabetically, matching the
    /// `serde_json::Map`'s default `BTreeMap` backing.
    fn canonical_payload(lease_id: &str, issued_at: DateTime<Utc>, duration_hours: u32) -> String {
        json!({
            "duration_hours": duration_hours,
            "issued_at": issued_at.to_rfc3339(),
            "lease_id": lease_id,
        })
        .to_string()
    }

    fn sign(&self, lease_id: &str, issued_at: DateTime<Utc>, duration_hours: u32) -> String {
        let payload = Self::canonical_payload(lease_id, issued_at, duration_hours);
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recompute the lease's token and compare it against the stored one in
    /// constant time. Returns `false` on any mismatch or malformed hex,
    /// never an error — a bad lease is a policy rejection, not an exception.
    pub fn verify(&self, lease: &Lease) -> bool {
        let payload = Self::canonical_payload(&lease.lease_id, lease.issued_at, lease.duration_hours);
        let Ok(expected) = hex::decode(&lease.token) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

/// Gates event acceptance on holding a signed, unexpired lease, buffering
/// accepted events locally until reconciliation with a central system.
///
/// Buffering happens on *acceptance*, not rejection: an event only enters
/// the buffer once it has already passed both the signature check and the
/// lease window check. Reconciliation re-runs those same two checks against
/// whatever lease is active at that point — which may have been renewed or
/// revoked since the event was buffered — so a previously-accepted event can
/// still come back `rejected` if the lease no longer covers it.
pub struct LeaseEnforcer {
    signer: LeaseSigner,
    lease: Lease,
    buffered: Vec<Event>,
}

impl LeaseEnforcer {
    pub fn new(signer: LeaseSigner, lease: Lease) -> Self {
        Self { signer, lease, buffered: Vec::new() }
    }

    /// Replace the active lease, e.g. on renewal. Rejected if its signature
    /// doesn't verify.
    pub fn set_lease(&mut self, lease: Lease) -> Result<(), VisionError> {
        if !self.signer.verify(&lease) {
            return Err(VisionError::InvalidLease("lease signature does not verify".into()));
        }
        self.lease = lease;
        Ok(())
    }

    fn covered_by_active_lease(&self, event: &Event) -> bool {
        self.signer.verify(&self.lease) && self.lease.is_valid_at(event.timestamp())
    }

    /// Buffer `event` if the active lease's signature verifies and its
    /// window covers the event's timestamp. Returns whether it was buffered.
    pub fn accept_event(&mut self, event: Event) -> bool {
        if !self.covered_by_active_lease(&event) {
            warn!(event_id = %event.event_id(), "event rejected: no valid lease covers it");
            return false;
        }
        info!(event_id = %event.event_id(), "event buffered under active lease");
        self.buffered.push(event);
        true
    }

    /// Re-validate every buffered event against the lease active right now,
    /// partition into `(accepted, rejected)`, and clear the buffer
    /// regardless of outcome. `online_timestamp` is accepted for
    /// logging/future policy but does not affect classification.
    pub fn reconcile_buffered_events(&mut self, online_timestamp: DateTime<Utc>) -> (Vec<Event>, Vec<Event>) {
        info!(%online_timestamp, buffered = self.buffered.len(), "reconciling buffered events");
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for event in std::mem::take(&mut self.buffered) {
            if self.covered_by_active_lease(&event) {
                accepted.push(event);
            } else {
                rejected.push(event);
            }
        }
        (accepted, rejected)
    }

    pub fn buffered_count(&self) -> usize {
        self.buffered.len()
    }
}
