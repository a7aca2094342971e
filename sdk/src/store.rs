//! Client-side auction state.
//!
//! [`AuctionStateStore`] is the canonical view of one auction for one
//! subscriber identity. It is owned by the session loop and mutated only by
//! routed inbound frames and resync seeds, so it needs no locking.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::error::StateError;
use crate::types::{AuctionStatus, BidEvent, Identity, Participant, TimerState, Winner};

/// Maximum number of bids kept in the history.
pub const BID_HISTORY_LIMIT: usize = 10;

/// Authoritative snapshot used to reseed the store after a reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuctionSeed {
    /// Bids, newest first.
    pub bids: Vec<BidEvent>,

    /// Whether bidding is still open.
    pub active: bool,

    /// Winner, when the auction already ended.
    pub winner: Option<Winner>,
}

/// Owned snapshot of the store, published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionView {
    /// Identity the state belongs to.
    pub identity: Option<String>,

    /// Participants in join order.
    pub participants: Vec<Participant>,

    /// Bids, newest first.
    pub bid_history: Vec<BidEvent>,

    /// Countdown.
    pub timer: TimerState,

    /// Lifecycle status.
    pub status: AuctionStatus,

    /// Winner, once ended.
    pub winner: Option<Winner>,
}

impl AuctionView {
    /// Returns the most recent bid.
    #[must_use]
    pub fn latest_bid(&self) -> Option<&BidEvent> {
        self.bid_history.first()
    }
}

/// Canonical client-side auction state.
#[derive(Debug, Clone)]
pub struct AuctionStateStore {
    identity: Identity,
    participants: Vec<Participant>,
    bids: VecDeque<BidEvent>,
    timer: TimerState,
    status: AuctionStatus,
    winner: Option<Winner>,
    // Bids applied since the last resync point, `None` outside a resync.
    live_bids: Option<usize>,
}

impl AuctionStateStore {
    /// Creates an empty store for a subscriber identity.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            participants: Vec::new(),
            bids: VecDeque::with_capacity(BID_HISTORY_LIMIT),
            timer: TimerState::default(),
            status: AuctionStatus::Active,
            winner: None,
            live_bids: None,
        }
    }

    /// Returns the identity this store belongs to.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Returns true if a participant with this ID is present.
    #[must_use]
    pub fn has_participant(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    /// Returns the bid history, newest first.
    pub fn bids(&self) -> impl Iterator<Item = &BidEvent> {
        self.bids.iter()
    }

    /// Returns the number of bids in the history.
    #[must_use]
    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    /// Returns the timer.
    #[must_use]
    pub const fn timer(&self) -> TimerState {
        self.timer
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> AuctionStatus {
        self.status
    }

    /// Returns true once the auction has ended.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.status.is_ended()
    }

    /// Returns the winner, if announced.
    #[must_use]
    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    /// Prepends a bid, evicting the oldest beyond [`BID_HISTORY_LIMIT`].
    ///
    /// The protocol carries no bid ID, so a redelivered bid shows up twice.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AuctionEnded`] once the auction has ended.
    pub fn apply_bid(&mut self, bid: BidEvent) -> Result<(), StateError> {
        self.ensure_active()?;
        self.bids.push_front(bid);
        self.bids.truncate(BID_HISTORY_LIMIT);
        if let Some(live) = self.live_bids.as_mut() {
            *live = (*live + 1).min(BID_HISTORY_LIMIT);
        }
        Ok(())
    }

    /// Inserts a participant, replacing any entry with the same ID.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AuctionEnded`] once the auction has ended.
    pub fn upsert_participant(&mut self, participant: Participant) -> Result<(), StateError> {
        self.ensure_active()?;
        self.participants.retain(|p| p.id != participant.id);
        self.participants.push(participant);
        Ok(())
    }

    /// Removes a participant. Returns false if it was not present.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AuctionEnded`] once the auction has ended.
    pub fn remove_participant(&mut self, id: &str) -> Result<bool, StateError> {
        self.ensure_active()?;
        let before = self.participants.len();
        self.participants.retain(|p| p.id != id);
        let removed = self.participants.len() != before;
        if !removed {
            debug!(participant = id, "remove ignored, participant not present");
        }
        Ok(removed)
    }

    /// Overwrites the remaining seconds with the server value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AuctionEnded`] once the auction has ended.
    pub fn set_remaining(&mut self, seconds: i64) -> Result<(), StateError> {
        self.ensure_active()?;
        self.timer.remaining_seconds = Some(seconds);
        Ok(())
    }

    /// Counts a timer extension. The new remaining time arrives with the next
    /// timer update.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AuctionEnded`] once the auction has ended.
    pub fn record_extension(&mut self) -> Result<(), StateError> {
        self.ensure_active()?;
        self.timer.extension_count = self.timer.extension_count.saturating_add(1);
        Ok(())
    }

    /// Marks the auction as ended.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AuctionEnded`] if it already ended.
    pub fn set_ended(&mut self, winner: Option<Winner>) -> Result<(), StateError> {
        self.ensure_active()?;
        self.status = AuctionStatus::Ended;
        self.winner = winner;
        Ok(())
    }

    /// Marks a resynchronization point after a join on a fresh connection.
    ///
    /// The server does not remember room membership across connections, so
    /// the roster is cleared and rebuilt from later join events. Bids applied
    /// from here on survive the next [`restore`](Self::restore).
    pub fn begin_resync(&mut self) {
        if self.is_ended() {
            return;
        }
        self.participants.clear();
        self.live_bids = Some(0);
    }

    /// Merges an authoritative snapshot into the bid history.
    ///
    /// Bids applied since [`begin_resync`](Self::begin_resync) that the seed
    /// does not contain stay in front of the seed bids. Without a resync
    /// point the seed replaces the history.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AuctionEnded`] once the auction has ended.
    pub fn restore(&mut self, seed: AuctionSeed) -> Result<(), StateError> {
        self.ensure_active()?;
        let live = self.live_bids.take().unwrap_or(0);

        let mut merged: VecDeque<BidEvent> = self
            .bids
            .iter()
            .take(live)
            .filter(|bid| !seed.bids.iter().any(|s| same_bid(s, bid)))
            .cloned()
            .collect();
        merged.extend(seed.bids);
        merged.truncate(BID_HISTORY_LIMIT);
        self.bids = merged;

        if !seed.active {
            self.status = AuctionStatus::Ended;
            self.winner = seed.winner;
        }
        Ok(())
    }

    /// Returns an owned snapshot.
    #[must_use]
    pub fn view(&self) -> AuctionView {
        AuctionView {
            identity: Some(self.identity.to_string()),
            participants: self.participants.clone(),
            bid_history: self.bids.iter().cloned().collect(),
            timer: self.timer,
            status: self.status,
            winner: self.winner.clone(),
        }
    }

    fn ensure_active(&self) -> Result<(), StateError> {
        if self.is_ended() {
            return Err(StateError::AuctionEnded);
        }
        Ok(())
    }
}

// The wire carries no bid ID; REST and WebSocket copies of one bid agree on
// bidder and amount, and on the timestamp when both carry one.
fn same_bid(a: &BidEvent, b: &BidEvent) -> bool {
    let timestamps_agree = match (a.server_timestamp, b.server_timestamp) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    };
    a.bidder_name == b.bidder_name && a.amount == b.amount && timestamps_agree
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;

    fn store() -> AuctionStateStore {
        AuctionStateStore::new(Identity::parse("u1").expect("identity"))
    }

    fn participant(id: &str) -> Participant {
        Participant::new(id, format!("user-{}", id), Utc::now())
    }

    #[test]
    fn test_new_store_is_empty() {
        let s = store();
        assert!(s.participants().is_empty());
        assert_eq!(s.bid_count(), 0);
        assert_eq!(s.status(), AuctionStatus::Active);
        assert!(s.timer().remaining_seconds.is_none());
        assert_eq!(s.identity().as_str(), "u1");
    }

    #[test]
    fn test_bid_history_capped_newest_first() {
        let mut s = store();
        for amount in 1..=15 {
            s.apply_bid(BidEvent::new("alex", amount)).expect("apply");
        }

        assert_eq!(s.bid_count(), BID_HISTORY_LIMIT);
        let amounts: Vec<u64> = s.bids().map(|b| b.amount).collect();
        assert_eq!(amounts, (6..=15).rev().collect::<Vec<u64>>());
        assert_eq!(s.view().latest_bid().map(|b| b.amount), Some(15));
    }

    #[test]
    fn test_duplicate_bid_is_kept() {
        let mut s = store();
        let bid = BidEvent::new("alex", 100);
        s.apply_bid(bid.clone()).expect("apply");
        s.apply_bid(bid).expect("apply");
        assert_eq!(s.bid_count(), 2);
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let mut s = store();
        s.upsert_participant(participant("a")).expect("upsert");
        s.upsert_participant(participant("b")).expect("upsert");
        s.upsert_participant(Participant::new("a", "renamed", Utc::now()))
            .expect("upsert");

        let ids: Vec<&str> = s.participants().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(s.participants()[1].display_name, "renamed");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut s = store();
        s.upsert_participant(participant("a")).expect("upsert");
        s.upsert_participant(participant("b")).expect("upsert");

        assert_eq!(s.remove_participant("a"), Ok(true));
        let once = s.participants().to_vec();
        assert_eq!(s.remove_participant("a"), Ok(false));
        assert_eq!(s.participants(), once.as_slice());
    }

    #[test]
    fn test_join_leave_interleaving_matches_last_event() {
        // (id, joined?) in arrival order.
        let events = [
            ("a", true),
            ("b", true),
            ("a", false),
            ("c", true),
            ("b", true),
            ("c", false),
            ("a", true),
            ("d", false),
            ("c", true),
            ("b", false),
        ];

        let mut s = store();
        let mut last: HashMap<&str, bool> = HashMap::new();
        for (id, joined) in events {
            if joined {
                s.upsert_participant(participant(id)).expect("upsert");
            } else {
                s.remove_participant(id).expect("remove");
            }
            last.insert(id, joined);
        }

        let mut expected: Vec<&str> = last
            .into_iter()
            .filter(|(_, joined)| *joined)
            .map(|(id, _)| id)
            .collect();
        expected.sort_unstable();

        let mut actual: Vec<&str> = s.participants().iter().map(|p| p.id.as_str()).collect();
        actual.sort_unstable();

        assert_eq!(actual, expected);
        assert_eq!(actual, vec!["a", "c"]);
    }

    #[test]
    fn test_set_remaining_is_exact() {
        let mut s = store();
        s.set_remaining(42).expect("set");
        assert_eq!(s.timer().remaining_seconds, Some(42));

        // Server is authoritative; no monotonicity check.
        s.set_remaining(90).expect("set");
        assert_eq!(s.timer().remaining_seconds, Some(90));

        s.set_remaining(-1).expect("set");
        assert_eq!(s.timer().remaining_seconds, Some(-1));
    }

    #[test]
    fn test_record_extension_leaves_remaining() {
        let mut s = store();
        s.set_remaining(5).expect("set");
        s.record_extension().expect("extend");
        assert_eq!(s.timer().remaining_seconds, Some(5));
        assert_eq!(s.timer().extension_count, 1);
    }

    #[test]
    fn test_ended_rejects_further_mutation() {
        let mut s = store();
        s.apply_bid(BidEvent::new("alex", 1)).expect("apply");
        s.set_ended(Some(Winner::new("alex", 1))).expect("end");

        assert_eq!(
            s.apply_bid(BidEvent::new("sam", 2)),
            Err(StateError::AuctionEnded)
        );
        assert_eq!(s.set_remaining(3), Err(StateError::AuctionEnded));
        assert_eq!(s.set_ended(None), Err(StateError::AuctionEnded));
        assert_eq!(s.bid_count(), 1);
        assert_eq!(s.winner().map(|w| w.username.as_str()), Some("alex"));
    }

    #[test]
    fn test_restore_replaces_history() {
        let mut s = store();
        s.apply_bid(BidEvent::new("stale", 1)).expect("apply");

        let seed = AuctionSeed {
            bids: (1..=12).rev().map(|n| BidEvent::new("alex", n)).collect(),
            active: true,
            winner: None,
        };
        s.restore(seed).expect("restore");

        assert_eq!(s.bid_count(), BID_HISTORY_LIMIT);
        assert_eq!(s.bids().next().map(|b| b.amount), Some(12));
        assert!(!s.is_ended());
    }

    #[test]
    fn test_restore_keeps_bids_applied_since_resync() {
        let mut s = store();
        s.apply_bid(BidEvent::new("old", 1)).expect("apply");
        s.begin_resync();
        s.apply_bid(BidEvent::new("alex", 250000)).expect("apply");
        s.apply_bid(BidEvent::new("sam", 300000)).expect("apply");

        // The seed was read after alex's bid was stored but before sam's.
        let seed = AuctionSeed {
            bids: vec![BidEvent::new("alex", 250000), BidEvent::new("kim", 200000)],
            active: true,
            winner: None,
        };
        s.restore(seed).expect("restore");

        let amounts: Vec<u64> = s.bids().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![300000, 250000, 200000]);
    }

    #[test]
    fn test_restore_merge_is_capped() {
        let mut s = store();
        s.begin_resync();
        s.apply_bid(BidEvent::new("sam", 100)).expect("apply");

        let seed = AuctionSeed {
            bids: (1..=12).rev().map(|n| BidEvent::new("alex", n)).collect(),
            active: true,
            winner: None,
        };
        s.restore(seed).expect("restore");

        assert_eq!(s.bid_count(), BID_HISTORY_LIMIT);
        assert_eq!(s.bids().next().map(|b| b.amount), Some(100));
        assert_eq!(s.bids().last().map(|b| b.amount), Some(4));
    }

    #[test]
    fn test_begin_resync_clears_roster() {
        let mut s = store();
        s.upsert_participant(participant("a")).expect("upsert");
        s.apply_bid(BidEvent::new("alex", 5)).expect("apply");

        s.begin_resync();
        assert!(s.participants().is_empty());
        assert_eq!(s.bid_count(), 1);
    }

    #[test]
    fn test_restore_applies_end() {
        let mut s = store();
        let seed = AuctionSeed {
            bids: vec![BidEvent::new("alex", 7)],
            active: false,
            winner: Some(Winner::new("alex", 7)),
        };
        s.restore(seed).expect("restore");
        assert!(s.is_ended());
        assert_eq!(s.view().winner, Some(Winner::new("alex", 7)));
    }

    #[test]
    fn test_view_snapshot() {
        let mut s = store();
        s.upsert_participant(participant("a")).expect("upsert");
        s.apply_bid(BidEvent::new("alex", 5)).expect("apply");

        let view = s.view();
        assert_eq!(view.identity.as_deref(), Some("u1"));
        assert_eq!(view.participants.len(), 1);
        assert_eq!(view.bid_history.len(), 1);
        assert_eq!(view.status, AuctionStatus::Active);
    }
}
