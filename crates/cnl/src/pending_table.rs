//! Incoming interests waiting for data that has not been produced yet.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use cnl_core::{Data, Interest};
use cnl_face::ReplyChannel;

struct PendingEntry {
    interest: Interest,
    reply: Rc<dyn ReplyChannel>,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl PendingEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| now >= t)
    }
}

/// Holds each incoming interest until matching data is attached or the
/// interest's lifetime runs out. Expired entries are purged lazily.
#[derive(Default)]
pub struct PendingIncomingInterestTable {
    entries: RefCell<Vec<PendingEntry>>,
}

impl PendingIncomingInterestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interest received at `now`.
    pub fn add(&self, interest: Interest, reply: Rc<dyn ReplyChannel>, now: Instant) {
        let expires_at = interest.lifetime.map(|lifetime: Duration| now + lifetime);
        tracing::debug!(name = %interest.name, "holding incoming interest");
        self.entries.borrow_mut().push(PendingEntry {
            interest,
            reply,
            expires_at,
        });
    }

    /// Send `data` to every unexpired entry whose name it falls under and
    /// remove those entries. Returns the number of replies sent.
    pub fn satisfy(&self, data: &Data, now: Instant) -> usize {
        let matched: Vec<PendingEntry> = {
            let mut entries = self.entries.borrow_mut();
            let mut matched = Vec::new();
            for i in (0..entries.len()).rev() {
                if entries[i].is_expired(now) {
                    entries.remove(i);
                } else if entries[i].interest.matches_name(&data.name) {
                    matched.push(entries.remove(i));
                }
            }
            matched
        };

        if matched.is_empty() {
            return 0;
        }
        let encoded = data.wire_encode();
        for entry in &matched {
            if let Err(e) = entry.reply.send(&encoded) {
                tracing::warn!(name = %data.name, error = %e, "failed to answer pending interest");
            }
        }
        matched.len()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnl_core::Name;

    #[derive(Default)]
    struct RecordingChannel {
        sent: RefCell<Vec<Vec<u8>>>,
    }

    impl ReplyChannel for RecordingChannel {
        fn send(&self, encoded: &[u8]) -> cnl_face::Result<()> {
            self.sent.borrow_mut().push(encoded.to_vec());
            Ok(())
        }
    }

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_answered_once() {
        let table = PendingIncomingInterestTable::new();
        let channel = Rc::new(RecordingChannel::default());
        let now = Instant::now();
        table.add(
            Interest::new(name("/a/b")).with_lifetime(Duration::from_secs(4)),
            channel.clone(),
            now,
        );

        let data = Data::new(name("/a/b/c")).with_content(&b"x"[..]);
        assert_eq!(table.satisfy(&data, now), 1);
        assert_eq!(table.satisfy(&data, now), 0);
        assert_eq!(channel.sent.borrow().len(), 1);
        assert_eq!(Data::wire_decode(&channel.sent.borrow()[0]).unwrap(), data);
    }

    #[test]
    fn test_expired_entry_dropped_silently() {
        let table = PendingIncomingInterestTable::new();
        let channel = Rc::new(RecordingChannel::default());
        let now = Instant::now();
        table.add(
            Interest::new(name("/a")).with_lifetime(Duration::from_millis(100)),
            channel.clone(),
            now,
        );

        let later = now + Duration::from_millis(100);
        assert_eq!(table.satisfy(&Data::new(name("/a")), later), 0);
        assert!(table.is_empty());
        assert!(channel.sent.borrow().is_empty());
    }

    #[test]
    fn test_non_matching_entry_kept() {
        let table = PendingIncomingInterestTable::new();
        let channel = Rc::new(RecordingChannel::default());
        let now = Instant::now();
        table.add(Interest::new(name("/a")), channel.clone(), now);

        assert_eq!(table.satisfy(&Data::new(name("/b")), now), 0);
        assert_eq!(table.len(), 1);
    }
}
