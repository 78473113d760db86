//! Re-expression with exponential backoff.
//!
//! A single interest is bounded by its own lifetime. When a caller is willing
//! to wait longer than that, the interest is re-expressed after each timeout
//! with double the previous lifetime, capped so that the total never exceeds
//! `max_lifetime` measured from the first expression. Only the final timeout
//! reaches the caller's `on_timeout`.

use std::rc::Rc;
use std::time::{Duration, Instant};

use cnl_core::{Interest, DEFAULT_INTEREST_LIFETIME};

use crate::error::Result;
use crate::face::{Face, OnData, OnNack, OnTimeout};

struct Backoff {
    face: Rc<dyn Face>,
    started: Instant,
    max_lifetime: Duration,
    on_data: OnData,
    on_timeout: OnTimeout,
    on_nack: OnNack,
}

impl Backoff {
    fn express(self: Rc<Self>, interest: Interest) -> Result<u64> {
        let this = Rc::clone(&self);
        let on_timeout: OnTimeout = Rc::new(move |expired: &Interest| {
            Rc::clone(&this).retry(expired);
        });
        self.face.express_interest(
            &interest,
            Rc::clone(&self.on_data),
            on_timeout,
            Rc::clone(&self.on_nack),
        )
    }

    fn retry(self: Rc<Self>, expired: &Interest) {
        let elapsed = self.face.now().saturating_duration_since(self.started);
        let remaining = self.max_lifetime.saturating_sub(elapsed);
        if remaining.is_zero() {
            tracing::debug!(name = %expired.name, "interest timed out");
            (self.on_timeout)(expired);
            return;
        }

        let previous = expired.lifetime.unwrap_or(DEFAULT_INTEREST_LIFETIME);
        let lifetime = previous.saturating_mul(2).min(remaining);
        tracing::debug!(
            name = %expired.name,
            lifetime_ms = lifetime.as_millis() as u64,
            "re-expressing interest"
        );

        let on_timeout = Rc::clone(&self.on_timeout);
        let interest = expired.clone().with_lifetime(lifetime);
        if let Err(e) = self.express(interest) {
            tracing::warn!(name = %expired.name, error = %e, "re-expression failed");
            on_timeout(expired);
        }
    }
}

/// Express `interest`, re-expressing on timeout until `max_lifetime` has
/// elapsed. The first lifetime is the interest's own (or the default),
/// capped at `max_lifetime`.
///
/// The returned id identifies the first expression only.
pub fn express_with_backoff(
    face: Rc<dyn Face>,
    interest: &Interest,
    max_lifetime: Duration,
    on_data: OnData,
    on_timeout: OnTimeout,
    on_nack: OnNack,
) -> Result<u64> {
    let lifetime = interest
        .lifetime
        .unwrap_or(DEFAULT_INTEREST_LIFETIME)
        .min(max_lifetime);
    let backoff = Rc::new(Backoff {
        started: face.now(),
        face,
        max_lifetime,
        on_data,
        on_timeout,
        on_nack,
    });
    backoff.express(interest.clone().with_lifetime(lifetime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{NetworkNack, ReplyChannel};
    use crate::memory::MemoryNetwork;
    use cnl_core::{Data, Name};
    use std::cell::{Cell, RefCell};

    fn silent_producer(network: &Rc<MemoryNetwork>, prefix: &str) -> Rc<RefCell<Vec<Duration>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let face = network.create_face();
        let clock = Rc::clone(network);
        face.register_prefix(
            &prefix.parse().unwrap(),
            Rc::new(move |_: &Name, _: &Interest, _: Rc<dyn ReplyChannel>, _: u64| {
                log.borrow_mut().push(clock.elapsed());
            }),
            Rc::new(|_: &Name| {}),
            None,
        )
        .unwrap();
        seen
    }

    #[test]
    fn test_backoff_schedule() {
        let network = MemoryNetwork::new();
        let arrivals = silent_producer(&network, "/app");
        let consumer: Rc<dyn Face> = network.create_face();

        let timed_out_at = Rc::new(Cell::new(None));
        let flag = timed_out_at.clone();
        let clock = Rc::clone(&network);
        let interest = Interest::new("/app/x".parse().unwrap())
            .with_lifetime(Duration::from_millis(100));
        express_with_backoff(
            consumer,
            &interest,
            Duration::from_millis(400),
            Rc::new(|_: &Interest, _: &Data| panic!("no data expected")),
            Rc::new(move |_: &Interest| flag.set(Some(clock.elapsed()))),
            Rc::new(|_: &Interest, _: &NetworkNack| panic!("no nack expected")),
        )
        .unwrap();

        network.advance(Duration::from_millis(399));
        assert_eq!(timed_out_at.get(), None);

        network.advance(Duration::from_millis(1));
        assert_eq!(timed_out_at.get(), Some(Duration::from_millis(400)));
        let expected: Vec<Duration> = [0, 100, 300].iter().map(|ms| Duration::from_millis(*ms)).collect();
        assert_eq!(*arrivals.borrow(), expected);
    }

    #[test]
    fn test_lifetime_capped_by_max() {
        let network = MemoryNetwork::new();
        let arrivals = silent_producer(&network, "/app");
        let consumer: Rc<dyn Face> = network.create_face();

        let timeouts = Rc::new(Cell::new(0));
        let counter = timeouts.clone();
        express_with_backoff(
            consumer,
            &Interest::new("/app/x".parse().unwrap()),
            Duration::from_millis(50),
            Rc::new(|_: &Interest, _: &Data| {}),
            Rc::new(move |_: &Interest| counter.set(counter.get() + 1)),
            Rc::new(|_: &Interest, _: &NetworkNack| {}),
        )
        .unwrap();

        network.advance(Duration::from_millis(50));
        assert_eq!(timeouts.get(), 1);
        assert_eq!(arrivals.borrow().len(), 1);
    }
}
