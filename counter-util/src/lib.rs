pub mod drain;
pub mod logging;

use bytes::Bytes;
use http_body_util::Full;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Path of the click counter endpoint, relative to the host.
pub const COUNTER_PATH: &str = "/api/click-count/add";

#[inline]
#[must_use]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

#[derive(Clone)]
pub struct SharedCounter {
    count: Arc<AtomicI64>,
}

impl SharedCounter {
    /// The first call to [`SharedCounter::increment`] answers `start + 1`.
    #[must_use]
    pub fn new(start: i64) -> Self {
        Self {
            count: Arc::new(AtomicI64::new(start)),
        }
    }

    #[inline]
    #[must_use]
    pub fn increment(&self) -> CounterReply {
        let prev = self.count.fetch_add(1, Ordering::AcqRel);
        CounterReply::new(prev.wrapping_add(1))
    }
}

/// Body of a successful counter response: `{"data": <counter>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CounterReply {
    pub data: i64,
}

impl CounterReply {
    #[must_use]
    pub fn new(data: i64) -> Self {
        Self { data }
    }
}
