//! Monotonic Alive → Dying → Dead life cycle.
//!
//! Transitions are applied as a compare-and-swap of the whole document: the
//! new document is written only if the stored bytes still equal the bytes
//! the transition was computed from. A lost race is re-evaluated against the
//! fresh document, where it usually turns into a no-op.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::constants::MAX_TXN_ATTEMPTS;
use crate::metrics::LIFE_TRANSITION_METRIC;
use crate::Collection;
use crate::Result;
use crate::Store;
use crate::TxnOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

impl fmt::Display for Life {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// A persisted document carrying a life field.
pub(crate) trait Living: Serialize + DeserializeOwned {
    fn life(&self) -> Life;

    fn set_life(
        &mut self,
        life: Life,
    );
}

/// Moves the document at `collection/id` forward to `life`.
///
/// Does nothing if the document is already at or past `life`. Returns the
/// document as stored after the call, or `None` if it does not exist.
pub(crate) fn ensure_life<D: Living>(
    store: &dyn Store,
    collection: Collection,
    id: &str,
    life: Life,
    descr: &str,
) -> Result<Option<D>> {
    let mut last_err = None;

    for attempt in 0..MAX_TXN_ATTEMPTS {
        let Some(current) = store.find_by_id(collection, id)? else {
            return Ok(None);
        };
        let mut doc: D = bincode::deserialize(&current)?;
        if doc.life() >= life {
            debug!(%descr, %id, current = %doc.life(), target = %life, "life transition is a no-op");
            return Ok(Some(doc));
        }

        doc.set_life(life);
        let updated = bincode::serialize(&doc)?;
        match store.run(vec![TxnOp::compare_and_swap(collection, id, Some(current), updated)]) {
            Ok(()) => {
                debug!(%descr, %id, %life, "life transition applied");
                LIFE_TRANSITION_METRIC.with_label_values(&[descr, &life.to_string()]).inc();
                return Ok(Some(doc));
            }
            Err(e) if e.is_txn_aborted() => {
                debug!(%descr, %id, attempt, "life transition raced, re-reading");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| crate::Error::Fatal(format!("cannot set {descr} {id:?} to {life}"))))
}
