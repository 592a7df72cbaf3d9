#[cfg(test)]
#[path = "prefetch_test.rs"]
mod tests;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::future::FutureExt;
use futures::future::Shared;

use crate::domain::models::extend_transcript;
use crate::domain::models::reduce_choice;
use crate::domain::models::GameOption;
use crate::domain::models::GameState;
use crate::domain::models::Message;
use crate::domain::models::TurnFetchFailed;
use crate::domain::models::TurnResult;
use crate::domain::models::TurnServiceBox;

pub type PrefetchFuture = Shared<BoxFuture<'static, Result<Prefetched, TurnFetchFailed>>>;

/// A speculative turn, already reduced against the state it was requested from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prefetched {
    pub option_id: String,
    pub result: TurnResult,
    pub game_state: GameState,
}

enum CacheEntry {
    Pending(PrefetchFuture),
    Resolved(Prefetched),
}

struct CacheSlot {
    epoch: u64,
    entry: CacheEntry,
}

impl CacheSlot {
    fn is_pending(&self) -> bool {
        return matches!(self.entry, CacheEntry::Pending(_));
    }
}

pub enum Resolution {
    /// The speculation finished. The cache has been emptied.
    Hit(Prefetched),
    /// The speculation is still running. Await it instead of asking again.
    Deferred(PrefetchFuture),
    /// Nothing was speculated for this option.
    MustFetch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrefetchProgress {
    pub pending: usize,
    pub resolved: usize,
}

async fn speculate(
    service: TurnServiceBox,
    transcript: Vec<Message>,
    previous: Option<GameState>,
    chosen: GameOption,
) -> Result<Prefetched, TurnFetchFailed> {
    let reply = service.advance(&transcript, previous.as_ref()).await?;
    let game_state = reduce_choice(
        previous.as_ref(),
        &chosen,
        &reply.result.narrated_state,
        &reply.result.options,
    );

    return Ok(Prefetched {
        option_id: chosen.id,
        result: reply.result,
        game_state,
    });
}

fn settle(
    cache: &DashMap<String, CacheSlot>,
    option_id: &str,
    epoch: u64,
    res: Result<Prefetched, TurnFetchFailed>,
) {
    match res {
        Ok(prefetched) => {
            if let Some(mut slot) = cache.get_mut(option_id) {
                if slot.epoch == epoch && slot.is_pending() {
                    slot.entry = CacheEntry::Resolved(prefetched);
                    tracing::debug!(option_id, epoch, "Speculative turn resolved");
                    return;
                }
            }

            tracing::debug!(option_id, epoch, "Dropping stale speculative turn");
        }
        Err(err) => {
            let removed = cache.remove_if(option_id, |_, slot| {
                return slot.epoch == epoch && slot.is_pending();
            });
            tracing::warn!(
                option_id,
                epoch,
                evicted = removed.is_some(),
                error = %err,
                "Speculative turn failed"
            );
        }
    }
}

/// Speculatively requests the continuation of every offered option so that
/// picking one rarely waits on the network.
///
/// Entries belong to a single turn. `invalidate` empties the cache and bumps
/// the epoch, after which any speculation still in flight lands nowhere.
#[derive(Clone)]
pub struct PrefetchEngine {
    service: TurnServiceBox,
    cache: Arc<DashMap<String, CacheSlot>>,
    epoch: Arc<AtomicU64>,
    enabled: bool,
}

impl PrefetchEngine {
    pub fn new(service: TurnServiceBox, enabled: bool) -> PrefetchEngine {
        return PrefetchEngine {
            service,
            cache: Arc::new(DashMap::new()),
            epoch: Arc::new(AtomicU64::new(0)),
            enabled,
        };
    }

    pub fn epoch(&self) -> u64 {
        return self.epoch.load(Ordering::SeqCst);
    }

    /// Launches one speculative request per option not yet cached. Calling it
    /// again for the same options is a no-op.
    pub fn begin_prefetch(
        &self,
        options: &[GameOption],
        transcript: &[Message],
        game_state: Option<&GameState>,
    ) {
        if !self.enabled {
            return;
        }

        let epoch = self.epoch();
        for option in options {
            let speculation = match self.cache.entry(option.id.to_string()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(vacant) => {
                    let speculation = speculate(
                        self.service.clone(),
                        extend_transcript(transcript, &option.action),
                        game_state.cloned(),
                        option.clone(),
                    )
                    .boxed()
                    .shared();

                    vacant.insert(CacheSlot {
                        epoch,
                        entry: CacheEntry::Pending(speculation.clone()),
                    });

                    speculation
                }
            };

            tracing::debug!(option_id = option.id.as_str(), epoch, "Speculating turn");

            let cache = self.cache.clone();
            let option_id = option.id.to_string();
            tokio::spawn(async move {
                let res = speculation.await;
                settle(&cache, &option_id, epoch, res);
            });
        }
    }

    /// Looks up the speculation for the option the player picked. A hit
    /// empties the cache since sibling speculations can no longer apply.
    pub fn resolve(&self, option: &GameOption) -> Resolution {
        if !self.enabled {
            return Resolution::MustFetch;
        }

        let resolution = match self.cache.get(&option.id) {
            Some(slot) => match &slot.entry {
                CacheEntry::Pending(speculation) => Resolution::Deferred(speculation.clone()),
                CacheEntry::Resolved(prefetched) => Resolution::Hit(prefetched.clone()),
            },
            None => Resolution::MustFetch,
        };

        if let Resolution::Hit(_) = resolution {
            tracing::debug!(option_id = option.id.as_str(), "Speculation hit");
            self.invalidate();
        }

        return resolution;
    }

    pub fn invalidate(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.cache.clear();
        tracing::debug!(epoch, "Speculation cache invalidated");
    }

    pub fn is_resolved(&self, option_id: &str) -> bool {
        return self.cache.get(option_id).map_or(false, |slot| {
            return !slot.is_pending();
        });
    }

    pub fn progress(&self) -> PrefetchProgress {
        let mut progress = PrefetchProgress::default();
        for slot in self.cache.iter() {
            if slot.is_pending() {
                progress.pending += 1;
            } else {
                progress.resolved += 1;
            }
        }

        return progress;
    }
}
