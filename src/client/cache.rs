extern crate futures;
extern crate log;
extern crate serde;
extern crate serde_json;
extern crate tokio;

pub mod store;

use crate::api;
use futures::channel::oneshot;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    future::Future,
    mem::take,
    sync::{Arc, Mutex},
};
use store::Store;

/// Delivered to key subscribers: a structurally-new value, or an explicit
/// update failure. A revalidation that found nothing new delivers nothing.
#[derive(Debug, Clone)]
pub enum Event {
    Updated(Value),
    Failed(api::Error),
}

type Subscriber = Arc<dyn Fn(&Event) + Send + Sync>;

/// Outcome of one revalidation, for callers awaiting that specific call.
#[derive(Debug, Clone)]
enum Refresh {
    Changed(Value),
    Unchanged,
    /// A later revalidation completed first; this response was discarded.
    Superseded,
    Failed(api::Error),
}

struct Entry {
    data: Option<Value>,
    in_flight: bool,
    /// Generation handed to the most recently started fetch.
    seq: u64,
    /// Generation of the last fetch whose completion was applied.
    applied: u64,
    waiters: Vec<oneshot::Sender<Refresh>>,
    subscribers: Vec<Subscriber>,
}
impl Entry {
    fn new(data: Option<Value>) -> Self {
        Entry {
            data,
            in_flight: false,
            seq: 0,
            applied: 0,
            waiters: Vec::new(),
            subscribers: Vec::new(),
        }
    }
}

struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    store: Store,
    on_signout: Box<dyn Fn() + Send + Sync>,
}

/// Stale-while-revalidate cache over every remote read. `get` hands back
/// the last-known value synchronously and revalidates in the background,
/// attaching to an already in-flight fetch for the same key instead of
/// starting a second one.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

/// Result of one `get` call: the stale value (if any) plus a handle on the
/// revalidation the call started or joined.
pub struct Lookup<T> {
    pub data: Option<T>,
    key: String,
    done: oneshot::Receiver<Refresh>,
}

fn from_value<T: DeserializeOwned>(value: Value, key: &str) -> api::Result<T> {
    serde_json::from_value(value)
        .map_err(|e| api::Error::new(api::Kind::Protocol, format!("cached {}: {}", key, e)))
}

impl<T: DeserializeOwned> Lookup<T> {
    /// Awaits this call's revalidation outcome regardless of whether it
    /// changed anything. Polling loops use this to see every fresh value.
    pub async fn refreshed(self) -> api::Result<T> {
        match self.done.await {
            Ok(Refresh::Changed(value)) => from_value(value, &self.key),
            Ok(Refresh::Unchanged) | Ok(Refresh::Superseded) => {
                let key = self.key;
                self.data.ok_or_else(|| {
                    api::Error::new(
                        api::Kind::Generic,
                        format!("cache entry {} vanished during refresh", key),
                    )
                })
            }
            Ok(Refresh::Failed(e)) => Err(e),
            Err(_) => Err(api::Error::new(
                api::Kind::Generic,
                format!("revalidation of {} was dropped", self.key),
            )),
        }
    }

    /// One-shot awaitable: a cached value resolves immediately, otherwise
    /// the first revalidation outcome decides.
    pub async fn value(self) -> api::Result<T> {
        match self.data {
            Some(v) => Ok(v),
            None => self.refreshed().await,
        }
    }
}

impl Cache {
    /// `on_signout` fires whenever a revalidation fails with an
    /// authorization error; the embedding UI decides what signing out means.
    pub fn open(store: Store, on_signout: Box<dyn Fn() + Send + Sync>) -> Self {
        Cache {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                store,
                on_signout,
            }),
        }
    }

    pub fn get<T, F, Fut>(&self, key: &str, fetch: F) -> Lookup<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = api::Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.inner.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(self.inner.store.get(key)));
        let data = entry
            .data
            .clone()
            .and_then(|value| serde_json::from_value(value).ok());
        entry.waiters.push(tx);
        if !entry.in_flight {
            entry.in_flight = true;
            entry.seq += 1;
            let seq = entry.seq;
            let future = fetch();
            let inner = self.inner.clone();
            let owned_key = key.to_string();
            tokio::spawn(async move {
                let outcome = match future.await {
                    Ok(value) => serde_json::to_value(value).map_err(|e| {
                        api::Error::new(
                            api::Kind::Protocol,
                            format!("cannot cache {}: {}", owned_key, e),
                        )
                    }),
                    Err(e) => Err(e),
                };
                inner.complete(&owned_key, seq, outcome);
            });
        }
        Lookup {
            data,
            key: key.to_string(),
            done: rx,
        }
    }

    pub fn subscribe<F: Fn(&Event) + Send + Sync + 'static>(&self, key: &str, callback: F) {
        let mut entries = self.inner.entries.lock().unwrap();
        entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(self.inner.store.get(key)))
            .subscribers
            .push(Arc::new(callback));
    }
}

impl Inner {
    fn complete(&self, key: &str, seq: u64, outcome: api::Result<Value>) {
        let mut unauthorized = false;
        let (event, subscribers) = {
            let mut entries = self.entries.lock().unwrap();
            let entry = match entries.get_mut(key) {
                Some(entry) => entry,
                None => return,
            };
            entry.in_flight = false;
            let refresh = match outcome {
                Ok(value) => {
                    if seq <= entry.applied {
                        // a fetch that lost the race with a newer completion
                        debug!("discarding superseded revalidation of {}", key);
                        Refresh::Superseded
                    } else {
                        entry.applied = seq;
                        if entry.data.as_ref() == Some(&value) {
                            Refresh::Unchanged
                        } else {
                            entry.data = Some(value.clone());
                            if let Err(e) = self.store.put(key, value.clone()) {
                                warn!("failed to persist {}: {}", key, e);
                            }
                            Refresh::Changed(value)
                        }
                    }
                }
                Err(e) => {
                    warn!("revalidation of {} failed: {}", key, e);
                    unauthorized = e.kind() == api::Kind::Unauthorized;
                    Refresh::Failed(e)
                }
            };
            let event = match &refresh {
                Refresh::Changed(value) => Some(Event::Updated(value.clone())),
                Refresh::Failed(e) => Some(Event::Failed(e.clone())),
                Refresh::Unchanged | Refresh::Superseded => None,
            };
            let subscribers = if event.is_some() {
                entry.subscribers.clone()
            } else {
                Vec::new()
            };
            for waiter in take(&mut entry.waiters) {
                let _ = waiter.send(refresh.clone());
            }
            (event, subscribers)
        };
        // callbacks run outside the entry lock
        if unauthorized {
            (self.on_signout)();
        }
        if let Some(event) = event {
            for subscriber in subscribers {
                subscriber(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn open(path: &std::path::Path) -> (Cache, Arc<AtomicBool>) {
        let signed_out = Arc::new(AtomicBool::new(false));
        let flag = signed_out.clone();
        let cache = Cache::open(
            Store::open(path).unwrap(),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        (cache, signed_out)
    }

    fn recorded(cache: &Cache, key: &str) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        cache.subscribe(key, move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[tokio::test]
    async fn concurrent_gets_share_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = open(&dir.path().join("c.yml"));
        let calls = Arc::new(AtomicUsize::new(0));
        let lookups: Vec<Lookup<String>> = (0..3)
            .map(|_| {
                let calls = calls.clone();
                cache.get("k", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(100)).await;
                    Ok(String::from("fresh"))
                })
            })
            .collect();
        for lookup in lookups {
            assert_eq!(lookup.refreshed().await.unwrap(), "fresh");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn equal_refetch_notifies_nobody() {
        // a revalidation that finds the persisted value again is a no-op
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.yml");
        Store::open(&path)
            .unwrap()
            .put("p", json!({"title": "Sum"}))
            .unwrap();
        let (cache, _) = open(&path);
        let events = recorded(&cache, "p");
        let lookup: Lookup<Value> = cache.get("p", || async { Ok(json!({"title": "Sum"})) });
        assert_eq!(lookup.data, Some(json!({"title": "Sum"})));
        let refreshed = lookup.refreshed().await.unwrap();
        assert_eq!(refreshed, json!({"title": "Sum"}));
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn changed_value_notifies_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.yml");
        let (cache, _) = open(&path);
        let events = recorded(&cache, "p");
        let lookup: Lookup<String> = cache.get("p", || async { Ok(String::from("v1")) });
        assert_eq!(lookup.data, None);
        assert_eq!(lookup.refreshed().await.unwrap(), "v1");
        match events.lock().unwrap().as_slice() {
            [Event::Updated(value)] => assert_eq!(value, &json!("v1")),
            other => panic!("expected one update, got {:?}", other),
        }
        // cold start on the same file serves the persisted value before any
        // revalidation completes
        let (reopened, _) = open(&path);
        let lookup: Lookup<String> = reopened.get("p", || async {
            sleep(Duration::from_secs(5)).await;
            Ok(String::from("much later"))
        });
        assert_eq!(lookup.data, Some(String::from("v1")));
        assert_eq!(lookup.value().await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn failure_is_an_event_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, signed_out) = open(&dir.path().join("c.yml"));
        let events = recorded(&cache, "p");
        let lookup: Lookup<String> = cache.get("p", || async {
            Err(api::Error::new(api::Kind::Generic, "gateway timeout"))
        });
        assert!(lookup.refreshed().await.is_err());
        match events.lock().unwrap().as_slice() {
            [Event::Failed(e)] => assert_eq!(e.kind(), api::Kind::Generic),
            other => panic!("expected one failure event, got {:?}", other),
        }
        assert!(!signed_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unauthorized_triggers_signout() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, signed_out) = open(&dir.path().join("c.yml"));
        let lookup: Lookup<String> = cache.get("getProfile", || async {
            Err(api::Error::new(api::Kind::Unauthorized, "token expired"))
        });
        let err = lookup.refreshed().await.unwrap_err();
        assert_eq!(err.kind(), api::Kind::Unauthorized);
        assert!(signed_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn refetch_runs_after_previous_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = open(&dir.path().join("c.yml"));
        let calls = Arc::new(AtomicUsize::new(0));
        for expected in ["a", "b"] {
            let calls = calls.clone();
            let lookup: Lookup<String> = cache.get("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(expected.to_string())
            });
            assert_eq!(lookup.refreshed().await.unwrap(), expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
