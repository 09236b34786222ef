//! De-duplication of concurrent work by key.
//!
//! The first caller for a key starts the work; every caller arriving while it
//! is running awaits the same shared future and receives a clone of its
//! output. The in-flight entry is removed when the work completes or when
//! the last caller waiting on it is dropped. A cancelled or failed run never
//! blocks a retry, and work that someone still awaits is never started twice.

use std::{
  future::Future,
  hash::Hash,
  sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
  },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
  FutureExt as _,
  future::{BoxFuture, Shared},
};

type Flights<K, T> = Arc<DashMap<K, Flight<K, T>>>;

struct Flight<K, T>
where
  K: Eq + Hash,
{
  id:      u64,
  shared:  Shared<BoxFuture<'static, T>>,
  waiters: Weak<Waiters<K, T>>,
}

pub struct SingleFlight<K, T>
where
  K: Eq + Hash,
{
  in_flight: Flights<K, T>,
  next_id:   AtomicU64,
}

impl<K, T> Default for SingleFlight<K, T>
where
  K: Eq + Hash,
{
  fn default() -> Self {
    Self {
      in_flight: Arc::new(DashMap::new()),
      next_id:   AtomicU64::new(0),
    }
  }
}

impl<K, T> SingleFlight<K, T>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  T: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self { Self::default() }

  /// Number of keys with work currently in flight.
  pub fn len(&self) -> usize { self.in_flight.len() }

  pub fn is_empty(&self) -> bool { self.in_flight.is_empty() }

  pub fn is_in_flight(&self, key: &K) -> bool { self.in_flight.contains_key(key) }

  /// Run `start()` for `key` unless a run for `key` is already in flight, in
  /// which case wait for that run instead. `start` is only called by the
  /// caller that registers the run.
  pub async fn run<F, Fut>(&self, key: K, start: F) -> T
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T> + Send + 'static,
  {
    let (shared, _waiters) = match self.in_flight.entry(key.clone()) {
      Entry::Occupied(mut entry) => match entry.get().waiters.upgrade() {
        Some(waiters) => (entry.get().shared.clone(), waiters),
        // Every waiter has gone and the entry is about to be removed.
        None => {
          let (flight, waiters) = self.launch(key, start);
          let shared = flight.shared.clone();
          entry.insert(flight);
          (shared, waiters)
        }
      },
      Entry::Vacant(entry) => {
        let (flight, waiters) = self.launch(key, start);
        let shared = flight.shared.clone();
        entry.insert(flight);
        (shared, waiters)
      }
    };
    shared.await
  }

  fn launch<F, Fut>(&self, key: K, start: F) -> (Flight<K, T>, Arc<Waiters<K, T>>)
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T> + Send + 'static,
  {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let work = start();
    let in_flight = Arc::clone(&self.in_flight);
    let done_key = key.clone();
    let shared = async move {
      let output = work.await;
      in_flight.remove_if(&done_key, |_, flight| flight.id == id);
      output
    }
    .boxed()
    .shared();

    let waiters = Arc::new(Waiters {
      in_flight: Arc::clone(&self.in_flight),
      key,
      id,
    });
    let flight = Flight {
      id,
      shared,
      waiters: Arc::downgrade(&waiters),
    };
    (flight, waiters)
  }
}

/// Held by every caller awaiting a run. When the last one is dropped before
/// the run completes, the run is abandoned and its entry removed. Only
/// removes the entry it was created for.
struct Waiters<K, T>
where
  K: Eq + Hash,
{
  in_flight: Flights<K, T>,
  key:       K,
  id:        u64,
}

impl<K, T> Drop for Waiters<K, T>
where
  K: Eq + Hash,
{
  fn drop(&mut self) {
    self
      .in_flight
      .remove_if(&self.key, |_, flight| flight.id == self.id);
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use tokio::sync::oneshot;

  use super::*;

  #[tokio::test]
  async fn concurrent_callers_share_one_run() {
    let flights: SingleFlight<&'static str, usize> = SingleFlight::new();
    let starts = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel::<()>();

    let work = |starts: Arc<AtomicUsize>, gate: Option<oneshot::Receiver<()>>| {
      move || async move {
        starts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
          gate.await.ok();
        }
        42
      }
    };

    let first = flights.run("unit", work(starts.clone(), Some(gate)));
    let second = flights.run("unit", work(starts.clone(), None));
    let release = async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      release.send(()).ok();
    };
    let (a, b, ()) = tokio::join!(first, second, release);

    assert_eq!((a, b), (42, 42));
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(flights.is_empty());
  }

  #[tokio::test]
  async fn dropped_leader_clears_the_marker() {
    let flights: SingleFlight<&'static str, usize> = SingleFlight::new();
    let never = flights.run("unit", || futures::future::pending::<usize>());
    let timed_out = tokio::time::timeout(Duration::from_millis(10), never).await;
    assert!(timed_out.is_err());
    assert!(!flights.is_in_flight(&"unit"));

    let again = flights.run("unit", || async { 7 }).await;
    assert_eq!(again, 7);
  }

  #[tokio::test]
  async fn run_outlives_its_first_caller_while_others_wait() {
    let flights: SingleFlight<&'static str, usize> = SingleFlight::new();
    let starts = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel::<()>();

    let first = {
      let starts = Arc::clone(&starts);
      flights.run("unit", move || async move {
        starts.fetch_add(1, Ordering::SeqCst);
        gate.await.ok();
        5
      })
    };
    let mut first = Box::pin(first);
    assert!(futures::poll!(first.as_mut()).is_pending());

    let mut second = Box::pin(flights.run("unit", || async { 6 }));
    assert!(futures::poll!(second.as_mut()).is_pending());

    drop(first);
    assert!(flights.is_in_flight(&"unit"));

    let third = flights.run("unit", || async { 7 });
    release.send(()).ok();
    let (b, c) = tokio::join!(second, third);

    assert_eq!((b, c), (5, 5));
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(flights.is_empty());
  }

  #[tokio::test]
  async fn sequential_runs_start_fresh() {
    let flights: SingleFlight<u32, u32> = SingleFlight::new();
    assert_eq!(flights.run(1, || async { 1 }).await, 1);
    assert_eq!(flights.run(1, || async { 2 }).await, 2);
  }
}
