//! Bounded worker pool over a shared queue.
//!
//! `workers` tasks share one queue of items; each pops an item, processes it
//! in its own task, and repeats until the queue is empty. Items are
//! independent: a panic in one handler loses only that item's result, and the
//! worker keeps draining the queue.

use std::{collections::VecDeque, future::Future, sync::Arc};

use tokio::{
  sync::{Mutex, mpsc},
  task::JoinSet,
};
use tracing::{error, trace};

/// Run `handler` over every item with at most `workers` in flight. Results
/// are returned in completion order.
pub async fn run<T, R, F, Fut>(items: Vec<T>, workers: usize, handler: F) -> Vec<R>
where
  T: Send + 'static,
  R: Send + 'static,
  F: Fn(T) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = R> + Send + 'static,
{
  if items.is_empty() {
    return Vec::new();
  }

  let total        = items.len();
  let worker_count = workers.clamp(1, total);
  let queue        = Arc::new(Mutex::new(VecDeque::from(items)));
  let handler      = Arc::new(handler);
  let (tx, mut rx) = mpsc::unbounded_channel();

  let mut set = JoinSet::new();
  for worker in 0..worker_count {
    let queue   = Arc::clone(&queue);
    let handler = Arc::clone(&handler);
    let tx      = tx.clone();

    set.spawn(async move {
      let (mut processed, mut panicked) = (0usize, 0usize);
      loop {
        let next = queue.lock().await.pop_front();
        let Some(item) = next else { break };
        match tokio::spawn((*handler)(item)).await {
          Ok(result) => {
            processed += 1;
            if tx.send(result).is_err() {
              break;
            }
          }
          Err(e) => {
            panicked += 1;
            error!(worker, error = %e, "pool item failed, continuing with the next");
          }
        }
      }
      trace!(worker, processed, panicked, "pool worker drained queue");
    });
  }
  drop(tx);

  while let Some(joined) = set.join_next().await {
    if let Err(e) = joined {
      error!(error = %e, "pool worker terminated abnormally");
    }
  }

  let mut results = Vec::with_capacity(total);
  while let Some(result) = rx.recv().await {
    results.push(result);
  }
  results
}
