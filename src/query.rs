//! Async load state for a single view.
//!
//! `Query<T>` runs a loader on the runtime and hands the result back through
//! a channel, so a caller can keep drawing while the load is in flight.
//!
//! # Example
//!
//! ```ignore
//! let loader = cache_layer.clone();
//! let mut query = Query::new(move || {
//!     let loader = loader.clone();
//!     async move { loader.load_base_view("B1").await }
//! });
//!
//! query.fetch();
//!
//! // Each tick
//! if query.poll() {
//!     // State changed, redraw
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::LoadError;

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently loading
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed
  Failed(LoadError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&LoadError> {
    match self {
      QueryState::Failed(e) => Some(e),
      _ => None,
    }
  }
}

type LoadResult<T> = Result<T, LoadError>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = LoadResult<T>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async load with state tracking. Dropping the query aborts its load.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<LoadResult<T>>>,
  task: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a query. The fetcher is called on every `fetch()` and `refetch()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<T>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      task: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Start loading unless a load is already in flight.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Abort any pending load and start a new one.
  #[allow(dead_code)]
  pub fn refetch(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for the result of a pending load.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.finish();
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Failed(error);
        self.finish();
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Task ended without sending (panicked or aborted)
        self.state = QueryState::Failed(LoadError::LoadFailed("load was cancelled".to_string()));
        self.finish();
        true
      }
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    self.task = Some(tokio::spawn(async move {
      let result = future.await;
      // Receiver may have been dropped
      let _ = tx.send(result);
    }));
  }

  fn finish(&mut self) {
    self.receiver = None;
    self.task = None;
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("pending", &self.task.is_some())
      .finish_non_exhaustive()
  }
}
