//! Staged-then-committed text input with a quiet-period debounce.

use std::time::Duration;
use tokio::time::Instant;

/// Raw keystrokes stage into this input; once a quiet period passes
/// with no further edits, the staged value is promoted to the committed
/// value that actually reaches the server.
///
/// Poll-driven: call [`poll_commit`](Self::poll_commit) from the app
/// tick loop.
#[derive(Debug, Clone)]
pub struct DebouncedInput {
  staged: String,
  committed: String,
  quiet: Duration,
  dirty_since: Option<Instant>,
}

impl DebouncedInput {
  pub fn new(quiet: Duration) -> Self {
    Self {
      staged: String::new(),
      committed: String::new(),
      quiet,
      dirty_since: None,
    }
  }

  /// Stage a new value. Re-staging the identical value does not reset
  /// the quiet timer.
  pub fn input(&mut self, value: impl Into<String>) {
    let value = value.into();
    if value == self.staged {
      return;
    }

    self.staged = value;
    self.dirty_since = if self.staged == self.committed {
      None
    } else {
      Some(Instant::now())
    };
  }

  pub fn staged(&self) -> &str {
    &self.staged
  }

  pub fn committed(&self) -> &str {
    &self.committed
  }

  /// True while an edit is waiting out its quiet period.
  pub fn is_dirty(&self) -> bool {
    self.dirty_since.is_some()
  }

  /// Promote the staged value if its quiet period has elapsed. Returns
  /// the newly committed value exactly once per promotion.
  pub fn poll_commit(&mut self) -> Option<&str> {
    let since = self.dirty_since?;
    if since.elapsed() < self.quiet {
      return None;
    }

    self.committed = self.staged.clone();
    self.dirty_since = None;
    Some(&self.committed)
  }

  /// Commit immediately, skipping the quiet period (submit key).
  pub fn flush(&mut self) -> Option<&str> {
    self.dirty_since = None;
    if self.staged == self.committed {
      return None;
    }

    self.committed = self.staged.clone();
    Some(&self.committed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::time::advance;

  const QUIET: Duration = Duration::from_millis(800);

  #[tokio::test(start_paused = true)]
  async fn keystrokes_within_quiet_window_commit_once() {
    let mut input = DebouncedInput::new(QUIET);

    input.input("a");
    advance(Duration::from_millis(200)).await;
    input.input("ab");
    advance(Duration::from_millis(200)).await;
    input.input("abc");
    assert!(input.poll_commit().is_none());

    advance(QUIET).await;
    assert_eq!(input.poll_commit(), Some("abc"));

    // Exactly one commit, not three
    assert!(input.poll_commit().is_none());
    assert_eq!(input.committed(), "abc");
  }

  #[tokio::test(start_paused = true)]
  async fn separate_quiet_windows_commit_separately() {
    let mut input = DebouncedInput::new(QUIET);

    input.input("abc");
    advance(QUIET).await;
    assert_eq!(input.poll_commit(), Some("abc"));

    input.input("abcd");
    assert!(input.poll_commit().is_none());
    advance(QUIET).await;
    assert_eq!(input.poll_commit(), Some("abcd"));
  }

  #[tokio::test(start_paused = true)]
  async fn restaging_the_committed_value_cancels_the_pending_commit() {
    let mut input = DebouncedInput::new(QUIET);

    input.input("abc");
    advance(QUIET).await;
    input.poll_commit();

    input.input("abcd");
    input.input("abc");
    advance(QUIET).await;
    assert!(input.poll_commit().is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn flush_commits_immediately() {
    let mut input = DebouncedInput::new(QUIET);

    input.input("cert");
    assert_eq!(input.flush(), Some("cert"));

    // Nothing left to commit afterwards
    advance(QUIET).await;
    assert!(input.poll_commit().is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn identical_keystroke_does_not_reset_the_timer() {
    let mut input = DebouncedInput::new(QUIET);

    input.input("abc");
    advance(Duration::from_millis(700)).await;
    input.input("abc");
    advance(Duration::from_millis(100)).await;

    assert_eq!(input.poll_commit(), Some("abc"));
  }
}
