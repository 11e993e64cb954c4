//! The listing-page convention: debounced search, pagination, filters,
//! and the per-page load state machine.
//!
//! Every listing screen holds one [`ListState`], feeds keystrokes and
//! paging clicks into it, and binds [`ListState::query_params`] to a
//! fetch operation. The state machine is
//! `Idle -> Loading -> Loaded | Errored`; any change to the committed
//! search term, page, page size, or filters re-enters `Loading`.

mod debounce;
mod pager;

pub use debounce::DebouncedInput;
pub use pager::{PageItem, Pager};

use crate::cache::{ParamValue, Params};
use crate::config::ListConfig;
use crate::resource::ResourceId;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListPhase {
  Idle,
  Loading,
  Loaded { total_items: u64 },
  /// Sticky until the next state-changing input; there is no automatic
  /// retry.
  Errored { message: String },
}

/// Interaction state for one listing page.
pub struct ListState {
  search: DebouncedInput,
  min_search_len: Option<usize>,
  pager: Pager,
  filters: Params,
  phase: ListPhase,
  pending_toggle: Option<ResourceId>,
}

impl ListState {
  pub fn new(config: &ListConfig) -> Self {
    Self {
      search: DebouncedInput::new(Duration::from_millis(config.debounce_ms)),
      min_search_len: None,
      pager: Pager::new(config.default_page_size).with_threshold(config.window_threshold),
      filters: Params::new(),
      phase: ListPhase::Idle,
      pending_toggle: None,
    }
  }

  /// Opt into the minimum-length gate: committed terms shorter than
  /// `len` (but non-empty) are suppressed from the outgoing params.
  pub fn with_min_search(mut self, len: usize) -> Self {
    self.min_search_len = Some(len);
    self
  }

  // --- search ---

  /// Stage a keystroke. Nothing reaches the server until the quiet
  /// period elapses (see [`tick`](Self::tick)) or the term is
  /// submitted explicitly.
  pub fn type_search(&mut self, term: impl Into<String>) {
    self.search.input(term);
  }

  /// Drive the debounce from the app tick. Returns `true` when a new
  /// term was committed - the page resets to 1 and the list reloads.
  pub fn tick(&mut self) -> bool {
    if self.search.poll_commit().is_some() {
      self.pager.first();
      self.phase = ListPhase::Loading;
      true
    } else {
      false
    }
  }

  /// Commit the staged term immediately (submit key).
  pub fn submit_search(&mut self) -> bool {
    if self.search.flush().is_some() {
      self.pager.first();
      self.phase = ListPhase::Loading;
      true
    } else {
      false
    }
  }

  pub fn staged_search(&self) -> &str {
    self.search.staged()
  }

  pub fn committed_search(&self) -> &str {
    self.search.committed()
  }

  /// The committed term as it would be sent: `None` when empty or when
  /// gated below the minimum length.
  pub fn effective_search(&self) -> Option<&str> {
    let term = self.search.committed();
    if term.is_empty() {
      return None;
    }
    if let Some(min) = self.min_search_len {
      if term.chars().count() < min {
        return None;
      }
    }
    Some(term)
  }

  // --- paging ---

  pub fn pager(&self) -> &Pager {
    &self.pager
  }

  pub fn set_page(&mut self, page: u32) {
    let before = self.pager.current_page();
    self.pager.set_page(page);
    if self.pager.current_page() != before {
      self.phase = ListPhase::Loading;
    }
  }

  pub fn next_page(&mut self) {
    self.set_page(self.pager.current_page().saturating_add(1));
  }

  pub fn prev_page(&mut self) {
    self.set_page(self.pager.current_page().saturating_sub(1));
  }

  pub fn first_page(&mut self) {
    self.set_page(1);
  }

  pub fn last_page(&mut self) {
    self.set_page(self.pager.total_pages().max(1));
  }

  pub fn set_page_size(&mut self, page_size: u32) {
    let before = self.pager.page_size();
    self.pager.set_page_size(page_size);
    if self.pager.page_size() != before {
      self.phase = ListPhase::Loading;
    }
  }

  // --- filters ---

  pub fn set_filter(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
    self.filters.insert(key.into(), value.into());
    self.pager.first();
    self.phase = ListPhase::Loading;
  }

  pub fn clear_filter(&mut self, key: &str) {
    if self.filters.remove(key).is_some() {
      self.pager.first();
      self.phase = ListPhase::Loading;
    }
  }

  // --- wire params ---

  /// The query-parameter set for the current page state: `page`,
  /// `page_size`, gated `search`, plus the active filters.
  pub fn query_params(&self) -> Params {
    let mut params = self.filters.clone();
    params.insert("page".to_string(), ParamValue::Int(self.pager.current_page() as i64));
    params.insert(
      "page_size".to_string(),
      ParamValue::Int(self.pager.page_size() as i64),
    );
    if let Some(term) = self.effective_search() {
      params.insert("search".to_string(), ParamValue::Str(term.to_string()));
    }
    params
  }

  // --- load lifecycle ---

  pub fn phase(&self) -> &ListPhase {
    &self.phase
  }

  pub fn mark_loading(&mut self) {
    self.phase = ListPhase::Loading;
  }

  pub fn mark_loaded(&mut self, total_items: u64) {
    self.pager.set_total_items(total_items);
    self.phase = ListPhase::Loaded { total_items };
  }

  pub fn mark_errored(&mut self, message: impl Into<String>) {
    self.phase = ListPhase::Errored {
      message: message.into(),
    };
  }

  // --- row toggles ---

  /// Claim the pending toggle slot for a row. Returns `false` while
  /// another toggle is still in flight - the caller must not issue a
  /// second update until the first settles. No optimistic UI: the
  /// checkbox follows server state after invalidation refetches the
  /// list.
  pub fn begin_toggle(&mut self, id: impl Into<ResourceId>) -> bool {
    if self.pending_toggle.is_some() {
      return false;
    }
    self.pending_toggle = Some(id.into());
    true
  }

  /// True while the given row's toggle is in flight (render disabled).
  pub fn toggle_pending(&self, id: &ResourceId) -> bool {
    self.pending_toggle.as_ref() == Some(id)
  }

  pub fn finish_toggle(&mut self) {
    self.pending_toggle = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::time::advance;

  fn state() -> ListState {
    ListState::new(&ListConfig::default())
  }

  #[tokio::test(start_paused = true)]
  async fn committed_search_resets_to_first_page() {
    let mut list = state();
    list.mark_loaded(100);
    list.set_page(4);

    list.type_search("history");
    assert!(!list.tick());

    advance(Duration::from_millis(800)).await;
    assert!(list.tick());
    assert_eq!(list.pager().current_page(), 1);
    assert_eq!(*list.phase(), ListPhase::Loading);
    assert_eq!(list.committed_search(), "history");
  }

  #[test]
  fn min_length_gate_suppresses_short_terms() {
    let mut list = state().with_min_search(3);

    list.type_search("ab");
    list.submit_search();
    assert_eq!(list.effective_search(), None);
    assert!(!list.query_params().contains_key("search"));

    list.type_search("abc");
    list.submit_search();
    assert_eq!(list.effective_search(), Some("abc"));

    // Clearing the term is always allowed
    list.type_search("");
    list.submit_search();
    assert_eq!(list.effective_search(), None);
  }

  #[test]
  fn ungated_pages_send_any_term() {
    let mut list = state();
    list.type_search("ab");
    list.submit_search();
    assert_eq!(list.effective_search(), Some("ab"));
  }

  #[test]
  fn query_params_carry_page_size_search_and_filters() {
    let mut list = state();
    list.mark_loaded(100);
    list.set_filter("category_id", 12i64);
    list.set_page(3);
    list.type_search("rust");
    list.submit_search();

    let params = list.query_params();
    // Committing the search reset paging, then page was never re-set
    assert_eq!(params.get("page"), Some(&ParamValue::Int(1)));
    assert_eq!(params.get("page_size"), Some(&ParamValue::Int(10)));
    assert_eq!(params.get("search"), Some(&ParamValue::Str("rust".into())));
    assert_eq!(params.get("category_id"), Some(&ParamValue::Int(12)));
  }

  #[test]
  fn page_size_change_reenters_loading_and_resets_page() {
    let mut list = state();
    list.mark_loaded(90);
    list.set_page(5);
    list.mark_loaded(90);

    list.set_page_size(18);
    assert_eq!(list.pager().current_page(), 1);
    assert_eq!(*list.phase(), ListPhase::Loading);
  }

  #[test]
  fn errored_is_sticky_until_the_next_input() {
    let mut list = state();
    list.mark_loaded(50);
    list.mark_errored("Error loading courses");

    assert!(matches!(list.phase(), ListPhase::Errored { .. }));

    list.set_page(2);
    assert_eq!(*list.phase(), ListPhase::Loading);
  }

  #[test]
  fn toggle_guard_refuses_concurrent_toggles() {
    let mut list = state();

    assert!(list.begin_toggle(7i64));
    assert!(list.toggle_pending(&ResourceId::Int(7)));
    assert!(!list.toggle_pending(&ResourceId::Int(8)));

    // Second toggle refused while the first is in flight
    assert!(!list.begin_toggle(8i64));

    list.finish_toggle();
    assert!(list.begin_toggle(8i64));
  }
}
