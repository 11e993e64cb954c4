//! 1-indexed pagination state and the page-window display algorithm.

/// One slot in the rendered page strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageItem {
  Page(u32),
  Ellipsis,
}

/// Pagination state for a listing page.
#[derive(Clone, Debug)]
pub struct Pager {
  current_page: u32,
  page_size: u32,
  total_items: u64,
  show_all_threshold: u32,
}

impl Pager {
  pub fn new(page_size: u32) -> Self {
    Self {
      current_page: 1,
      page_size: page_size.max(1),
      total_items: 0,
      show_all_threshold: 6,
    }
  }

  /// Page counts up to this value render without ellipses.
  pub fn with_threshold(mut self, threshold: u32) -> Self {
    self.show_all_threshold = threshold;
    self
  }

  pub fn current_page(&self) -> u32 {
    self.current_page
  }

  pub fn page_size(&self) -> u32 {
    self.page_size
  }

  pub fn total_items(&self) -> u64 {
    self.total_items
  }

  pub fn total_pages(&self) -> u32 {
    self.total_items.div_ceil(self.page_size as u64) as u32
  }

  /// Record the server-reported total, clamping the current page back
  /// into range if the result set shrank under it.
  pub fn set_total_items(&mut self, total_items: u64) {
    self.total_items = total_items;
    self.current_page = self.current_page.clamp(1, self.total_pages().max(1));
  }

  /// Changing the page size resets to page 1.
  pub fn set_page_size(&mut self, page_size: u32) {
    let page_size = page_size.max(1);
    if page_size != self.page_size {
      self.page_size = page_size;
      self.current_page = 1;
    }
  }

  pub fn set_page(&mut self, page: u32) {
    self.current_page = page.clamp(1, self.total_pages().max(1));
  }

  pub fn first(&mut self) {
    self.current_page = 1;
  }

  pub fn prev(&mut self) {
    self.set_page(self.current_page.saturating_sub(1));
  }

  pub fn next(&mut self) {
    self.set_page(self.current_page.saturating_add(1));
  }

  pub fn last(&mut self) {
    self.current_page = self.total_pages().max(1);
  }

  /// False at the first page - First/Prev render disabled.
  pub fn can_prev(&self) -> bool {
    self.current_page > 1
  }

  /// False at the last page - Next/Last render disabled.
  pub fn can_next(&self) -> bool {
    self.current_page < self.total_pages()
  }

  /// Page strip: all pages up to the threshold, otherwise a leading or
  /// trailing run near the edges, or a sliding `cur-1..cur+1` window
  /// with ellipses on both sides.
  pub fn window(&self) -> Vec<PageItem> {
    let total = self.total_pages();
    if total == 0 {
      return Vec::new();
    }

    if total <= self.show_all_threshold {
      return (1..=total).map(PageItem::Page).collect();
    }

    let current = self.current_page;
    if current <= 3 {
      let mut items: Vec<PageItem> = (1..=4).map(PageItem::Page).collect();
      items.push(PageItem::Ellipsis);
      items.push(PageItem::Page(total));
      return items;
    }

    if current >= total - 2 {
      let mut items = vec![PageItem::Page(1), PageItem::Ellipsis];
      items.extend((total - 3..=total).map(PageItem::Page));
      return items;
    }

    vec![
      PageItem::Page(1),
      PageItem::Ellipsis,
      PageItem::Page(current - 1),
      PageItem::Page(current),
      PageItem::Page(current + 1),
      PageItem::Ellipsis,
      PageItem::Page(total),
    ]
  }
}
