//! Order list filtering and pagination.
//!
//! The list screen works over an already-subscribed in-memory snapshot:
//! pagination slices locally and never issues store reads. "Load more" is a
//! two-phase request (begin/complete) mirroring the async fetch the UI kicks
//! off; while one is pending, further requests are suppressed.

use tracing::debug;

use crate::config::CoreConfig;
use crate::orders::{Order, OrderStatus, OrderType};

/// Single-select list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderFilter {
    #[default]
    All,
    Delivered,
    Pending,
    Preparing,
    Pickup,
    Delivery,
}

impl OrderFilter {
    /// Whether an order passes this filter.
    pub fn accepts(self, order: &Order) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::Delivered => order.status == OrderStatus::Delivered,
            OrderFilter::Pending => order.status == OrderStatus::Pending,
            OrderFilter::Preparing => order.status == OrderStatus::Preparing,
            OrderFilter::Pickup => order.order_type == OrderType::Pickup,
            OrderFilter::Delivery => order.order_type == OrderType::Delivery,
        }
    }
}

/// Outcome of a load-more request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    /// Accepted; caller must follow up with [`OrderListView::complete_load_more`].
    Accepted,
    /// Suppressed: a previous load has not completed yet.
    InFlight,
    /// Suppressed: the filtered set is exhausted.
    Exhausted,
}

/// Paged, filtered view over the live order snapshot.
#[derive(Debug)]
pub struct OrderListView {
    snapshot: Vec<Order>,
    filter: OrderFilter,
    page_size: usize,
    pages_loaded: usize,
    displayed: Vec<Order>,
    has_more_data: bool,
    loading: bool,
}

impl OrderListView {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            snapshot: Vec::new(),
            filter: OrderFilter::All,
            page_size: config.page_size.max(1),
            pages_loaded: 0,
            displayed: Vec::new(),
            has_more_data: true,
            loading: false,
        }
    }

    /// Replace the backing snapshot (live subscription push). Pages already
    /// shown are re-sliced from the fresh data so the view never keeps stale
    /// orders on screen.
    pub fn apply_snapshot(&mut self, orders: Vec<Order>) {
        self.snapshot = orders;
        self.reslice();
    }

    /// Switch the active filter. Resets to page one, clears the accumulated
    /// results, and drops any pending load.
    pub fn set_filter(&mut self, filter: OrderFilter) {
        self.filter = filter;
        self.pages_loaded = 0;
        self.displayed.clear();
        self.has_more_data = true;
        self.loading = false;
        debug!("order list filter changed to {filter:?}");
    }

    /// Request the next page. Only one load may be in flight at a time, and
    /// no load is issued once the filtered set is exhausted.
    pub fn begin_load_more(&mut self) -> LoadRequest {
        if self.loading {
            return LoadRequest::InFlight;
        }
        if !self.has_more_data {
            return LoadRequest::Exhausted;
        }
        self.loading = true;
        LoadRequest::Accepted
    }

    /// Resolve the pending load: append the next page-sized slice of the
    /// currently filtered set. Returns how many orders were appended. A call
    /// without a pending load is a no-op.
    pub fn complete_load_more(&mut self) -> usize {
        if !self.loading {
            return 0;
        }
        self.loading = false;

        let filtered = self.filtered();
        let start = self.pages_loaded * self.page_size;
        let end = (start + self.page_size).min(filtered.len());
        if start >= filtered.len() {
            self.has_more_data = false;
            return 0;
        }

        let appended = end - start;
        self.has_more_data = end < filtered.len();
        self.displayed.extend(filtered.into_iter().skip(start).take(appended));
        self.pages_loaded += 1;
        appended
    }

    pub fn displayed(&self) -> &[Order] {
        &self.displayed
    }

    pub fn filter(&self) -> OrderFilter {
        self.filter
    }

    pub fn has_more_data(&self) -> bool {
        self.has_more_data
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Owned so callers may mutate `self` while consuming the result.
    fn filtered(&self) -> Vec<Order> {
        self.snapshot
            .iter()
            .filter(|o| self.filter.accepts(o))
            .cloned()
            .collect()
    }

    /// Rebuild the displayed pages from the current snapshot.
    fn reslice(&mut self) {
        let filtered = self.filtered();
        let shown = (self.pages_loaded * self.page_size).min(filtered.len());
        if self.pages_loaded > 0 {
            self.has_more_data = shown < filtered.len();
        }
        self.displayed = filtered;
        self.displayed.truncate(shown);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::fixtures::order_minutes_ago;

    fn view() -> OrderListView {
        OrderListView::new(&CoreConfig::default())
    }

    /// `count` orders, newest first like the repository delivers them.
    fn snapshot(count: usize, status: OrderStatus) -> Vec<Order> {
        (0..count)
            .map(|i| order_minutes_ago(&format!("o{i}"), status, i as i64))
            .collect()
    }

    fn load_one_page(view: &mut OrderListView) -> usize {
        assert_eq!(view.begin_load_more(), LoadRequest::Accepted);
        view.complete_load_more()
    }

    #[test]
    fn test_pagination_exhausts_in_page_sized_slices() {
        let mut view = view();
        view.apply_snapshot(snapshot(45, OrderStatus::Pending));

        assert_eq!(load_one_page(&mut view), 20);
        assert!(view.has_more_data());
        assert_eq!(load_one_page(&mut view), 20);
        assert!(view.has_more_data());
        assert_eq!(load_one_page(&mut view), 5);
        assert!(!view.has_more_data(), "exhausted only after the third page");

        assert_eq!(view.displayed().len(), 45);
        assert_eq!(view.begin_load_more(), LoadRequest::Exhausted);
    }

    #[test]
    fn test_exact_multiple_exhausts_at_the_slice_boundary() {
        let mut view = view();
        view.apply_snapshot(snapshot(40, OrderStatus::Pending));

        assert_eq!(load_one_page(&mut view), 20);
        assert_eq!(load_one_page(&mut view), 20);
        // 40 = 2 full pages; the second load reaches the end of the
        // filtered set, so the flag flips without an extra empty load.
        assert!(!view.has_more_data());
        assert_eq!(view.begin_load_more(), LoadRequest::Exhausted);
    }

    #[test]
    fn test_in_flight_load_suppresses_duplicates() {
        let mut view = view();
        view.apply_snapshot(snapshot(30, OrderStatus::Pending));

        assert_eq!(view.begin_load_more(), LoadRequest::Accepted);
        assert!(view.is_loading());
        assert_eq!(view.begin_load_more(), LoadRequest::InFlight);
        assert_eq!(view.begin_load_more(), LoadRequest::InFlight);

        assert_eq!(view.complete_load_more(), 20);
        assert!(!view.is_loading());
        assert_eq!(view.begin_load_more(), LoadRequest::Accepted);
    }

    #[test]
    fn test_loaded_pages_accumulate_in_snapshot_order() {
        let mut view = view();
        view.apply_snapshot(snapshot(25, OrderStatus::Pending));

        load_one_page(&mut view);
        load_one_page(&mut view);

        let ids: Vec<&str> = view.displayed().iter().map(|o| o.id.as_str()).collect();
        let expected: Vec<String> = (0..25).map(|i| format!("o{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_complete_without_begin_is_a_no_op() {
        let mut view = view();
        view.apply_snapshot(snapshot(10, OrderStatus::Pending));
        assert_eq!(view.complete_load_more(), 0);
        assert!(view.displayed().is_empty());
    }

    #[test]
    fn test_filter_change_resets_pagination() {
        let mut orders = snapshot(25, OrderStatus::Pending);
        orders.extend(snapshot(3, OrderStatus::Delivered));
        let mut view = view();
        view.apply_snapshot(orders);

        load_one_page(&mut view);
        assert_eq!(view.displayed().len(), 20);

        view.set_filter(OrderFilter::Delivered);
        assert!(view.displayed().is_empty(), "accumulator cleared");
        assert!(view.has_more_data(), "pagination state reset");

        assert_eq!(load_one_page(&mut view), 3);
        assert!(view
            .displayed()
            .iter()
            .all(|o| o.status == OrderStatus::Delivered));
        assert!(!view.has_more_data());
    }

    #[test]
    fn test_filter_change_drops_pending_load() {
        let mut view = view();
        view.apply_snapshot(snapshot(30, OrderStatus::Pending));

        assert_eq!(view.begin_load_more(), LoadRequest::Accepted);
        view.set_filter(OrderFilter::All);
        assert!(!view.is_loading());
        assert_eq!(view.complete_load_more(), 0, "stale completion ignored");
    }

    #[test]
    fn test_type_filters_match_order_type() {
        let mut orders = Vec::new();
        for i in 0..4 {
            let mut o = order_minutes_ago(&format!("p{i}"), OrderStatus::Pending, i);
            o.order_type = OrderType::Pickup;
            orders.push(o);
        }
        let mut d = order_minutes_ago("d0", OrderStatus::Ready, 10);
        d.order_type = OrderType::Delivery;
        orders.push(d);

        let mut view = view();
        view.apply_snapshot(orders);
        view.set_filter(OrderFilter::Delivery);
        assert_eq!(load_one_page(&mut view), 1);
        assert_eq!(view.displayed()[0].id, "d0");
    }

    #[test]
    fn test_snapshot_push_reslices_displayed_pages() {
        let mut view = view();
        view.apply_snapshot(snapshot(25, OrderStatus::Pending));
        load_one_page(&mut view);
        assert_eq!(view.displayed().len(), 20);

        // An order disappears (e.g. delivered elsewhere and filtered out);
        // the shown page shrinks with the data instead of going stale.
        view.apply_snapshot(snapshot(15, OrderStatus::Pending));
        assert_eq!(view.displayed().len(), 15);
        assert!(!view.has_more_data());
    }

    #[test]
    fn test_empty_snapshot_first_load_reports_exhaustion() {
        let mut view = view();
        view.apply_snapshot(Vec::new());
        assert_eq!(view.begin_load_more(), LoadRequest::Accepted);
        assert_eq!(view.complete_load_more(), 0);
        assert!(!view.has_more_data());
        assert_eq!(view.begin_load_more(), LoadRequest::Exhausted);
    }
}
