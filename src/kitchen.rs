//! Kitchen queue engine.
//!
//! Partitions active orders into three named lanes (new / preparing / ready)
//! for the kitchen display, oldest order first in each lane so nobody's food
//! is queue-jumped. Delivered orders leave the board entirely.
//!
//! The station is a view over the repository's live stream: its only
//! mutation is advancing an order exactly one state forward, and it trusts
//! the pushed snapshot (not any local copy) to reflect the move.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::orders::{NewOrder, Order, OrderRepository, OrderStatus};
use crate::store::{DocumentStore, Subscription};

// ---------------------------------------------------------------------------
// Lanes
// ---------------------------------------------------------------------------

/// Named kitchen lanes, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    New,
    Preparing,
    Ready,
}

impl Lane {
    /// The order status this lane displays.
    pub fn status(self) -> OrderStatus {
        match self {
            Lane::New => OrderStatus::Pending,
            Lane::Preparing => OrderStatus::Preparing,
            Lane::Ready => OrderStatus::Ready,
        }
    }
}

/// The kitchen board: one FIFO lane per active status.
#[derive(Debug, Clone, Default)]
pub struct KitchenQueue {
    pub new: Vec<Order>,
    pub preparing: Vec<Order>,
    pub ready: Vec<Order>,
}

impl KitchenQueue {
    pub fn lane(&self, lane: Lane) -> &[Order] {
        match lane {
            Lane::New => &self.new,
            Lane::Preparing => &self.preparing,
            Lane::Ready => &self.ready,
        }
    }

    /// Total active (non-delivered) orders on the board.
    pub fn active_count(&self) -> usize {
        self.new.len() + self.preparing.len() + self.ready.len()
    }
}

/// Partition a snapshot into lanes, each sorted ascending by creation time
/// so the oldest order is served first. Delivered orders are excluded.
pub fn build_queue(orders: &[Order]) -> KitchenQueue {
    let mut queue = KitchenQueue::default();
    for order in orders {
        match order.status {
            OrderStatus::Pending => queue.new.push(order.clone()),
            OrderStatus::Preparing => queue.preparing.push(order.clone()),
            OrderStatus::Ready => queue.ready.push(order.clone()),
            OrderStatus::Delivered => {}
        }
    }
    for lane in [&mut queue.new, &mut queue.preparing, &mut queue.ready] {
        lane.sort_by_key(|o| o.created_at);
    }
    queue
}

/// Human-readable waiting time since `created_at`, recomputed per render
/// tick and never persisted.
pub fn waiting_time(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes().max(0);
    if minutes < 60 {
        format!("{minutes}m")
    } else {
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Notification collaborator boundary. Implementations deliver push/local
/// notifications; the station treats every call as best-effort.
pub trait Notifier {
    fn notify_new_order(&self, order: &Order) -> CoreResult<()>;
    fn notify_status_change(&self, order: &Order, new_status: OrderStatus) -> CoreResult<()>;
}

/// Default notifier: logs instead of pushing. Used when no notification
/// backend is wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_new_order(&self, order: &Order) -> CoreResult<()> {
        info!(
            "new order {} from {} ({} items)",
            order.id,
            order.customer_name,
            order.items.len()
        );
        Ok(())
    }

    fn notify_status_change(&self, order: &Order, new_status: OrderStatus) -> CoreResult<()> {
        info!("order {} moved to {new_status}", order.id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Station
// ---------------------------------------------------------------------------

/// Kitchen-side coordinator: places orders, advances them through the lanes,
/// and exposes the live queue.
pub struct KitchenStation<S: DocumentStore> {
    repo: OrderRepository<S>,
    notifier: Arc<dyn Notifier + Send + Sync>,
}

impl<S: DocumentStore> KitchenStation<S> {
    pub fn new(repo: OrderRepository<S>, notifier: Arc<dyn Notifier + Send + Sync>) -> Self {
        Self { repo, notifier }
    }

    /// Create an order and announce it. A notification failure is logged and
    /// otherwise ignored; the order is already committed.
    pub fn place_order(&self, new_order: NewOrder) -> CoreResult<Order> {
        let order = self.repo.create(new_order)?;
        if let Err(e) = self.notifier.notify_new_order(&order) {
            warn!("new-order notification failed for {}: {e}", order.id);
        }
        Ok(order)
    }

    /// Move an order one lane forward. The live subscription, not this call,
    /// is what re-renders the board.
    pub fn advance(&self, order_id: &str) -> CoreResult<Order> {
        let current = self.repo.fetch(order_id)?;
        let next = current.status.next().ok_or(CoreError::InvalidTransition {
            from: current.status,
            to: current.status,
        })?;

        let updated = self.repo.update_status(order_id, next)?;
        if let Err(e) = self.notifier.notify_status_change(&updated, next) {
            warn!("status notification failed for {order_id}: {e}");
        }
        Ok(updated)
    }

    /// Live kitchen board, rebuilt from every pushed snapshot.
    pub fn subscribe_queue(
        &self,
        callback: impl Fn(KitchenQueue) + Send + Sync + 'static,
    ) -> CoreResult<Subscription> {
        self.repo.subscribe(move |orders| callback(build_queue(&orders)))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
