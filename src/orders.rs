//! Order model and repository for yums-core.
//!
//! Orders carry the only true state machine in the system: a forward-only
//! status lifecycle (pending -> preparing -> ready -> delivered) with no
//! skips, no backward moves, and no mutation once delivered. The repository
//! enforces the transition rule client-side, before any store write.
//!
//! Source order data is inconsistent about money: `total` and `deliveryFee`
//! appear both as raw numbers and as currency-prefixed strings ("GHC125").
//! The repository boundary normalizes every inbound amount into [`Money`];
//! nothing past this module ever sees the raw shapes.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::store::{Document, DocumentStore, Query, SortKey, Subscription, ORDERS};

/// Fallback currency code when source data carries a bare numeric amount.
pub const DEFAULT_CURRENCY: &str = "GHC";

// ---------------------------------------------------------------------------
// Status lifecycle
// ---------------------------------------------------------------------------

/// Order lifecycle states, in forward order.
///
/// There is no `cancelled` state: the legacy UI referenced one in a display
/// predicate, but no code path ever produced it, so it is deliberately
/// omitted here (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivered,
    ];

    /// The immediate successor in the lifecycle, or `None` for the terminal
    /// `Delivered` state.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }

    /// Forward-only rule: a transition is legal iff `to` is the immediate
    /// successor of `self`. Self-transitions are illegal.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        self.next() == Some(to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Pickup,
    Delivery,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Pickup => "pickup",
            OrderType::Delivery => "delivery",
        }
    }
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Normalized currency amount.
///
/// Deserialization accepts the three shapes found in real order documents:
/// a `{amount, currency}` object, a bare number, or a currency-prefixed
/// string like `"GHC125"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
        }
    }

    /// Parse a currency-prefixed string ("GHC125", "GHC 12.50") or a bare
    /// numeric string ("125") into a `Money` with `default_currency` as the
    /// fallback code.
    pub fn parse_prefixed(raw: &str, default_currency: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (prefix, rest) = trimmed.split_at(split);
        let amount: f64 = rest.trim().parse().map_err(|_| {
            CoreError::Validation(format!("unparseable amount '{raw}'"))
        })?;
        let currency = if prefix.is_empty() {
            default_currency.to_string()
        } else {
            prefix.to_uppercase()
        };
        Ok(Self { amount, currency })
    }

    /// Normalize a raw inbound amount.
    pub fn from_raw(raw: &RawAmount, default_currency: &str) -> CoreResult<Self> {
        match raw {
            RawAmount::Number(n) => Ok(Self::new(*n, default_currency)),
            RawAmount::Text(s) => Self::parse_prefixed(s, default_currency),
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Full { amount: f64, currency: String },
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Full { amount, currency } => Ok(Money { amount, currency }),
            Repr::Number(n) => Ok(Money::new(n, DEFAULT_CURRENCY)),
            Repr::Text(s) => {
                Money::parse_prefixed(&s, DEFAULT_CURRENCY).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// An amount exactly as the caller (or a legacy document) supplied it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl From<f64> for RawAmount {
    fn from(n: f64) -> Self {
        RawAmount::Number(n)
    }
}

impl From<&str> for RawAmount {
    fn from(s: &str) -> Self {
        RawAmount::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Order model
// ---------------------------------------------------------------------------

/// One line item on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub extras: Vec<String>,
}

fn one() -> u32 {
    1
}

/// Delivery destination, present iff `orderType == delivery`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
}

/// A persisted order. `id`, `created_at`, and `updated_at` come from the
/// store's document metadata, never from the data payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: String,
    #[serde(default = "epoch_utc")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "epoch_utc")]
    pub updated_at: DateTime<Utc>,
    pub customer_name: String,
    pub customer_phone: String,
    pub order_type: OrderType,
    /// Non-empty in practice, but an empty order must be tolerated.
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total: Money,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<DeliveryAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<Money>,
}

fn epoch_utc() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Order {
    /// Decode a stored document into an `Order`, taking id and timestamps
    /// from the document metadata.
    pub fn from_document(doc: &Document) -> CoreResult<Self> {
        let mut order: Order =
            serde_json::from_value(doc.data.clone()).map_err(|e| CoreError::Corrupt {
                collection: ORDERS.to_string(),
                id: doc.id.clone(),
                reason: e.to_string(),
            })?;
        order.id = doc.id.clone();
        order.created_at = doc.created_at;
        order.updated_at = doc.updated_at;
        Ok(order)
    }

    /// Order total plus the delivery fee when one applies.
    pub fn total_with_delivery(&self) -> f64 {
        let fee = match (self.order_type, &self.delivery_fee) {
            (OrderType::Delivery, Some(fee)) => fee.amount,
            _ => 0.0,
        };
        self.total.amount + fee
    }
}

/// Input for order creation. Status and timestamps are intentionally absent:
/// every new order starts `pending` with server-stamped times.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub order_type: OrderType,
    pub items: Vec<OrderItem>,
    pub total: RawAmount,
    pub delivery_address: Option<DeliveryAddress>,
    pub delivery_fee: Option<RawAmount>,
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Store wrapper for the `orders` collection.
pub struct OrderRepository<S: DocumentStore> {
    store: Arc<S>,
    currency: String,
}

impl<S: DocumentStore> Clone for OrderRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            currency: self.currency.clone(),
        }
    }
}

impl<S: DocumentStore> OrderRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, &CoreConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: &CoreConfig) -> Self {
        Self {
            store,
            currency: config.currency.clone(),
        }
    }

    /// Create a new order. Validates required fields, normalizes amounts,
    /// and forces `status = pending`; the store stamps the timestamps.
    pub fn create(&self, new_order: NewOrder) -> CoreResult<Order> {
        let customer_name = new_order.customer_name.trim();
        let customer_phone = new_order.customer_phone.trim();
        if customer_name.is_empty() {
            return Err(CoreError::Validation("customer name is required".into()));
        }
        if customer_phone.is_empty() {
            return Err(CoreError::Validation("customer phone is required".into()));
        }

        let total = Money::from_raw(&new_order.total, &self.currency)?;

        let mut fields = json!({
            "customerName": customer_name,
            "customerPhone": customer_phone,
            "orderType": new_order.order_type,
            "items": new_order.items,
            "total": total,
            "status": OrderStatus::Pending,
        });

        match new_order.order_type {
            OrderType::Delivery => {
                let address = new_order.delivery_address.ok_or_else(|| {
                    CoreError::Validation("delivery orders require a delivery address".into())
                })?;
                fields["deliveryAddress"] = serde_json::to_value(&address)
                    .map_err(|e| CoreError::Validation(e.to_string()))?;
                if let Some(raw_fee) = &new_order.delivery_fee {
                    let fee = Money::from_raw(raw_fee, &self.currency)?;
                    fields["deliveryFee"] = serde_json::to_value(&fee)
                        .map_err(|e| CoreError::Validation(e.to_string()))?;
                }
            }
            OrderType::Pickup => {
                if new_order.delivery_fee.is_some() {
                    warn!("ignoring delivery fee on a pickup order");
                }
            }
        }

        let id = self.store.add(ORDERS, &fields)?;
        info!("order {id} created for {customer_name}");
        self.fetch(&id)
    }

    /// Advance an order's status. Fails with `InvalidTransition` unless
    /// `new_status` is the immediate successor of the current status; never
    /// touches the store on a rejected transition.
    pub fn update_status(&self, id: &str, new_status: OrderStatus) -> CoreResult<Order> {
        let current = self.fetch(id)?;
        if !current.status.can_transition(new_status) {
            return Err(CoreError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        self.store
            .update(ORDERS, id, &json!({ "status": new_status }))?;
        info!("order {id} status {} -> {new_status}", current.status);
        self.fetch(id)
    }

    /// One-shot read of a single order.
    pub fn fetch(&self, id: &str) -> CoreResult<Order> {
        let doc = self.store.get(ORDERS, id)?;
        Order::from_document(&doc)
    }

    /// One-shot read of all orders, newest first.
    pub fn fetch_all(&self) -> CoreResult<Vec<Order>> {
        let docs = self
            .store
            .query(ORDERS, &Query::new().order(SortKey::CreatedAtDesc))?;
        docs.iter().map(Order::from_document).collect()
    }

    /// One-shot read of orders in a given status, newest first.
    pub fn fetch_by_status(&self, status: OrderStatus) -> CoreResult<Vec<Order>> {
        let docs = self.store.query(
            ORDERS,
            &Query::new()
                .filter("status", status.as_str())
                .order(SortKey::CreatedAtDesc),
        )?;
        docs.iter().map(Order::from_document).collect()
    }

    /// Live listener over all orders, newest first. The callback receives the
    /// full decoded collection on registration and after every change.
    pub fn subscribe(
        &self,
        callback: impl Fn(Vec<Order>) + Send + Sync + 'static,
    ) -> CoreResult<Subscription> {
        self.store.subscribe(
            ORDERS,
            Query::new().order(SortKey::CreatedAtDesc),
            Box::new(move |docs| callback(decode_snapshot(docs))),
        )
    }

    /// Live listener filtered to one status, newest first.
    pub fn subscribe_by_status(
        &self,
        status: OrderStatus,
        callback: impl Fn(Vec<Order>) + Send + Sync + 'static,
    ) -> CoreResult<Subscription> {
        self.store.subscribe(
            ORDERS,
            Query::new()
                .filter("status", status.as_str())
                .order(SortKey::CreatedAtDesc),
            Box::new(move |docs| callback(decode_snapshot(docs))),
        )
    }
}

/// Decode a live snapshot. A corrupt document is logged and skipped rather
/// than killing the stream; one-shot fetches surface the same condition as a
/// hard error instead.
fn decode_snapshot(docs: &[Document]) -> Vec<Order> {
    docs.iter()
        .filter_map(|doc| match Order::from_document(doc) {
            Ok(order) => Some(order),
            Err(e) => {
                warn!("skipping undecodable order in snapshot: {e}");
                None
            }
        })
        .collect()
}


// ===========================================================================
// Tests
// ===========================================================================
