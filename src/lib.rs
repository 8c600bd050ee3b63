//! Yums core - restaurant order and menu engine.
//!
//! The engine is a library crate: a host app wires a [`SqliteStore`] into the
//! repositories and drives everything through them. Orders move through a
//! forward-only lifecycle (pending -> preparing -> ready -> delivered), the
//! menu catalog groups items under categories, and live subscriptions push
//! fresh snapshots into analytics, the kitchen board, and the paged list
//! views.

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod kitchen;
pub mod layout;
pub mod listing;
pub mod menu;
pub mod orders;
pub mod store;
pub mod telemetry;

pub use analytics::{compute_analytics, subscribe_analytics, Analytics};
pub use config::CoreConfig;
pub use db::SqliteStore;
pub use error::{CoreError, CoreResult};
pub use kitchen::{build_queue, waiting_time, KitchenQueue, KitchenStation, Lane, LogNotifier, Notifier};
pub use layout::{layout, Cell, GridConfig, GridLayout, Viewport};
pub use listing::{LoadRequest, OrderFilter, OrderListView};
pub use menu::{
    category_item_counts, sort_categories, Category, CategoryPatch, MenuItem, MenuItemPatch,
    MenuRepository, PricedOption, UNCATEGORIZED,
};
pub use orders::{
    DeliveryAddress, Money, NewOrder, Order, OrderItem, OrderRepository, OrderStatus, OrderType,
    RawAmount, DEFAULT_CURRENCY,
};
pub use store::{Document, DocumentStore, Filter, Query, SortKey, Subscription};
