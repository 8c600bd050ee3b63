//! Menu catalog: categories and menu items.
//!
//! Categories and items live in their own collections; an item points at its
//! category by category *name*, so renames orphan items into the
//! "Uncategorized" bucket rather than dangling.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::orders::Money;
use crate::store::{Document, DocumentStore, Query, SortKey, Subscription, CATEGORIES, MENU_ITEMS};

/// Bucket for items whose category field is empty or matches no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// A menu category (tab on the menu screen).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Accent color for the category tab, e.g. "#FF6B35".
    pub color: String,
    /// Explicit display position; unranked categories sort after ranked ones.
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A size or extra option with its own price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricedOption {
    pub name: String,
    pub price: Money,
}

/// A sellable menu item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub description: String,
    /// Image URL, if one has been uploaded.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_true")]
    pub available: bool,
    /// Owning category name; empty means uncategorized.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sizes: Vec<PricedOption>,
    #[serde(default)]
    pub extras: Vec<PricedOption>,
}

fn default_true() -> bool {
    true
}

/// Partial update for a category; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Partial update for a menu item.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<PricedOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Vec<PricedOption>>,
}

// ---------------------------------------------------------------------------
// Ordering and grouping
// ---------------------------------------------------------------------------

/// Sort categories for display: explicitly ranked ones first by rank, then
/// the unranked alphabetically. Ties on rank break by case-insensitive name
/// so the order is stable across reloads.
pub fn sort_categories(categories: &mut [Category]) {
    categories.sort_by(|a, b| match (a.sort_order, b.sort_order) {
        (Some(x), Some(y)) => x
            .cmp(&y)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
}

/// Count items per category name. Every item lands in exactly one bucket:
/// its category's if that category exists, [`UNCATEGORIZED`] otherwise.
pub fn category_item_counts(
    categories: &[Category],
    items: &[MenuItem],
) -> BTreeMap<String, usize> {
    let known: std::collections::HashSet<&str> =
        categories.iter().map(|c| c.name.as_str()).collect();

    let mut counts: BTreeMap<String, usize> = categories
        .iter()
        .map(|c| (c.name.clone(), 0))
        .collect();

    for item in items {
        let bucket = if !item.category.is_empty() && known.contains(item.category.as_str()) {
            item.category.clone()
        } else {
            UNCATEGORIZED.to_string()
        };
        *counts.entry(bucket).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Menu catalog operations over a document store.
pub struct MenuRepository<S: DocumentStore> {
    store: Arc<S>,
    currency: String,
}

impl<S: DocumentStore> Clone for MenuRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            currency: self.currency.clone(),
        }
    }
}

impl<S: DocumentStore> MenuRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            currency: crate::orders::DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_config(store: Arc<S>, config: &CoreConfig) -> Self {
        Self {
            store,
            currency: config.currency.clone(),
        }
    }

    // -- categories ---------------------------------------------------------

    pub fn create_category(&self, category: &Category) -> CoreResult<Category> {
        validate_category(&category.name, &category.color)?;
        let fields = json!({
            "name": category.name.trim(),
            "color": category.color.trim(),
            "sortOrder": category.sort_order,
            "active": category.active,
        });
        let id = self.store.add(CATEGORIES, &fields)?;
        debug!(%id, name = %category.name, "category created");
        self.fetch_category(&id)
    }

    pub fn update_category(&self, id: &str, patch: &CategoryPatch) -> CoreResult<Category> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(CoreError::Validation("category name cannot be empty".into()));
            }
        }
        if let Some(color) = &patch.color {
            if color.trim().is_empty() {
                return Err(CoreError::Validation("category color cannot be empty".into()));
            }
        }
        let fields = serde_json::to_value(patch)
            .map_err(|e| CoreError::Validation(format!("bad category patch: {e}")))?;
        self.store.update(CATEGORIES, id, &fields)?;
        self.fetch_category(id)
    }

    pub fn fetch_category(&self, id: &str) -> CoreResult<Category> {
        let doc = self.store.get(CATEGORIES, id)?;
        decode_category(&doc)
            .ok_or_else(|| CoreError::Corrupt {
                collection: CATEGORIES.to_string(),
                id: id.to_string(),
                reason: "not a valid category".to_string(),
            })
    }

    /// All categories in display order.
    pub fn fetch_categories(&self) -> CoreResult<Vec<Category>> {
        let docs = self.store.query(CATEGORIES, &Query::new())?;
        let mut categories = decode_categories(&docs);
        sort_categories(&mut categories);
        Ok(categories)
    }

    /// Live category list, re-sorted on every push.
    pub fn subscribe_categories(
        &self,
        callback: impl Fn(Vec<Category>) + Send + Sync + 'static,
    ) -> CoreResult<Subscription> {
        self.store.subscribe(
            CATEGORIES,
            Query::new(),
            Box::new(move |docs| {
                let mut categories = decode_categories(docs);
                sort_categories(&mut categories);
                callback(categories);
            }),
        )
    }

    // -- menu items ---------------------------------------------------------

    pub fn create_item(&self, item: &MenuItem) -> CoreResult<MenuItem> {
        let name = item.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("menu item name cannot be empty".into()));
        }
        if item.price.amount <= 0.0 {
            return Err(CoreError::Validation(format!(
                "menu item price must be positive, got {}",
                item.price.amount
            )));
        }
        let price = Money {
            amount: item.price.amount,
            currency: if item.price.currency.is_empty() {
                self.currency.clone()
            } else {
                item.price.currency.clone()
            },
        };
        let fields = json!({
            "name": name,
            "price": price,
            "description": item.description.trim(),
            "image": item.image,
            "available": item.available,
            "category": item.category.trim(),
            "sizes": item.sizes,
            "extras": item.extras,
        });
        let id = self.store.add(MENU_ITEMS, &fields)?;
        debug!(%id, name, "menu item created");
        self.fetch_item(&id)
    }

    pub fn update_item(&self, id: &str, patch: &MenuItemPatch) -> CoreResult<MenuItem> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(CoreError::Validation("menu item name cannot be empty".into()));
            }
        }
        if let Some(price) = &patch.price {
            if price.amount <= 0.0 {
                return Err(CoreError::Validation(format!(
                    "menu item price must be positive, got {}",
                    price.amount
                )));
            }
        }
        let fields = serde_json::to_value(patch)
            .map_err(|e| CoreError::Validation(format!("bad menu item patch: {e}")))?;
        self.store.update(MENU_ITEMS, id, &fields)?;
        self.fetch_item(id)
    }

    pub fn fetch_item(&self, id: &str) -> CoreResult<MenuItem> {
        let doc = self.store.get(MENU_ITEMS, id)?;
        decode_item(&doc).ok_or_else(|| CoreError::Corrupt {
            collection: MENU_ITEMS.to_string(),
            id: id.to_string(),
            reason: "not a valid menu item".to_string(),
        })
    }

    /// All items, newest first.
    pub fn fetch_items(&self) -> CoreResult<Vec<MenuItem>> {
        let docs = self
            .store
            .query(MENU_ITEMS, &Query::new().order(SortKey::CreatedAtDesc))?;
        Ok(decode_items(&docs))
    }

    /// Live item list, newest first.
    pub fn subscribe_items(
        &self,
        callback: impl Fn(Vec<MenuItem>) + Send + Sync + 'static,
    ) -> CoreResult<Subscription> {
        self.store.subscribe(
            MENU_ITEMS,
            Query::new().order(SortKey::CreatedAtDesc),
            Box::new(move |docs| callback(decode_items(docs))),
        )
    }
}

fn validate_category(name: &str, color: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("category name cannot be empty".into()));
    }
    if color.trim().is_empty() {
        return Err(CoreError::Validation("category color cannot be empty".into()));
    }
    Ok(())
}

fn decode_category(doc: &Document) -> Option<Category> {
    let mut category: Category = serde_json::from_value(doc.data.clone()).ok()?;
    category.id = doc.id.clone();
    Some(category)
}

fn decode_categories(docs: &[Document]) -> Vec<Category> {
    docs.iter()
        .filter_map(|doc| {
            let decoded = decode_category(doc);
            if decoded.is_none() {
                warn!(id = %doc.id, "skipping malformed category document");
            }
            decoded
        })
        .collect()
}

fn decode_item(doc: &Document) -> Option<MenuItem> {
    let mut item: MenuItem = serde_json::from_value(doc.data.clone()).ok()?;
    item.id = doc.id.clone();
    Some(item)
}

fn decode_items(docs: &[Document]) -> Vec<MenuItem> {
    docs.iter()
        .filter_map(|doc| {
            let decoded = decode_item(doc);
            if decoded.is_none() {
                warn!(id = %doc.id, "skipping malformed menu item document");
            }
            decoded
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
