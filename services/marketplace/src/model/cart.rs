//! Per-user cart aggregate.
//!
//! # Purpose
//! Maps store id to product id to a positive quantity. All mutations go
//! through [`Cart::apply`] so every backend shares the same semantics.
//!
//! # Key invariants
//! - Quantities are always `>= 1`; a line that would drop to zero is removed.
//! - `clear` leaves an empty map for the store; `remove` prunes a store whose
//!   last line disappears.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    #[schema(value_type = Object)]
    pub stores: BTreeMap<String, BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOp {
    Add { store_id: String, product_id: String },
    Remove { store_id: String, product_id: String },
    Clear { store_id: String },
    DeleteItem { store_id: String, product_id: String },
}

impl CartOp {
    pub fn label(&self) -> &'static str {
        match self {
            CartOp::Add { .. } => "add",
            CartOp::Remove { .. } => "remove",
            CartOp::Clear { .. } => "clear",
            CartOp::DeleteItem { .. } => "delete_item",
        }
    }
}

impl Cart {
    pub fn quantity(&self, store_id: &str, product_id: &str) -> u32 {
        self.stores
            .get(store_id)
            .and_then(|items| items.get(product_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn apply(&mut self, op: &CartOp) {
        match op {
            CartOp::Add {
                store_id,
                product_id,
            } => {
                let quantity = self
                    .stores
                    .entry(store_id.clone())
                    .or_default()
                    .entry(product_id.clone())
                    .or_insert(0);
                *quantity = quantity.saturating_add(1);
            }
            CartOp::Remove {
                store_id,
                product_id,
            } => {
                let Some(items) = self.stores.get_mut(store_id) else {
                    return;
                };
                match items.get_mut(product_id) {
                    Some(quantity) if *quantity > 1 => *quantity -= 1,
                    Some(_) => {
                        items.remove(product_id);
                        if items.is_empty() {
                            self.stores.remove(store_id);
                        }
                    }
                    None => {}
                }
            }
            CartOp::Clear { store_id } => {
                self.stores.insert(store_id.clone(), BTreeMap::new());
            }
            CartOp::DeleteItem {
                store_id,
                product_id,
            } => {
                let Some(items) = self.stores.get_mut(store_id) else {
                    return;
                };
                if items.remove(product_id).is_some() && items.is_empty() {
                    self.stores.remove(store_id);
                }
            }
        }
    }
}
