//! Ordering primitives for a gallery collection.
//!
//! Every function here is pure: a sequence goes in, a freshly indexed sequence
//! comes out, and `order` always equals the zero-based position afterwards.

use std::collections::HashSet;

use shared::{
    domain::{ImageId, Item},
    protocol::{ImageRecord, OrderEntry},
};
use tracing::warn;

use crate::error::{GalleryError, GalleryResult};

/// Relocates `source` to the index `target` occupied, shifting everything in
/// between by one. Moving an item onto itself returns the sequence unchanged.
pub fn move_item(items: &[Item], source: &ImageId, target: &ImageId) -> GalleryResult<Vec<Item>> {
    let from = position_of(items, source)?;
    let to = position_of(items, target)?;
    if from == to {
        return Ok(items.to_vec());
    }

    let mut moved = items.to_vec();
    let item = moved.remove(from);
    moved.insert(to, item);
    reindex(&mut moved);
    Ok(moved)
}

pub fn position_of(items: &[Item], id: &ImageId) -> GalleryResult<usize> {
    items
        .iter()
        .position(|item| &item.id == id)
        .ok_or_else(|| GalleryError::NotFound(id.clone()))
}

pub fn reindex(items: &mut [Item]) {
    for (position, item) in items.iter_mut().enumerate() {
        item.order = position as u32;
    }
}

pub fn is_contiguous(items: &[Item]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(position, item)| item.order as usize == position)
}

/// Turns a fetched list into a contiguous collection.
///
/// Records without an `order` sort by arrival index; ties keep arrival order.
/// Duplicate ids keep their first occurrence.
pub fn normalize_fetched(records: Vec<ImageRecord>) -> Vec<Item> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut keyed = Vec::with_capacity(records.len());

    for (arrival, record) in records.into_iter().enumerate() {
        if !seen.insert(record.id.clone()) {
            warn!(image_id = %record.id, "gallery: dropping duplicate image from fetch result");
            continue;
        }
        let key = record.order.unwrap_or(arrival as i64);
        keyed.push((
            key,
            Item {
                id: record.id,
                title: record.title,
                image_ref: record.image_ref,
                order: 0,
            },
        ));
    }

    keyed.sort_by_key(|(key, _)| *key);
    let mut items: Vec<Item> = keyed.into_iter().map(|(_, item)| item).collect();
    reindex(&mut items);
    items
}

pub fn order_entries(items: &[Item]) -> Vec<OrderEntry> {
    items
        .iter()
        .map(|item| OrderEntry {
            id: item.id.clone(),
            order: item.order,
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/order_tests.rs"]
mod tests;
