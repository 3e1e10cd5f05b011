//! Reorder protocol for manually ordered lists
//!
//! Moving a row renumbers the whole live list densely from zero and writes
//! the changed positions in one transaction.

use crate::db::repositories::{OrderedTable, OrderingRepository, Position};
use crate::services::error::ContentError;
use std::sync::Arc;

/// Parse a client-supplied index. Negative values clamp to zero.
pub fn parse_index(raw: &str) -> Result<usize, ContentError> {
    let index: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ContentError::validation("INVALID_ORDER"))?;
    Ok(index.max(0) as usize)
}

/// Move `target` to `index` (clamped to the list length) and renumber.
///
/// `rows` must be in display order. Returns `None` when `target` is absent.
pub fn splice(rows: &[Position], target: i64, index: usize) -> Option<Vec<Position>> {
    let from = rows.iter().position(|p| p.id == target)?;
    let mut ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
    let moved = ids.remove(from);
    let index = index.min(ids.len());
    ids.insert(index, moved);
    Some(
        ids.into_iter()
            .enumerate()
            .map(|(order, id)| Position {
                id,
                order: order as i64,
            })
            .collect(),
    )
}

pub struct OrderingService {
    repo: Arc<dyn OrderingRepository>,
}

impl OrderingService {
    pub fn new(repo: Arc<dyn OrderingRepository>) -> Self {
        Self { repo }
    }

    /// Position a freshly created row takes
    pub async fn next_order(&self, table: OrderedTable) -> Result<i64, ContentError> {
        Ok(self.repo.next_order(table).await?)
    }

    /// Move row `id` of `table` to `raw_index`. Returns its new position.
    pub async fn reorder(
        &self,
        table: OrderedTable,
        id: i64,
        raw_index: &str,
    ) -> Result<Position, ContentError> {
        let index = parse_index(raw_index)?;
        let current = self.repo.positions(table).await?;
        if current.is_empty() {
            return Err(ContentError::not_found(format!("No {} to reorder", table)));
        }
        let renumbered = splice(&current, id, index)
            .ok_or_else(|| ContentError::not_found(format!("{} {}", table, id)))?;

        let changed: Vec<Position> = renumbered
            .iter()
            .filter(|p| {
                current
                    .iter()
                    .find(|old| old.id == p.id)
                    .map_or(true, |old| old.order != p.order)
            })
            .copied()
            .collect();
        if !changed.is_empty() {
            self.repo.apply(table, &changed).await?;
        }

        let moved = renumbered
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ContentError::not_found(format!("{} {}", table, id)))?;
        tracing::info!(table = %table, id, order = moved.order, updated = changed.len(), "Reordered");
        Ok(moved)
    }
}
