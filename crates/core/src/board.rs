//! Kanban board ordering.
//!
//! A board is one column per [`TaskStatus`]. Moving a card splices it out of
//! its column and into the destination, then renumbers both columns densely.
//! There is no conflict detection: the caller persists the returned
//! placements and the last write wins.

use serde::{Deserialize, Serialize};

use crate::model::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("task {0} is not on this board")]
    UnknownCard(String),
}

/// A task's place on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub status: TaskStatus,
    pub position: i64,
}

/// New `(status, position)` for a card, as produced by [`Board::move_card`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: String,
    pub status: TaskStatus,
    pub position: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    columns: [Vec<Card>; 4],
}

fn column_index(status: TaskStatus) -> usize {
    match status {
        TaskStatus::Todo => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Review => 2,
        TaskStatus::Done => 3,
    }
}

impl Board {
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut board = Self::default();
        for card in cards {
            board.columns[column_index(card.status)].push(card);
        }
        for column in &mut board.columns {
            column.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        }
        board
    }

    pub fn column(&self, status: TaskStatus) -> &[Card] {
        &self.columns[column_index(status)]
    }

    /// Position a newly created card should take to land at the bottom of `status`.
    pub fn next_position(&self, status: TaskStatus) -> i64 {
        self.column(status)
            .last()
            .map(|c| c.position + 1)
            .unwrap_or(0)
    }

    fn locate(&self, id: &str) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(col, cards)| {
            cards.iter().position(|c| c.id == id).map(|idx| (col, idx))
        })
    }

    /// Move `id` to `to_index` within the `to_status` column.
    ///
    /// `to_index` is clamped to the column length. Returns the cards whose
    /// status or position changed, the moved card first.
    pub fn move_card(
        &mut self,
        id: &str,
        to_status: TaskStatus,
        to_index: usize,
    ) -> Result<Vec<Placement>, BoardError> {
        let (from_col, from_idx) = self
            .locate(id)
            .ok_or_else(|| BoardError::UnknownCard(id.to_string()))?;

        let before: Vec<(String, TaskStatus, i64)> = self
            .columns
            .iter()
            .flatten()
            .map(|c| (c.id.clone(), c.status, c.position))
            .collect();

        let mut card = self.columns[from_col].remove(from_idx);
        card.status = to_status;
        let to_col = column_index(to_status);
        let index = to_index.min(self.columns[to_col].len());
        self.columns[to_col].insert(index, card);

        renumber(&mut self.columns[from_col]);
        if to_col != from_col {
            renumber(&mut self.columns[to_col]);
        }

        let mut changed: Vec<Placement> = self
            .columns
            .iter()
            .flatten()
            .filter(|c| {
                !before.iter().any(|(bid, bstatus, bpos)| {
                    *bid == c.id && *bstatus == c.status && *bpos == c.position
                })
            })
            .map(|c| Placement {
                id: c.id.clone(),
                status: c.status,
                position: c.position,
            })
            .collect();

        // Moved card first.
        if let Some(pos) = changed.iter().position(|p| p.id == id) {
            let moved = changed.remove(pos);
            changed.insert(0, moved);
        }
        Ok(changed)
    }
}

fn renumber(column: &mut [Card]) {
    for (i, card) in column.iter_mut().enumerate() {
        card.position = i as i64;
    }
}
