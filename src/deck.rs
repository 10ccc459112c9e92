//! Card store: the ordered deck of a session plus which cards show their back.
//!
//! Flip state is keyed by a stable per-card id, not by position, so deleting
//! a card never moves a flip onto its neighbour.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::Flashcard;
use crate::error::AppError;

pub type CardId = Uuid;

#[derive(Clone, Debug)]
pub struct StoredCard {
  pub id: CardId,
  pub card: Flashcard,
}

#[derive(Clone, Debug, Default)]
pub struct Deck {
  cards: Vec<StoredCard>,
  // Invariant: every id here belongs to a card in `cards`.
  flipped: HashSet<CardId>,
}

impl Deck {
  /// New generation: response order is kept, all cards start face up.
  pub fn replace(&mut self, cards: Vec<Flashcard>) {
    self.cards = cards
      .into_iter()
      .map(|card| StoredCard { id: Uuid::new_v4(), card })
      .collect();
    self.flipped.clear();
  }

  pub fn len(&self) -> usize {
    self.cards.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cards.is_empty()
  }

  fn id_at(&self, index: usize) -> Result<CardId, AppError> {
    self.cards
      .get(index)
      .map(|c| c.id)
      .ok_or(AppError::CardOutOfRange { index, len: self.cards.len() })
  }

  /// Toggle the card at `index`; returns true when it now shows the back.
  pub fn toggle_flip(&mut self, index: usize) -> Result<bool, AppError> {
    let id = self.id_at(index)?;
    if self.flipped.remove(&id) {
      Ok(false)
    } else {
      self.flipped.insert(id);
      Ok(true)
    }
  }

  /// Remove the card at `index` together with its flip state.
  pub fn delete(&mut self, index: usize) -> Result<Flashcard, AppError> {
    let id = self.id_at(index)?;
    self.flipped.remove(&id);
    Ok(self.cards.remove(index).card)
  }

  #[cfg(test)]
  pub fn is_flipped(&self, index: usize) -> bool {
    self.cards.get(index).is_some_and(|c| self.flipped.contains(&c.id))
  }

  /// Current positions of flipped cards, ascending.
  #[cfg(test)]
  pub fn flipped_indices(&self) -> Vec<usize> {
    self.cards
      .iter()
      .enumerate()
      .filter(|(_, c)| self.flipped.contains(&c.id))
      .map(|(i, _)| i)
      .collect()
  }

  /// Cards in order with their face state.
  pub fn iter(&self) -> impl Iterator<Item = (&StoredCard, bool)> + '_ {
    self.cards.iter().map(move |c| (c, self.flipped.contains(&c.id)))
  }
}
