use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::deck::{Card, CardId, Symbol};

/// 会话代号，每次重开游戏加一。
pub type Generation = u64;

/// 选中的牌最多两张。
pub const MAX_SELECTION: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Idle,
    OneSelected,
    Resolving,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    CardRevealed {
        index: usize,
        card_id: CardId,
    },
    PairMatched {
        first: usize,
        second: usize,
        symbol: Symbol,
        matches: usize,
    },
    PairMismatched {
        first: usize,
        second: usize,
    },
    GameWon {
        matches: usize,
    },
    SessionReset {
        generation: Generation,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    OddCardCount { count: usize },
    PairCountMismatch { expected: usize, actual: usize },
    DuplicateCardId { card_id: CardId },
    SymbolCountMismatch { symbol: Symbol, count: usize },
    SelectionTooLong { len: usize },
    SelectionOutOfRange { index: usize },
    DuplicateSelection { index: usize },
    SelectedCardMatched { index: usize },
    UnpairedMatch { symbol: Symbol },
    MatchCountMismatch { matches: usize, matched_cards: usize },
    WonFlagMismatch { won: bool, matches: usize },
    CheckingFlagMismatch { checking: bool, selected: usize },
}

/// 一局游戏的完整状态。每次状态转移都会产生一个新的值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    #[serde(default)]
    pub generation: Generation,
    pub cards: Vec<Card>,
    #[serde(default)]
    pub selection: Vec<usize>,
    #[serde(default)]
    pub matches: usize,
    pub total_pairs: usize,
    #[serde(default)]
    pub checking: bool,
    #[serde(default)]
    pub won: bool,
}

impl SessionState {
    pub fn new(cards: Vec<Card>, generation: Generation) -> Self {
        let total_pairs = cards.len() / 2;
        Self {
            generation,
            cards,
            selection: Vec::with_capacity(MAX_SELECTION),
            matches: 0,
            total_pairs,
            checking: false,
            won: false,
        }
    }

    pub fn phase(&self) -> GamePhase {
        match self.selection.len() {
            0 => GamePhase::Idle,
            1 => GamePhase::OneSelected,
            _ => GamePhase::Resolving,
        }
    }

    pub fn card(&self, index: usize) -> Option<&Card> {
        self.cards.get(index)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.contains(&index)
    }

    /// 已配对或当前被选中的牌朝上显示。
    pub fn is_face_up(&self, index: usize) -> bool {
        self.card(index).map_or(false, |card| card.is_matched) || self.is_selected(index)
    }

    pub fn selected_pair(&self) -> Option<(usize, usize)> {
        match self.selection.as_slice() {
            [first, second] => Some((*first, *second)),
            _ => None,
        }
    }

    pub fn matched_cards(&self) -> usize {
        self.cards.iter().filter(|card| card.is_matched).count()
    }

    pub fn is_complete(&self) -> bool {
        self.matches == self.total_pairs
    }

    pub fn view(&self, grid_columns: u8) -> SessionView {
        let cards = self
            .cards
            .iter()
            .enumerate()
            .map(|(index, card)| CardView {
                index,
                id: card.id,
                symbol: card.symbol,
                icon: card.symbol.icon(),
                color: card.symbol.color(),
                is_matched: card.is_matched,
                is_face_up: self.is_face_up(index),
            })
            .collect();

        SessionView {
            generation: self.generation,
            cards,
            selection: self.selection.clone(),
            matches: self.matches,
            total_pairs: self.total_pairs,
            won: self.won,
            phase: self.phase(),
            grid_columns,
        }
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.cards.len() % 2 != 0 {
            return Err(IntegrityError::OddCardCount {
                count: self.cards.len(),
            });
        }
        if self.cards.len() / 2 != self.total_pairs {
            return Err(IntegrityError::PairCountMismatch {
                expected: self.total_pairs,
                actual: self.cards.len() / 2,
            });
        }

        let mut seen = HashSet::new();
        let mut symbols: HashMap<Symbol, usize> = HashMap::new();
        let mut matched_symbols: HashMap<Symbol, usize> = HashMap::new();
        for card in &self.cards {
            if !seen.insert(card.id) {
                return Err(IntegrityError::DuplicateCardId { card_id: card.id });
            }
            *symbols.entry(card.symbol).or_default() += 1;
            if card.is_matched {
                *matched_symbols.entry(card.symbol).or_default() += 1;
            }
        }
        // 按图案排序，保证报错结果稳定
        let mut symbol_counts: Vec<(Symbol, usize)> = symbols.into_iter().collect();
        symbol_counts.sort();
        if let Some((symbol, count)) = symbol_counts.into_iter().find(|(_, count)| *count != 2) {
            return Err(IntegrityError::SymbolCountMismatch { symbol, count });
        }
        // 同一图案的两张牌必须同时配对或同时未配对
        let mut unpaired: Vec<Symbol> = matched_symbols
            .into_iter()
            .filter(|(_, count)| *count != 2)
            .map(|(symbol, _)| symbol)
            .collect();
        unpaired.sort();
        if let Some(symbol) = unpaired.first() {
            return Err(IntegrityError::UnpairedMatch { symbol: *symbol });
        }

        if self.selection.len() > MAX_SELECTION {
            return Err(IntegrityError::SelectionTooLong {
                len: self.selection.len(),
            });
        }
        let mut selected = HashSet::new();
        for &index in &self.selection {
            let card = self
                .card(index)
                .ok_or(IntegrityError::SelectionOutOfRange { index })?;
            if !selected.insert(index) {
                return Err(IntegrityError::DuplicateSelection { index });
            }
            if card.is_matched {
                return Err(IntegrityError::SelectedCardMatched { index });
            }
        }

        let matched_cards = self.matched_cards();
        if matched_cards != self.matches * 2 {
            return Err(IntegrityError::MatchCountMismatch {
                matches: self.matches,
                matched_cards,
            });
        }
        if self.won != self.is_complete() {
            return Err(IntegrityError::WonFlagMismatch {
                won: self.won,
                matches: self.matches,
            });
        }
        if self.checking != (self.selection.len() == MAX_SELECTION) {
            return Err(IntegrityError::CheckingFlagMismatch {
                checking: self.checking,
                selected: self.selection.len(),
            });
        }

        Ok(())
    }
}

/// 提供给前端渲染的单张牌。
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CardView {
    pub index: usize,
    pub id: CardId,
    pub symbol: Symbol,
    pub icon: &'static str,
    pub color: &'static str,
    pub is_matched: bool,
    pub is_face_up: bool,
}

/// 提供给前端渲染的整局快照。
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionView {
    pub generation: Generation,
    pub cards: Vec<CardView>,
    pub selection: Vec<usize>,
    pub matches: usize,
    pub total_pairs: usize,
    pub won: bool,
    pub phase: GamePhase,
    pub grid_columns: u8,
}
