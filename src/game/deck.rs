use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 全局唯一的卡牌标识。
pub type CardId = u32;

/// 一局游戏默认的配对数量。
pub const DEFAULT_PAIRS: usize = 6;

/// 卡牌正面的图案。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Heart,
    Star,
    Sun,
    Moon,
    Cloud,
    Flower,
}

pub const ALL_SYMBOLS: [Symbol; DEFAULT_PAIRS] = [
    Symbol::Heart,
    Symbol::Star,
    Symbol::Sun,
    Symbol::Moon,
    Symbol::Cloud,
    Symbol::Flower,
];

impl Symbol {
    /// 前端图标库中的图标名。
    pub fn icon(self) -> &'static str {
        match self {
            Symbol::Heart => "heart",
            Symbol::Star => "star",
            Symbol::Sun => "sun",
            Symbol::Moon => "moon",
            Symbol::Cloud => "cloud",
            Symbol::Flower => "flower-2",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Symbol::Heart => "text-rose-400",
            Symbol::Star => "text-amber-400",
            Symbol::Sun => "text-yellow-400",
            Symbol::Moon => "text-purple-400",
            Symbol::Cloud => "text-sky-400",
            Symbol::Flower => "text-emerald-400",
        }
    }
}

/// 棋盘上的一张牌。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub symbol: Symbol,
    #[serde(default)]
    pub is_matched: bool,
}

impl Card {
    pub fn new(id: CardId, symbol: Symbol) -> Self {
        Self {
            id,
            symbol,
            is_matched: false,
        }
    }

    pub fn matches(&self, other: &Card) -> bool {
        self.symbol == other.symbol
    }
}

/// 生成完整的 12 张牌并打乱顺序。
pub fn create_cards<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    create_cards_for(DEFAULT_PAIRS, rng)
}

/// 按配对数量生成牌组，每种图案两张，编号依次为 `2k` 与 `2k + 1`。
///
/// 超出图案总数的配对数会被截断到 [`ALL_SYMBOLS`] 的长度。
pub fn create_cards_for<R: Rng + ?Sized>(pairs: usize, rng: &mut R) -> Vec<Card> {
    let pairs = pairs.min(ALL_SYMBOLS.len());
    let mut cards = Vec::with_capacity(pairs * 2);
    for (index, symbol) in ALL_SYMBOLS.iter().take(pairs).enumerate() {
        let base = (index * 2) as CardId;
        cards.push(Card::new(base, *symbol));
        cards.push(Card::new(base + 1, *symbol));
    }
    // Fisher-Yates
    cards.shuffle(rng);
    cards
}
