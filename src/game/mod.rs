//! 游戏核心逻辑模块（牌组、状态机、判定调度）。

pub mod deck;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod state;

pub use deck::{create_cards, create_cards_for, Card, CardId, Symbol, ALL_SYMBOLS, DEFAULT_PAIRS};
pub use rules::{
    GameError, IgnoreReason, ResolutionKind, RuleEngine, ScheduledResolution, Transition,
};
pub use scheduler::{Millis, ResolutionQueue};
pub use session::MatchSession;
pub use state::{
    CardView, GameEvent, GamePhase, Generation, IntegrityError, SessionState, SessionView,
};
