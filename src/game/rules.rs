use log::{debug, info, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

use super::{
    deck::create_cards_for,
    state::{GameEvent, Generation, IntegrityError, SessionState, MAX_SELECTION},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    Match,
    Mismatch,
}

/// 两张牌翻开后等待执行的判定，带有所属会话的代号。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledResolution {
    pub generation: Generation,
    pub first: usize,
    pub second: usize,
    pub kind: ResolutionKind,
    pub delay_ms: u32,
}

/// 被忽略的输入及其原因。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    OutOfRange,
    Checking,
    AlreadyMatched,
    AlreadySelected,
    SelectionFull,
    StaleResolution,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameError {
    InvalidConfig { reason: String },
    IntegrityViolation { error: IntegrityError },
    Serialization { reason: String },
}

impl From<IntegrityError> for GameError {
    fn from(error: IntegrityError) -> Self {
        GameError::IntegrityViolation { error }
    }
}

/// 一次状态转移的结果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<ScheduledResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<IgnoreReason>,
}

impl Transition {
    fn applied(state: SessionState, events: Vec<GameEvent>) -> Self {
        Self {
            state,
            events,
            scheduled: None,
            ignored: None,
        }
    }

    fn ignored(state: &SessionState, reason: IgnoreReason) -> Self {
        Self {
            state: state.clone(),
            events: Vec::new(),
            scheduled: None,
            ignored: Some(reason),
        }
    }

    fn with_scheduled(mut self, scheduled: ScheduledResolution) -> Self {
        self.scheduled = Some(scheduled);
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: GameConfig,
}

impl RuleEngine {
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn new_session<R: Rng + ?Sized>(&self, rng: &mut R, generation: Generation) -> SessionState {
        SessionState::new(create_cards_for(self.config.pairs, rng), generation)
    }

    fn check_click(state: &SessionState, index: usize) -> Result<(), IgnoreReason> {
        let card = state.card(index).ok_or(IgnoreReason::OutOfRange)?;
        if state.checking {
            return Err(IgnoreReason::Checking);
        }
        if card.is_matched {
            return Err(IgnoreReason::AlreadyMatched);
        }
        if state.is_selected(index) {
            return Err(IgnoreReason::AlreadySelected);
        }
        if state.selection.len() >= MAX_SELECTION {
            return Err(IgnoreReason::SelectionFull);
        }
        Ok(())
    }

    pub fn handle_click(&self, state: &SessionState, index: usize) -> Transition {
        if let Err(reason) = Self::check_click(state, index) {
            trace!("click on {index} ignored: {reason:?}");
            return Transition::ignored(state, reason);
        }

        let mut next = state.clone();
        next.selection.push(index);
        let events = vec![GameEvent::CardRevealed {
            index,
            card_id: next.cards[index].id,
        }];

        let Some((first, second)) = next.selected_pair() else {
            return Transition::applied(next, events);
        };

        next.checking = true;
        let Some(scheduled) = self.pending_resolution(&next) else {
            return Transition::applied(next, events);
        };
        debug!(
            "generation {}: cards {first} and {second} revealed, {:?} resolves in {}ms",
            next.generation, scheduled.kind, scheduled.delay_ms
        );
        Transition::applied(next, events).with_scheduled(scheduled)
    }

    /// 按牌面图案为待判定的两张牌生成判定，没有待判定的牌时返回 `None`。
    pub fn pending_resolution(&self, state: &SessionState) -> Option<ScheduledResolution> {
        if !state.checking {
            return None;
        }
        let (first, second) = state.selected_pair()?;
        let kind = Self::outcome(state, first, second)?;
        let delay_ms = match kind {
            ResolutionKind::Match => self.config.match_delay_ms,
            ResolutionKind::Mismatch => self.config.mismatch_delay_ms,
        };
        Some(ScheduledResolution {
            generation: state.generation,
            first,
            second,
            kind,
            delay_ms,
        })
    }

    fn outcome(state: &SessionState, first: usize, second: usize) -> Option<ResolutionKind> {
        let (a, b) = (state.card(first)?, state.card(second)?);
        Some(if a.matches(b) {
            ResolutionKind::Match
        } else {
            ResolutionKind::Mismatch
        })
    }

    fn is_current(state: &SessionState, resolution: &ScheduledResolution) -> bool {
        state.generation == resolution.generation
            && state.checking
            && state.selected_pair() == Some((resolution.first, resolution.second))
            // 判定类型以牌面为准，外部传入的 kind 不一致即视为过期
            && Self::outcome(state, resolution.first, resolution.second) == Some(resolution.kind)
    }

    pub fn resolve(&self, state: &SessionState, resolution: &ScheduledResolution) -> Transition {
        if !Self::is_current(state, resolution) {
            debug!(
                "dropping stale resolution from generation {} (current {})",
                resolution.generation, state.generation
            );
            return Transition::ignored(state, IgnoreReason::StaleResolution);
        }

        let mut next = state.clone();
        let (first, second) = (resolution.first, resolution.second);
        next.selection.clear();
        next.checking = false;

        let mut events = Vec::new();
        match resolution.kind {
            ResolutionKind::Match => {
                next.cards[first].is_matched = true;
                next.cards[second].is_matched = true;
                next.matches += 1;
                events.push(GameEvent::PairMatched {
                    first,
                    second,
                    symbol: next.cards[first].symbol,
                    matches: next.matches,
                });
                // 使用自增之后的计数判断胜利
                if !next.won && next.is_complete() {
                    next.won = true;
                    info!(
                        "generation {}: all {} pairs found",
                        next.generation, next.total_pairs
                    );
                    events.push(GameEvent::GameWon {
                        matches: next.matches,
                    });
                }
            }
            ResolutionKind::Mismatch => {
                events.push(GameEvent::PairMismatched { first, second });
            }
        }

        Transition::applied(next, events)
    }

    pub fn reset<R: Rng + ?Sized>(&self, state: &SessionState, rng: &mut R) -> Transition {
        let generation = state.generation.wrapping_add(1);
        let next = self.new_session(rng, generation);
        info!("starting generation {generation}");
        Transition::applied(next, vec![GameEvent::SessionReset { generation }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn setup() -> (RuleEngine, SessionState, SmallRng) {
        let mut rng = SmallRng::seed_from_u64(17);
        let engine = RuleEngine::default();
        let state = engine.new_session(&mut rng, 0);
        (engine, state, rng)
    }

    fn partner_of(state: &SessionState, index: usize) -> usize {
        let id = state.cards[index].id ^ 1;
        state
            .cards
            .iter()
            .position(|card| card.id == id)
            .expect("partner should exist")
    }

    fn non_partner_of(state: &SessionState, index: usize) -> usize {
        let symbol = state.cards[index].symbol;
        state
            .cards
            .iter()
            .position(|card| card.symbol != symbol)
            .expect("different symbol should exist")
    }

    #[test]
    fn first_click_selects_card() {
        let (engine, state, _) = setup();
        let transition = engine.handle_click(&state, 0);
        assert!(!transition.is_ignored());
        assert_eq!(transition.state.selection, vec![0]);
        assert!(transition.scheduled.is_none());
        assert!(!transition.state.checking);
        assert!(matches!(
            transition.events.as_slice(),
            [GameEvent::CardRevealed { index: 0, .. }]
        ));
        // 原状态保持不变
        assert!(state.selection.is_empty());
    }

    #[test]
    fn double_click_keeps_single_selection() {
        let (engine, state, _) = setup();
        let once = engine.handle_click(&state, 3).state;
        let twice = engine.handle_click(&once, 3);
        assert_eq!(twice.ignored, Some(IgnoreReason::AlreadySelected));
        assert_eq!(twice.state.selection, vec![3]);
    }

    #[test]
    fn out_of_range_click_is_ignored() {
        let (engine, state, _) = setup();
        let transition = engine.handle_click(&state, 12);
        assert_eq!(transition.ignored, Some(IgnoreReason::OutOfRange));
        assert_eq!(transition.state, state);
    }

    #[test]
    fn matching_pair_schedules_match_resolution() {
        let (engine, state, _) = setup();
        let partner = partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let transition = engine.handle_click(&state, partner);

        let scheduled = transition.scheduled.expect("resolution should be scheduled");
        assert_eq!(scheduled.kind, ResolutionKind::Match);
        assert_eq!(scheduled.delay_ms, engine.config().match_delay_ms);
        assert!(transition.state.checking);
        assert_eq!(transition.state.phase(), crate::game::GamePhase::Resolving);
        // 判定前不会标记配对
        assert!(transition.state.cards.iter().all(|card| !card.is_matched));
        assert_eq!(transition.state.matches, 0);
    }

    #[test]
    fn clicks_rejected_while_checking() {
        let (engine, state, _) = setup();
        let other = non_partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let state = engine.handle_click(&state, other).state;
        let third = (0..state.cards.len())
            .find(|index| !state.is_selected(*index))
            .expect("unselected card");

        let transition = engine.handle_click(&state, third);
        assert_eq!(transition.ignored, Some(IgnoreReason::Checking));
        assert_eq!(transition.state.selection.len(), 2);
    }

    #[test]
    fn full_selection_is_rejected_even_without_checking_flag() {
        let (engine, mut state, _) = setup();
        state.selection = vec![0, 1];
        let transition = engine.handle_click(&state, 2);
        assert_eq!(transition.ignored, Some(IgnoreReason::SelectionFull));
    }

    #[test]
    fn match_resolution_marks_cards_and_counts() {
        let (engine, state, _) = setup();
        let partner = partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let pending = engine.handle_click(&state, partner);
        let scheduled = pending.scheduled.expect("scheduled");

        let resolved = engine.resolve(&pending.state, &scheduled);
        assert!(resolved.state.cards[0].is_matched);
        assert!(resolved.state.cards[partner].is_matched);
        assert_eq!(resolved.state.matches, 1);
        assert!(resolved.state.selection.is_empty());
        assert!(!resolved.state.checking);
        assert!(!resolved.state.won);
        assert!(resolved.state.integrity_check().is_ok());

        let matched_again = engine.handle_click(&resolved.state, 0);
        assert_eq!(matched_again.ignored, Some(IgnoreReason::AlreadyMatched));
    }

    #[test]
    fn mismatch_resolution_flips_cards_back() {
        let (engine, state, _) = setup();
        let other = non_partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let pending = engine.handle_click(&state, other);
        let scheduled = pending.scheduled.expect("scheduled");
        assert_eq!(scheduled.kind, ResolutionKind::Mismatch);
        assert!(scheduled.delay_ms >= engine.config().match_delay_ms);

        let resolved = engine.resolve(&pending.state, &scheduled);
        assert!(resolved.state.selection.is_empty());
        assert!(!resolved.state.checking);
        assert_eq!(resolved.state.matches, 0);
        assert!(resolved.state.cards.iter().all(|card| !card.is_matched));
        assert_eq!(
            resolved.events,
            vec![GameEvent::PairMismatched {
                first: 0,
                second: other
            }]
        );
    }

    #[test]
    fn resolution_from_older_generation_is_stale() {
        let (engine, state, mut rng) = setup();
        let partner = partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let pending = engine.handle_click(&state, partner);
        let scheduled = pending.scheduled.expect("scheduled");

        let reset = engine.reset(&pending.state, &mut rng);
        assert_eq!(reset.state.generation, 1);
        let stale = engine.resolve(&reset.state, &scheduled);
        assert_eq!(stale.ignored, Some(IgnoreReason::StaleResolution));
        assert_eq!(stale.state, reset.state);
    }

    #[test]
    fn mismatched_pair_cannot_resolve_as_match() {
        let (engine, state, _) = setup();
        let other = non_partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let pending = engine.handle_click(&state, other);
        let mut wrong_kind = pending.scheduled.expect("scheduled");
        assert_eq!(wrong_kind.kind, ResolutionKind::Mismatch);
        wrong_kind.kind = ResolutionKind::Match;

        let transition = engine.resolve(&pending.state, &wrong_kind);
        assert_eq!(transition.ignored, Some(IgnoreReason::StaleResolution));
        assert_eq!(transition.state, pending.state);
        assert!(transition.state.cards.iter().all(|card| !card.is_matched));
        assert_eq!(transition.state.matches, 0);
    }

    #[test]
    fn pending_resolution_follows_card_symbols() {
        let (engine, state, _) = setup();
        assert!(engine.pending_resolution(&state).is_none());

        let partner = partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let state = engine.handle_click(&state, partner).state;
        let scheduled = engine.pending_resolution(&state).expect("pending pair");
        assert_eq!(scheduled.kind, ResolutionKind::Match);
        assert_eq!((scheduled.first, scheduled.second), (0, partner));
        assert_eq!(scheduled.delay_ms, engine.config().match_delay_ms);
    }

    #[test]
    fn winning_match_sets_won_once() {
        let (engine, state, _) = setup();
        let mut state = state;
        let mut won_events = 0;
        for index in 0..state.cards.len() {
            if state.cards[index].is_matched {
                continue;
            }
            let partner = partner_of(&state, index);
            state = engine.handle_click(&state, index).state;
            let pending = engine.handle_click(&state, partner);
            let scheduled = pending.scheduled.expect("scheduled");
            let resolved = engine.resolve(&pending.state, &scheduled);
            won_events += resolved
                .events
                .iter()
                .filter(|event| matches!(event, GameEvent::GameWon { .. }))
                .count();
            state = resolved.state;
        }

        assert!(state.won);
        assert_eq!(state.matches, 6);
        assert_eq!(won_events, 1);
        assert!(state.integrity_check().is_ok());

        for index in 0..state.cards.len() {
            let transition = engine.handle_click(&state, index);
            assert_eq!(transition.ignored, Some(IgnoreReason::AlreadyMatched));
            assert!(transition.events.is_empty());
        }
    }

    #[test]
    fn reset_produces_clean_session() {
        let (engine, state, mut rng) = setup();
        let other = non_partner_of(&state, 0);
        let state = engine.handle_click(&state, 0).state;
        let state = engine.handle_click(&state, other).state;

        let reset = engine.reset(&state, &mut rng);
        assert_eq!(reset.state.matches, 0);
        assert!(reset.state.selection.is_empty());
        assert!(!reset.state.checking);
        assert!(!reset.state.won);
        assert_eq!(reset.state.cards.len(), 12);
        assert_eq!(
            reset.events,
            vec![GameEvent::SessionReset { generation: 1 }]
        );
        assert!(reset.state.integrity_check().is_ok());
    }
}
