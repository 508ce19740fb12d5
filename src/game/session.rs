//! 会话驱动：持有当前状态、待执行的判定和随机数源。

use log::debug;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::GameConfig;

use super::rules::{GameError, RuleEngine, ScheduledResolution, Transition};
use super::scheduler::{Millis, ResolutionQueue};
use super::state::{GameEvent, SessionState, SessionView};

pub struct MatchSession {
    engine: RuleEngine,
    state: SessionState,
    pending: ResolutionQueue,
    rng: SmallRng,
}

impl MatchSession {
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Result<Self, GameError> {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, mut rng: SmallRng) -> Result<Self, GameError> {
        config.validate()?;
        let engine = RuleEngine::new(config);
        let state = engine.new_session(&mut rng, 0);
        Ok(Self {
            engine,
            state,
            pending: ResolutionQueue::default(),
            rng,
        })
    }

    pub fn config(&self) -> &GameConfig {
        self.engine.config()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn view(&self) -> SessionView {
        self.state.view(self.config().grid_columns)
    }

    /// 替换当前状态，旧的待判定全部作废。
    ///
    /// 新状态若停在两张牌待判定，会按当前配置重新安排一次判定并返回。
    pub fn replace_state(
        &mut self,
        state: SessionState,
        now: Millis,
    ) -> Result<Option<ScheduledResolution>, GameError> {
        state.integrity_check()?;
        self.pending.clear();
        let scheduled = self.engine.pending_resolution(&state);
        if let Some(scheduled) = scheduled {
            let due_at = self.pending.schedule(scheduled, now);
            debug!("restored pending pair {:?} due at {due_at}", (scheduled.first, scheduled.second));
        }
        self.state = state;
        Ok(scheduled)
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.pending.next_due()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn click(&mut self, index: usize, now: Millis) -> Transition {
        let transition = self.engine.handle_click(&self.state, index);
        if let Some(scheduled) = transition.scheduled {
            let due_at = self.pending.schedule(scheduled, now);
            debug!("resolution for {:?} due at {due_at}", (scheduled.first, scheduled.second));
        }
        self.state = transition.state.clone();
        transition
    }

    /// 执行所有在 `now` 之前到期的判定。
    pub fn advance_to(&mut self, now: Millis) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Some(resolution) = self.pending.pop_due(now) {
            let transition = self.engine.resolve(&self.state, &resolution);
            self.state = transition.state;
            events.extend(transition.events);
        }
        events
    }

    pub fn reset(&mut self) -> Transition {
        let transition = self.engine.reset(&self.state, &mut self.rng);
        let dropped = self.pending.discard_before(transition.state.generation);
        if dropped > 0 {
            debug!("reset dropped {dropped} pending resolution(s)");
        }
        self.state = transition.state.clone();
        transition
    }
}
