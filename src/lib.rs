pub mod config;
pub mod game;
pub mod logging;
pub mod utils;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use log::{info, warn, LevelFilter};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::js_sys::{Date, Function};

pub use config::GameConfig;
pub use game::{
    create_cards, Card, CardId, CardView, GameError, GameEvent, GamePhase, Generation,
    IgnoreReason, IntegrityError, MatchSession, Millis, ResolutionKind, RuleEngine,
    ScheduledResolution, SessionState, SessionView, Symbol, Transition,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    logging::init(LevelFilter::Info);
}

#[wasm_bindgen(js_name = "setLogLevel")]
pub fn set_log_level(level: &str) {
    logging::init(logging::parse_level(level));
}

fn to_js_error(error: GameError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    to_js_error(GameError::Serialization {
        reason: error.to_string(),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

fn now_ms() -> Millis {
    Date::now() as Millis
}

fn checked_state(state: JsValue) -> Result<SessionState, JsValue> {
    let state: SessionState = from_value(state).map_err(serde_to_js_error)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(error.into()))?;
    Ok(state)
}

#[derive(Default)]
struct Listeners {
    on_change: Option<Function>,
    on_complete: Option<Function>,
}

fn call_listener(listener: Option<Function>, payload: &str) {
    if let Some(listener) = listener {
        if let Err(error) = listener.call1(&JsValue::NULL, &JsValue::from_str(payload)) {
            warn!("listener threw: {error:?}");
        }
    }
}

/// 把定时判定产生的快照和事件交给前端。
fn dispatch(listeners: &Rc<RefCell<Listeners>>, view: &SessionView, events: &[GameEvent]) {
    if events.is_empty() {
        return;
    }
    let payload = match to_json(view) {
        Ok(json) => json,
        Err(error) => {
            warn!("failed to serialize view: {error:?}");
            return;
        }
    };
    let (on_change, on_complete) = {
        let listeners = listeners.borrow();
        (listeners.on_change.clone(), listeners.on_complete.clone())
    };
    call_listener(on_change, &payload);
    if events
        .iter()
        .any(|event| matches!(event, GameEvent::GameWon { .. }))
    {
        call_listener(on_complete, &payload);
    }
}

#[wasm_bindgen]
pub struct GameEngine {
    session: Rc<RefCell<MatchSession>>,
    listeners: Rc<RefCell<Listeners>>,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameEngine, JsValue> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json).map_err(to_js_error)?,
            None => GameConfig::default(),
        };
        info!("new memory match engine with {} pairs", config.pairs);
        let session = MatchSession::new(config).map_err(to_js_error)?;
        Ok(GameEngine {
            session: Rc::new(RefCell::new(session)),
            listeners: Rc::new(RefCell::new(Listeners::default())),
        })
    }

    pub fn config_json(&self) -> Result<String, JsValue> {
        to_json(self.session.borrow().config())
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(self.session.borrow().state())
    }

    pub fn view_json(&self) -> Result<String, JsValue> {
        to_json(&self.session.borrow().view())
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: SessionState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        let now = now_ms();
        let scheduled = self
            .session
            .borrow_mut()
            .replace_state(state, now)
            .map_err(to_js_error)?;
        if let Some(scheduled) = scheduled {
            self.arm_timer(now.saturating_add(u64::from(scheduled.delay_ms)), scheduled.delay_ms);
        }
        Ok(())
    }

    pub fn set_listener(&mut self, listener: Option<Function>) {
        self.listeners.borrow_mut().on_change = listener;
    }

    pub fn set_completion_listener(&mut self, listener: Option<Function>) {
        self.listeners.borrow_mut().on_complete = listener;
    }

    pub fn click(&mut self, index: usize) -> Result<String, JsValue> {
        let now = now_ms();
        let transition = self.session.borrow_mut().click(index, now);
        if let Some(scheduled) = transition.scheduled {
            self.arm_timer(now.saturating_add(u64::from(scheduled.delay_ms)), scheduled.delay_ms);
        }
        to_json(&transition)
    }

    pub fn reset(&mut self) -> Result<String, JsValue> {
        let transition = self.session.borrow_mut().reset();
        to_json(&transition)
    }

    /// 仅供调试：立即执行所有已到期的判定。
    pub fn flush(&mut self) -> Result<String, JsValue> {
        let (events, view) = {
            let mut session = self.session.borrow_mut();
            let events = session.advance_to(now_ms());
            (events, session.view())
        };
        dispatch(&self.listeners, &view, &events);
        to_json(&events)
    }

    fn arm_timer(&self, due_at: Millis, delay_ms: u32) {
        let session = Rc::clone(&self.session);
        let listeners = Rc::clone(&self.listeners);
        spawn_local(async move {
            TimeoutFuture::new(delay_ms).await;
            // 重开游戏后旧会话的判定已被丢弃，这里不会产生事件
            let (events, view) = {
                let mut session = session.borrow_mut();
                let events = session.advance_to(due_at);
                (events, session.view())
            };
            dispatch(&listeners, &view, &events);
        });
    }
}

/// 生成一副打乱顺序的新牌。
#[wasm_bindgen(js_name = "createCards")]
pub fn create_cards_js() -> Result<JsValue, JsValue> {
    let mut rng = SmallRng::from_entropy();
    to_value(&create_cards(&mut rng)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "defaultConfig")]
pub fn default_config() -> Result<JsValue, JsValue> {
    to_value(&GameConfig::default()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "createSession")]
pub fn create_session() -> Result<JsValue, JsValue> {
    let mut rng = SmallRng::from_entropy();
    let state = RuleEngine::default().new_session(&mut rng, 0);
    to_value(&state).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "handleClick")]
pub fn handle_click(state: JsValue, index: usize) -> Result<JsValue, JsValue> {
    let state = checked_state(state)?;
    let transition = RuleEngine::default().handle_click(&state, index);
    to_value(&transition).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "resolvePending")]
pub fn resolve_pending(state: JsValue, resolution: JsValue) -> Result<JsValue, JsValue> {
    let state = checked_state(state)?;
    let resolution: ScheduledResolution = from_value(resolution).map_err(serde_to_js_error)?;
    let transition = RuleEngine::default().resolve(&state, &resolution);
    to_value(&transition).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "resetGame")]
pub fn reset_game(state: JsValue) -> Result<JsValue, JsValue> {
    let state: SessionState = from_value(state).map_err(serde_to_js_error)?;
    let mut rng = SmallRng::from_entropy();
    let transition = RuleEngine::default().reset(&state, &mut rng);
    to_value(&transition).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    checked_state(state).map(|_| ())
}
