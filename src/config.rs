//! 游戏参数（配对数量、翻牌判定延迟、棋盘列数）。

use serde::{Deserialize, Serialize};

use crate::game::deck::{ALL_SYMBOLS, DEFAULT_PAIRS};
use crate::game::GameError;

pub const DEFAULT_MATCH_DELAY_MS: u32 = 500;
pub const DEFAULT_MISMATCH_DELAY_MS: u32 = 1_000;
pub const DEFAULT_GRID_COLUMNS: u8 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    pub pairs: usize,
    pub match_delay_ms: u32,
    /// 必须不小于 `match_delay_ms`，让不匹配的牌停留得更久。
    pub mismatch_delay_ms: u32,
    /// 仅供前端排版使用。
    pub grid_columns: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS,
            match_delay_ms: DEFAULT_MATCH_DELAY_MS,
            mismatch_delay_ms: DEFAULT_MISMATCH_DELAY_MS,
            grid_columns: DEFAULT_GRID_COLUMNS,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let config: GameConfig =
            serde_json::from_str(json).map_err(|err| GameError::InvalidConfig {
                reason: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_delays(mut self, match_delay_ms: u32, mismatch_delay_ms: u32) -> Self {
        self.match_delay_ms = match_delay_ms;
        self.mismatch_delay_ms = mismatch_delay_ms;
        self
    }

    pub fn with_pairs(mut self, pairs: usize) -> Self {
        self.pairs = pairs;
        self
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.pairs == 0 || self.pairs > ALL_SYMBOLS.len() {
            return Err(GameError::InvalidConfig {
                reason: format!(
                    "pairs must be between 1 and {}, got {}",
                    ALL_SYMBOLS.len(),
                    self.pairs
                ),
            });
        }
        if self.match_delay_ms == 0 {
            return Err(GameError::InvalidConfig {
                reason: "match_delay_ms must be greater than zero".into(),
            });
        }
        if self.mismatch_delay_ms < self.match_delay_ms {
            return Err(GameError::InvalidConfig {
                reason: format!(
                    "mismatch_delay_ms ({}) must not be shorter than match_delay_ms ({})",
                    self.mismatch_delay_ms, self.match_delay_ms
                ),
            });
        }
        if self.grid_columns == 0 {
            return Err(GameError::InvalidConfig {
                reason: "grid_columns must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
