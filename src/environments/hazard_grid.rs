use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::environment::{Environment, StepResult};
use crate::error::RlError;

/// A grid cell, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridState {
    pub row: usize,
    pub col: usize,
}

impl GridState {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridAction {
    Up,
    Right,
    Down,
    Left,
}

impl GridAction {
    pub const COUNT: usize = 4;
    pub const ALL: [GridAction; Self::COUNT] = [
        GridAction::Up,
        GridAction::Right,
        GridAction::Down,
        GridAction::Left,
    ];

    /// The only lossy conversion boundary; indices >= 4 are rejected here,
    /// never defaulted.
    pub fn from_index(index: usize) -> Result<Self, RlError> {
        match index {
            0 => Ok(GridAction::Up),
            1 => Ok(GridAction::Right),
            2 => Ok(GridAction::Down),
            3 => Ok(GridAction::Left),
            _ => Err(RlError::InvalidAction(index)),
        }
    }

    pub fn index(self) -> usize {
        match self {
            GridAction::Up => 0,
            GridAction::Right => 1,
            GridAction::Down => 2,
            GridAction::Left => 3,
        }
    }

    fn delta(self) -> (isize, isize) {
        match self {
            GridAction::Up => (-1, 0),
            GridAction::Right => (0, 1),
            GridAction::Down => (1, 0),
            GridAction::Left => (0, -1),
        }
    }
}

/// Grid layout and cost parameters, immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub height: usize,
    pub width: usize,
    pub start: GridState,
    pub goal: GridState,
    pub hazards: HashSet<GridState>,
    pub hazard_fail_prob: f64,
    pub step_cost: f64,
    pub hazard_penalty_cost: f64,
    pub goal_cost: f64,
}

impl Default for GridConfig {
    /// 5x5 grid, hazard in the middle of the direct column route.
    fn default() -> Self {
        Self {
            height: 5,
            width: 5,
            start: GridState::new(0, 0),
            goal: GridState::new(4, 0),
            hazards: HashSet::from([GridState::new(2, 0)]),
            hazard_fail_prob: 0.1,
            step_cost: 1.0,
            hazard_penalty_cost: 10.0,
            goal_cost: 0.0,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), RlError> {
        if self.height == 0 || self.width == 0 {
            return Err(RlError::Configuration(format!(
                "grid dimensions must be positive, got {}x{}",
                self.height, self.width
            )));
        }
        for (name, s) in [("start", self.start), ("goal", self.goal)] {
            if s.row >= self.height || s.col >= self.width {
                return Err(RlError::Configuration(format!(
                    "{name} state ({}, {}) outside {}x{} grid",
                    s.row, s.col, self.height, self.width
                )));
            }
        }
        if self.start == self.goal {
            return Err(RlError::Configuration(
                "start and goal must be distinct".into(),
            ));
        }
        if self.hazards.contains(&self.goal) {
            return Err(RlError::Configuration(
                "goal cell cannot be a hazard".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.hazard_fail_prob) {
            return Err(RlError::Configuration(format!(
                "hazard_fail_prob must be in [0, 1], got {}",
                self.hazard_fail_prob
            )));
        }
        for (name, c) in [
            ("step_cost", self.step_cost),
            ("hazard_penalty_cost", self.hazard_penalty_cost),
            ("goal_cost", self.goal_cost),
        ] {
            if !c.is_finite() || c < 0.0 {
                return Err(RlError::Configuration(format!(
                    "{name} must be finite and non-negative, got {c}"
                )));
            }
        }
        Ok(())
    }
}

/// Grid world with a probabilistic hazard. Entering a hazard cell draws a
/// Bernoulli event: on failure the penalty cost is charged instead of the
/// step cost. The hazard never terminates the episode; only the goal does.
pub struct HazardGrid {
    config: GridConfig,
}

impl HazardGrid {
    pub fn new(config: GridConfig) -> Result<Self, RlError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }
}

impl Environment for HazardGrid {
    type State = GridState;
    type Action = GridAction;

    fn start_state(&self) -> GridState {
        self.config.start
    }

    fn step<R: Rng>(&self, state: GridState, action: GridAction, rng: &mut R) -> StepResult<GridState> {
        let (dr, dc) = action.delta();
        let nr = state.row as isize + dr;
        let nc = state.col as isize + dc;

        if nr < 0 || nr >= self.config.height as isize || nc < 0 || nc >= self.config.width as isize {
            // Off-grid move: stay in place, still pay the step cost.
            return StepResult {
                next_state: state,
                cost: self.config.step_cost,
                terminal: false,
            };
        }

        let next_state = GridState::new(nr as usize, nc as usize);
        if next_state == self.config.goal {
            StepResult {
                next_state,
                cost: self.config.goal_cost,
                terminal: true,
            }
        } else if self.config.hazards.contains(&next_state) {
            let cost = if rng.random::<f64>() < self.config.hazard_fail_prob {
                self.config.hazard_penalty_cost
            } else {
                self.config.step_cost
            };
            StepResult {
                next_state,
                cost,
                terminal: false,
            }
        } else {
            StepResult {
                next_state,
                cost: self.config.step_cost,
                terminal: false,
            }
        }
    }

    fn action_space(&self) -> usize {
        GridAction::COUNT
    }
}
