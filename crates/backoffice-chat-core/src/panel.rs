//! Floating panel visibility and geometry
//!
//! Sizes and positions are in pixels. The host reports its viewport with
//! [`PanelStore::set_viewport`]; the fullscreen preset and the manual-resize
//! clamps read it at call time.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::observable::{StateCell, Subscription};

pub const MIN_WIDTH: i32 = 300;
pub const MIN_HEIGHT: i32 = 400;
/// Largest share of the viewport a manual resize may take
pub const MAX_VIEWPORT_FRACTION: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMode {
    Minimized,
    #[default]
    Normal,
    Expanded,
    Fullscreen,
}

impl SizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeMode::Minimized => "minimized",
            SizeMode::Normal => "normal",
            SizeMode::Expanded => "expanded",
            SizeMode::Fullscreen => "fullscreen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn max_panel_width(&self) -> f64 {
        self.width as f64 * MAX_VIEWPORT_FRACTION
    }

    pub fn max_panel_height(&self) -> f64 {
        self.height as f64 * MAX_VIEWPORT_FRACTION
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 800)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub is_open: bool,
    pub size: SizeMode,
    pub width: i32,
    pub height: i32,
    pub position: Position,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            is_open: false,
            size: SizeMode::Normal,
            width: 400,
            height: 600,
            position: Position::new(20, 20),
        }
    }
}

/// Canonical `(width, height)` for a size preset
pub fn preset_dimensions(mode: SizeMode, viewport: Viewport) -> (i32, i32) {
    match mode {
        SizeMode::Minimized => (400, 200),
        SizeMode::Normal => (400, 600),
        SizeMode::Expanded => (600, 800),
        SizeMode::Fullscreen => (viewport.width, viewport.height),
    }
}

/// Clamp a manual width to `[MIN_WIDTH, 0.9 * viewport width]`.
/// The minimum wins when the viewport is too narrow for the range.
pub fn clamp_width(width: f64, viewport: Viewport) -> i32 {
    width.min(viewport.max_panel_width()).max(MIN_WIDTH as f64).round() as i32
}

/// Clamp a manual height to `[MIN_HEIGHT, 0.9 * viewport height]`
pub fn clamp_height(height: f64, viewport: Viewport) -> i32 {
    height.min(viewport.max_panel_height()).max(MIN_HEIGHT as f64).round() as i32
}

pub struct PanelStore {
    state: StateCell<PanelState>,
    is_open: StateCell<bool>,
    viewport: StateCell<Viewport>,
}

impl Default for PanelStore {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl PanelStore {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: StateCell::new(PanelState::default()),
            is_open: StateCell::new(false),
            viewport: StateCell::new(viewport),
        }
    }

    pub fn state(&self) -> PanelState {
        self.state.get()
    }

    pub fn subscribe(&self) -> Subscription<PanelState> {
        self.state.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.is_open.get()
    }

    /// Open-flag projection of the panel state
    pub fn subscribe_open(&self) -> Subscription<bool> {
        self.is_open.subscribe()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.viewport.set(viewport);
    }

    pub fn open(&self) {
        self.apply(|state| state.is_open = true);
    }

    pub fn toggle(&self) {
        self.apply(|state| state.is_open = !state.is_open);
    }

    /// Closing always forgets any size preset
    pub fn close(&self) {
        self.apply(|state| {
            state.is_open = false;
            state.size = SizeMode::Normal;
        });
    }

    /// Apply a size preset. Asking for the preset that is already active
    /// returns the panel to normal.
    pub fn set_size(&self, mode: SizeMode) {
        let current = self.state.with(|state| state.size);
        let target = if current == mode {
            SizeMode::Normal
        } else {
            mode
        };

        let (width, height) = preset_dimensions(target, self.viewport());
        debug!(from = current.as_str(), to = target.as_str(), width, height, "panel size");

        self.apply(|state| {
            state.size = target;
            state.width = width;
            state.height = height;
        });
    }

    /// Manual resize: clamps both axes and drops any preset
    pub fn update_dimensions(&self, width: f64, height: f64) {
        let viewport = self.viewport();
        let width = clamp_width(width, viewport);
        let height = clamp_height(height, viewport);

        self.apply(|state| {
            state.width = width;
            state.height = height;
            state.size = SizeMode::Normal;
        });
    }

    pub fn update_position(&self, x: i32, y: i32) {
        self.apply(|state| state.position = Position::new(x, y));
    }

    fn apply(&self, f: impl FnOnce(&mut PanelState)) {
        self.state.update(f);
        let is_open = self.state.with(|state| state.is_open);
        if self.is_open.get() != is_open {
            self.is_open.set(is_open);
        }
    }
}
