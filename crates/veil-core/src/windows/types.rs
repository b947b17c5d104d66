use serde::{Deserialize, Serialize};

/// Opaque window identifier assigned by the host windowing system.
///
/// Stable for the lifetime of the window. The value 0 is reserved and never
/// refers to a real window.
pub type WindowId = u32;

/// A lifecycle notification for one window.
///
/// Delivery is at-least-once: events may arrive duplicated and in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvent {
    pub window_id: WindowId,
    pub kind: WindowEventKind,
}

impl WindowEvent {
    pub fn new(window_id: WindowId, kind: WindowEventKind) -> Self {
        Self { window_id, kind }
    }
}

/// Lifecycle notification kinds delivered by the windowing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEventKind {
    Created,
    Destroyed,
    OrderedIn,
    OrderedOut,
    Resized,
    Updated,
    Focused,
    Unfocused,
}

/// Window metadata returned by the windowing system, sufficient for
/// classification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMetadata {
    /// Process owning the window.
    pub owner_pid: i32,
    /// Z-order level (0 = normal application window).
    pub level: i32,
    /// Overall window alpha, 0.0-1.0.
    pub alpha: f32,
    pub width: f64,
    pub height: f64,
    /// Parent window for attached sheets/dialogs, if any.
    pub parent_id: Option<WindowId>,
}

impl WindowMetadata {
    /// Metadata of a plain application window, useful as a test fixture.
    pub fn standard(owner_pid: i32) -> Self {
        Self {
            owner_pid,
            level: 0,
            alpha: 1.0,
            width: 800.0,
            height: 600.0,
            parent_id: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

fn default_level() -> i32 {
    // Floating level: above normal windows, below system chrome.
    3
}

/// Attribute set applied to an eligible window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationOptions {
    /// Keep the window above normal windows.
    #[serde(default = "default_true")]
    pub keep_above: bool,

    /// The window does not take key focus when clicked.
    #[serde(default = "default_true")]
    pub non_activating: bool,

    /// Exclude the window from screen capture and screenshots.
    #[serde(default = "default_true")]
    pub exclude_from_capture: bool,

    /// Window opacity, 0.0-1.0.
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Target z-order level.
    #[serde(default = "default_level")]
    pub level: i32,
}

impl Default for ModificationOptions {
    fn default() -> Self {
        Self {
            keep_above: true,
            non_activating: true,
            exclude_from_capture: true,
            opacity: 1.0,
            level: default_level(),
        }
    }
}
