//! Pure helpers: event-to-bit mapping and metadata classification.

use crate::tracker::types::{InitFlags, WindowClass};
use crate::windows::types::{WindowEventKind, WindowMetadata};

/// Z-order level at or above which a window counts as OS chrome.
const SYSTEM_LEVEL: i32 = 25;

/// Windows smaller than this in either dimension are offscreen helpers.
const HELPER_MAX_DIMENSION: f64 = 2.0;

/// The readiness bit contributed by a lifecycle notification, if any.
///
/// Ordering-out, focus changes and destruction carry no readiness signal.
pub fn readiness_flag(kind: WindowEventKind) -> Option<InitFlags> {
    match kind {
        WindowEventKind::Created => Some(InitFlags::CREATED),
        WindowEventKind::OrderedIn => Some(InitFlags::VISIBLE),
        WindowEventKind::Resized => Some(InitFlags::SIZED),
        WindowEventKind::Updated => Some(InitFlags::CONTENT_READY),
        WindowEventKind::Destroyed
        | WindowEventKind::OrderedOut
        | WindowEventKind::Focused
        | WindowEventKind::Unfocused => None,
    }
}

/// Classify a window from its metadata.
///
/// Never returns `Unknown`: once metadata is available the classification is
/// definite and gets cached, so a window can never be downgraded back to
/// unclassified.
pub fn classify(metadata: &WindowMetadata) -> WindowClass {
    if metadata.level >= SYSTEM_LEVEL || metadata.level < 0 {
        return WindowClass::System;
    }
    if metadata.parent_id.is_some() {
        return WindowClass::Sheet;
    }
    if metadata.width < HELPER_MAX_DIMENSION
        || metadata.height < HELPER_MAX_DIMENSION
        || metadata.alpha == 0.0
    {
        return WindowClass::Helper;
    }
    if metadata.level > 0 {
        return WindowClass::Panel;
    }
    WindowClass::Standard
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> WindowMetadata {
        WindowMetadata::standard(100)
    }

    #[test]
    fn test_readiness_flag_mapping() {
        assert_eq!(
            readiness_flag(WindowEventKind::Created),
            Some(InitFlags::CREATED)
        );
        assert_eq!(
            readiness_flag(WindowEventKind::OrderedIn),
            Some(InitFlags::VISIBLE)
        );
        assert_eq!(
            readiness_flag(WindowEventKind::Resized),
            Some(InitFlags::SIZED)
        );
        assert_eq!(
            readiness_flag(WindowEventKind::Updated),
            Some(InitFlags::CONTENT_READY)
        );
        assert_eq!(readiness_flag(WindowEventKind::Destroyed), None);
        assert_eq!(readiness_flag(WindowEventKind::OrderedOut), None);
        assert_eq!(readiness_flag(WindowEventKind::Focused), None);
        assert_eq!(readiness_flag(WindowEventKind::Unfocused), None);
    }

    #[test]
    fn test_classify_standard_window() {
        assert_eq!(classify(&meta()), WindowClass::Standard);
    }

    #[test]
    fn test_classify_system_chrome() {
        let mut m = meta();
        m.level = 25;
        assert_eq!(classify(&m), WindowClass::System);

        m.level = 1000;
        assert_eq!(classify(&m), WindowClass::System);

        // Desktop-level windows below normal are chrome too.
        m.level = -1;
        assert_eq!(classify(&m), WindowClass::System);
    }

    #[test]
    fn test_classify_sheet_by_parent() {
        let mut m = meta();
        m.parent_id = Some(3);
        assert_eq!(classify(&m), WindowClass::Sheet);
    }

    #[test]
    fn test_classify_helper_by_size_and_alpha() {
        let mut m = meta();
        m.width = 1.0;
        m.height = 1.0;
        assert_eq!(classify(&m), WindowClass::Helper);

        let mut m = meta();
        m.alpha = 0.0;
        assert_eq!(classify(&m), WindowClass::Helper);
    }

    #[test]
    fn test_classify_panel_by_level() {
        let mut m = meta();
        m.level = 3;
        assert_eq!(classify(&m), WindowClass::Panel);
    }

    #[test]
    fn test_classify_never_returns_unknown() {
        // System beats sheet: a chrome-level window with a parent is chrome.
        let mut m = meta();
        m.level = 30;
        m.parent_id = Some(1);
        assert_eq!(classify(&m), WindowClass::System);
    }
}
