#![forbid(unsafe_code)]

//! Pointer input snapshots.
//!
//! An [`Input`] captures pointer position, pressed buttons and held modifier
//! keys at one instant. It is re-derived from every native event and never
//! mutated afterwards; the lifecycle keeps the latest snapshot in the current
//! [`DragLocation`](crate::types::DragLocation).
//!
//! # Design Notes
//!
//! - Coordinates are `f64` host units (client space and page space).
//! - `button` is the button that changed state for this event, if any;
//!   `buttons` is everything currently held.
//! - `Modifiers` and `MouseButtons` use bitflags for easy combination.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held during a pointer event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Meta/Command/Windows key.
        const META  = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

bitflags! {
    /// Set of mouse buttons currently held down.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MouseButtons: u8 {
        /// Primary (usually left) button.
        const PRIMARY   = 0b0_0001;
        /// Secondary (usually right) button.
        const SECONDARY = 0b0_0010;
        /// Auxiliary (wheel/middle) button.
        const AUXILIARY = 0b0_0100;
        /// Browser "back" button.
        const BACK      = 0b0_1000;
        /// Browser "forward" button.
        const FORWARD   = 0b1_0000;
    }
}

impl Default for MouseButtons {
    fn default() -> Self {
        Self::empty()
    }
}

/// A single mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Primary (usually left) button.
    Primary,
    /// Secondary (usually right) button.
    Secondary,
    /// Auxiliary (wheel/middle) button.
    Auxiliary,
    /// Browser "back" button.
    Back,
    /// Browser "forward" button.
    Forward,
}

impl MouseButton {
    /// The [`MouseButtons`] flag for this button.
    #[must_use]
    pub const fn flag(self) -> MouseButtons {
        match self {
            Self::Primary => MouseButtons::PRIMARY,
            Self::Secondary => MouseButtons::SECONDARY,
            Self::Auxiliary => MouseButtons::AUXILIARY,
            Self::Back => MouseButtons::BACK,
            Self::Forward => MouseButtons::FORWARD,
        }
    }
}

/// Immutable pointer snapshot taken from one native event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Input {
    /// X coordinate relative to the viewport.
    pub client_x: f64,
    /// Y coordinate relative to the viewport.
    pub client_y: f64,
    /// X coordinate relative to the whole page (viewport + scroll).
    pub page_x: f64,
    /// Y coordinate relative to the whole page (viewport + scroll).
    pub page_y: f64,
    /// Button that changed state for this event, if any.
    pub button: Option<MouseButton>,
    /// Buttons currently held.
    pub buttons: MouseButtons,
    /// Modifier keys currently held.
    pub modifiers: Modifiers,
}

impl Input {
    /// Create a snapshot at a client position with no buttons or modifiers.
    ///
    /// Page coordinates start equal to client coordinates (no scroll offset).
    #[must_use]
    pub const fn at(client_x: f64, client_y: f64) -> Self {
        Self {
            client_x,
            client_y,
            page_x: client_x,
            page_y: client_y,
            button: None,
            buttons: MouseButtons::empty(),
            modifiers: Modifiers::NONE,
        }
    }

    /// Set the page position.
    #[must_use]
    pub const fn with_page(mut self, page_x: f64, page_y: f64) -> Self {
        self.page_x = page_x;
        self.page_y = page_y;
        self
    }

    /// Set the held buttons.
    #[must_use]
    pub const fn with_buttons(mut self, buttons: MouseButtons) -> Self {
        self.buttons = buttons;
        self
    }

    /// Set the button that changed state.
    #[must_use]
    pub const fn with_button(mut self, button: MouseButton) -> Self {
        self.button = Some(button);
        self
    }

    /// Set the held modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Client position as a tuple.
    #[must_use]
    pub const fn client_position(&self) -> (f64, f64) {
        (self.client_x, self.client_y)
    }

    /// True if no mouse button is held.
    #[must_use]
    pub const fn no_buttons(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Check if Shift is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    /// Check if Alt/Option is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Ctrl is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Meta/Command is held.
    #[must_use]
    pub const fn meta(&self) -> bool {
        self.modifiers.contains(Modifiers::META)
    }
}
