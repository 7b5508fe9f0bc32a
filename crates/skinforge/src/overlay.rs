//! Preview overlay lifecycle: `Closed → Opening → Open → Closed`.
//!
//! The overlay is a single-slot resource. Opening a new one requires the
//! previous one to be fully closed, and a failure while opening always lands
//! back in `Closed`.

use serde::{Deserialize, Serialize};

use crate::types::{SkinError, SkinResult};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OverlayState {
    #[default]
    Closed,
    Opening { target: String },
    Open { target: String },
}

impl OverlayState {
    pub fn is_closed(&self) -> bool {
        matches!(self, OverlayState::Closed)
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            OverlayState::Closed => None,
            OverlayState::Opening { target } | OverlayState::Open { target } => Some(target),
        }
    }

    /// `Closed → Opening`.
    pub fn begin_open(&mut self, target: impl Into<String>) -> SkinResult<()> {
        if !self.is_closed() {
            return Err(SkinError::Overlay(format!(
                "cannot open while {self:?}"
            )));
        }
        *self = OverlayState::Opening {
            target: target.into(),
        };
        Ok(())
    }

    /// `Opening → Open`.
    pub fn opened(&mut self) -> SkinResult<()> {
        match std::mem::take(self) {
            OverlayState::Opening { target } => {
                *self = OverlayState::Open { target };
                Ok(())
            }
            other => {
                let msg = format!("cannot finish opening from {other:?}");
                *self = other;
                Err(SkinError::Overlay(msg))
            }
        }
    }

    /// `Opening → Closed` after a failure, logging why.
    pub fn fail_open(&mut self, reason: &str) {
        if let OverlayState::Opening { target } = self {
            tracing::warn!(overlay = %target, "overlay failed to open: {reason}");
        }
        *self = OverlayState::Closed;
    }

    /// Any state `→ Closed`.
    pub fn close(&mut self) {
        *self = OverlayState::Closed;
    }
}
