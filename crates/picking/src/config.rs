use serde::{Deserialize, Serialize};

/// Picking behaviour switches. All flags are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PickingConfig {
    /// Manual entry cannot complete an operation without a prior product/location scan.
    pub verification_required: bool,
    /// Completed zones and locations leave the active view.
    pub collapse_on_complete: bool,
    /// Completing an operation selects the next pending one.
    pub auto_next: bool,
    pub audio_feedback: bool,
    pub vibration_feedback: bool,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            verification_required: false,
            collapse_on_complete: true,
            auto_next: true,
            audio_feedback: true,
            vibration_feedback: true,
        }
    }
}

impl PickingConfig {
    pub fn with_verification_required(mut self, on: bool) -> Self {
        self.verification_required = on;
        self
    }

    pub fn with_auto_next(mut self, on: bool) -> Self {
        self.auto_next = on;
        self
    }

    pub fn with_collapse_on_complete(mut self, on: bool) -> Self {
        self.collapse_on_complete = on;
        self
    }

    /// Device cue for an outcome, honouring the feedback switches.
    pub fn feedback(&self, success: bool) -> Feedback {
        Feedback {
            sound: self.audio_feedback.then_some(if success {
                Tone::Success
            } else {
                Tone::Error
            }),
            vibrate: self.vibration_feedback && !success,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    Error,
}

/// Cue the device layer should play alongside an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Feedback {
    pub sound: Option<Tone>,
    pub vibrate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: PickingConfig = serde_json::from_str(r#"{"verificationRequired":true}"#).unwrap();
        assert!(cfg.verification_required);
        assert!(cfg.auto_next);
        assert!(cfg.collapse_on_complete);
    }

    #[test]
    fn feedback_follows_switches() {
        let cfg = PickingConfig::default();
        assert_eq!(
            cfg.feedback(false),
            Feedback {
                sound: Some(Tone::Error),
                vibrate: true
            }
        );
        let silent = PickingConfig {
            audio_feedback: false,
            vibration_feedback: false,
            ..PickingConfig::default()
        };
        assert_eq!(silent.feedback(false), Feedback::default());
    }
}
