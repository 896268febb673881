use chrono::{DateTime, Utc};

/// Phase-boundary feedback: two distinct tones plus a vibration pattern.
/// Implementations are side-effect only and must never fail loudly; a cue
/// that cannot be delivered is recorded and dropped.
pub trait FeedbackSink {
    fn play_countdown_tone(&mut self);
    fn play_completion_tone(&mut self);
    /// Alternating on/off durations in milliseconds.
    fn vibrate(&mut self, pattern: &[u64]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueKind {
    CountdownTone,
    CompletionTone,
    Vibration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueOutcome {
    Delivered,
    Muted,
    Unsupported,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueRecord {
    pub kind: CueKind,
    pub outcome: CueOutcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    #[default]
    System,
    Disabled,
}

/// Desktop sink: short system sounds where the platform has them, the
/// terminal bell otherwise. Vibration does not exist on a desktop and is
/// recorded as unsupported.
#[derive(Debug, Default)]
pub struct DesktopFeedback {
    muted: bool,
    playback_mode: PlaybackMode,
    log: Vec<CueRecord>,
}

impl DesktopFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playback_mode(playback_mode: PlaybackMode) -> Self {
        Self {
            muted: false,
            playback_mode,
            log: Vec::new(),
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn toggle_muted(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn records(&self) -> &[CueRecord] {
        &self.log
    }

    fn deliver_tone(&mut self, kind: CueKind) {
        let outcome = if self.muted {
            CueOutcome::Muted
        } else if matches!(self.playback_mode, PlaybackMode::Disabled) {
            CueOutcome::Unsupported
        } else {
            match play_tone(kind) {
                Ok(()) => CueOutcome::Delivered,
                Err(()) => CueOutcome::Failed,
            }
        };
        self.log.push(CueRecord {
            kind,
            outcome,
            timestamp: Utc::now(),
        });
    }
}

impl FeedbackSink for DesktopFeedback {
    fn play_countdown_tone(&mut self) {
        self.deliver_tone(CueKind::CountdownTone);
    }

    fn play_completion_tone(&mut self) {
        self.deliver_tone(CueKind::CompletionTone);
    }

    fn vibrate(&mut self, _pattern: &[u64]) {
        self.log.push(CueRecord {
            kind: CueKind::Vibration,
            outcome: CueOutcome::Unsupported,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(target_os = "macos")]
fn play_tone(kind: CueKind) -> Result<(), ()> {
    use std::process::Command;

    let path = match kind {
        CueKind::CompletionTone => "/System/Library/Sounds/Glass.aiff",
        _ => "/System/Library/Sounds/Tink.aiff",
    };
    match Command::new("afplay").arg(path).spawn() {
        Ok(_) => Ok(()),
        Err(_) => Err(()),
    }
}

#[cfg(not(target_os = "macos"))]
fn play_tone(_kind: CueKind) -> Result<(), ()> {
    use std::io::Write;

    // Terminal bell; in raw mode the emulator still rings it.
    let mut stdout = std::io::stdout();
    stdout
        .write_all(b"\x07")
        .and_then(|_| stdout.flush())
        .map_err(|_| ())
}

/// Test sink that remembers every cue in order.
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    pub cues: Vec<CueKind>,
    pub patterns: Vec<Vec<u64>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn play_countdown_tone(&mut self) {
        self.cues.push(CueKind::CountdownTone);
    }

    fn play_completion_tone(&mut self) {
        self.cues.push(CueKind::CompletionTone);
    }

    fn vibrate(&mut self, pattern: &[u64]) {
        self.cues.push(CueKind::Vibration);
        self.patterns.push(pattern.to_vec());
    }
}
