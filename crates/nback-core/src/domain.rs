//! Core domain types: modalities, modes, stimulus identities, trial records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Compute time delta with saturating subtraction to prevent wraparound.
/// If clocks go backwards (now < last), returns 0 instead of wrapping.
#[inline]
pub fn dt_us(now_us: i64, last_us: i64) -> u64 {
    if now_us >= last_us {
        (now_us - last_us) as u64
    } else {
        0
    }
}

/// Time delta in whole milliseconds, saturating like [`dt_us`].
#[inline]
pub fn dt_ms(now_us: i64, last_us: i64) -> u64 {
    dt_us(now_us, last_us) / 1_000
}

/// An independent stimulus channel the subject can respond to.
///
/// Every trial carries one history entry per modality; a modality that was
/// not presented records an absent entry so indices stay aligned across
/// channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Location,
    Color,
    Audio,
}

impl Modality {
    /// Total number of modalities
    pub const COUNT: usize = 3;

    /// All modalities in response-priority order (Location > Color > Audio).
    pub const ALL: [Modality; 3] = [Modality::Location, Modality::Color, Modality::Audio];

    pub fn index(&self) -> usize {
        match self {
            Modality::Location => 0,
            Modality::Color => 1,
            Modality::Audio => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Modality::Location => "Location",
            Modality::Color => "Color",
            Modality::Audio => "Audio",
        }
    }

    /// Single-letter response key label used in exported records ("L;C;A;").
    pub fn key_label(&self) -> &'static str {
        match self {
            Modality::Location => "L",
            Modality::Color => "C",
            Modality::Audio => "A",
        }
    }
}

/// Which modality subset is active for a trial-generation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Visual,
    Auditory,
    Spatial,
    Combined,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Visual => "Visual",
            Mode::Auditory => "Auditory",
            Mode::Spatial => "Spatial",
            Mode::Combined => "Combined",
        }
    }

    /// Instruction line shown to the subject when this phase starts.
    pub fn instruction(&self, n: u32) -> String {
        match self {
            Mode::Visual => format!("Phase: Color Matching (N={})", n),
            Mode::Auditory => format!("Phase: Sound Matching (N={})", n),
            Mode::Spatial => format!("Phase: Location Matching (N={})", n),
            Mode::Combined => {
                if n > 2 {
                    format!("Challenge: Combined Mode (N={})", n)
                } else {
                    format!("Phase: Combined Mode (N={})", n)
                }
            }
        }
    }
}

/// How block accuracy drives difficulty progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProgressionPolicy {
    /// Advance only on sufficient accuracy; N grows without bound.
    #[default]
    Adaptive,
    /// Advance unconditionally; terminate after the fixed sequence.
    Fixed,
}

impl std::str::FromStr for ProgressionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("adaptive") {
            Ok(ProgressionPolicy::Adaptive)
        } else if s.eq_ignore_ascii_case("fixed") {
            Ok(ProgressionPolicy::Fixed)
        } else {
            Err(format!("unknown progression policy: {}", s))
        }
    }
}

/// Grid cell identity. Equality is on the index, not the rendered cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct CellIndex(pub u16);

/// Palette color identity (index into the configured color palette).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ColorId(pub u8);

/// Audio clip identity (index into the configured clip table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ClipId(pub u8);

/// What the presentation collaborator paints into a highlighted cell.
///
/// Spatial trials highlight with a neutral marker swatch rather than a
/// palette color, so the highlight never leaks a color identity the trial
/// did not present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Highlight {
    Palette(ColorId),
    Marker,
}

/// Final classification of a trial once its response window has closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Outcome {
    #[default]
    NoResponse,
    Correct,
    FalseAlarm,
    MissLocation,
    MissColor,
    MissAudio,
}

impl Outcome {
    /// Label used in exported records.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::NoResponse => "NoResponse",
            Outcome::Correct => "Correct",
            Outcome::FalseAlarm => "FalseAlarm",
            Outcome::MissLocation => "Miss_Location",
            Outcome::MissColor => "Miss_Color",
            Outcome::MissAudio => "Miss_Audio",
        }
    }

    pub fn miss_for(modality: Modality) -> Outcome {
        match modality {
            Modality::Location => Outcome::MissLocation,
            Modality::Color => Outcome::MissColor,
            Modality::Audio => Outcome::MissAudio,
        }
    }
}

/// Session identity for exported records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionId([u8; 16]);

impl SessionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Uuid::from_bytes(self.0).fmt(f)
    }
}

/// One presented trial: expectations, responses and scoring outcome.
///
/// Created when the stimulus is presented, mutated only while its response
/// window is open, immutable once scoring is finalized. The recorded
/// expectation flags stay as presented for export; the pending flags are the
/// consumable copies the response window burns down one correct key at a
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    /// 1-based trial number within the session.
    pub seq: u64,
    /// Wall-clock timestamp at stimulus presentation, microseconds.
    pub timestamp_us: i64,
    pub mode: Mode,
    pub n: u32,
    /// Expected-match flags as presented, indexed by [`Modality::index`].
    expected: [bool; Modality::COUNT],
    /// Consumable copies of the expectation flags.
    #[serde(skip)]
    pending: [bool; Modality::COUNT],
    /// Response keys in arrival order, at most one per modality.
    pub responses: Vec<Modality>,
    /// Reaction time of the first accepted key, milliseconds.
    pub reaction_time_ms: Option<f32>,
    pub outcome: Outcome,
    /// Points awarded for this trial (cumulative, except a miss overwrites).
    pub points: i32,
}

impl Trial {
    pub fn new(seq: u64, timestamp_us: i64, mode: Mode, n: u32) -> Self {
        Self {
            seq,
            timestamp_us,
            mode,
            n,
            expected: [false; Modality::COUNT],
            pending: [false; Modality::COUNT],
            responses: Vec::new(),
            reaction_time_ms: None,
            outcome: Outcome::NoResponse,
            points: 0,
        }
    }

    /// Record the expectation for a modality; sets both the exported flag and
    /// the consumable pending copy.
    pub fn set_expected(&mut self, modality: Modality, expected: bool) {
        self.expected[modality.index()] = expected;
        self.pending[modality.index()] = expected;
    }

    /// Expectation flag as presented (survives consumption; used for export).
    pub fn expected(&self, modality: Modality) -> bool {
        self.expected[modality.index()]
    }

    /// Consume the pending expectation for a modality, returning whether it
    /// was still set. A consumed flag cannot re-trigger.
    pub fn consume_pending(&mut self, modality: Modality) -> bool {
        std::mem::take(&mut self.pending[modality.index()])
    }

    /// First still-pending modality in priority order Location > Color > Audio.
    pub fn first_pending(&self) -> Option<Modality> {
        Modality::ALL.into_iter().find(|m| self.pending[m.index()])
    }

    pub fn has_response(&self, modality: Modality) -> bool {
        self.responses.contains(&modality)
    }

    pub fn push_response(&mut self, modality: Modality) {
        self.responses.push(modality);
    }

    /// Response keys rendered for export: "C;A;" style, "None" when empty.
    pub fn response_key_string(&self) -> String {
        if self.responses.is_empty() {
            return "None".to_string();
        }
        let mut s = String::new();
        for m in &self.responses {
            s.push_str(m.key_label());
            s.push(';');
        }
        s
    }
}
