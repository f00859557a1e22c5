use std::fmt;

/// Progress of one device through the bring-up sequence.
///
/// The master uses `seed_requested` for its own seed request; the
/// calibration and start flags track its calibration window and ranging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinationState {
    pub identified: bool,
    pub connected: bool,
    pub role_assigned: bool,
    pub params_acked: bool,
    pub seed_requested: bool,
    /// Master: the seed arrived. Passive: the seed was forwarded to it.
    pub seed_received: bool,
    pub seed_set: bool,
    pub calibration_configured: bool,
    pub calibrated: bool,
    pub started: bool,
}

/// Where the sequence as a whole stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Configuring,
    Seeding,
    Calibrating,
    Measuring,
    Aborted(String),
}

impl Phase {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Phase::Aborted(_))
    }

    /// True once the sequence has begun and has not aborted.
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Aborted(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Scanning => f.write_str("scanning"),
            Phase::Connecting => f.write_str("connecting"),
            Phase::Configuring => f.write_str("configuring"),
            Phase::Seeding => f.write_str("seeding"),
            Phase::Calibrating => f.write_str("calibrating"),
            Phase::Measuring => f.write_str("measuring"),
            Phase::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}
