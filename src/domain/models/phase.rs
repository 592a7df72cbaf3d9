/// Where a session sits in the turn loop.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum Phase {
    #[default]
    #[strum(serialize = "idle")]
    Idle,
    #[strum(serialize = "awaiting a turn")]
    AwaitingTurn,
    #[strum(serialize = "presenting options")]
    PresentingOptions,
    #[strum(serialize = "awaiting a choice")]
    AwaitingChoice,
    #[strum(serialize = "game over")]
    GameOver,
    /// The backend produced a turn without any options. Only a reset leaves it.
    #[strum(serialize = "stuck")]
    Stuck,
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        return *self == Phase::AwaitingTurn || *self == Phase::AwaitingChoice;
    }
}
