/// Outcome of a conditional "increment if under limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageIncrement {
    pub applied: bool,
    /// Counter value after the statement ran (unchanged when not applied).
    pub generations: i64,
}
