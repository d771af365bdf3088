use crate::Status;

/// Result of feeding a probe outcome into the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub old: Status,
    pub new: Status,
    pub changed: bool,
}

/// The probe's status replaces the previous one outright.
pub fn evaluate(current: Status, probed: Status) -> Transition {
    Transition { old: current, new: probed, changed: current != probed }
}
