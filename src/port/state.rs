//! Port states and the transition function between them,
//! *IEEE 802.1AS-2021 section 10.3.12*

/// The protocol state of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    Initializing,
    Faulty,
    Disabled,
    Listening,
    PreMaster,
    Master,
    Passive,
    Uncalibrated,
    Slave,
}

/// An input driving the port state machine.
///
/// Timeout events are delivered by the host; the state machine itself keeps
/// no timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortEvent {
    EnablePort,
    DisablePort,
    FaultDetected,
    FaultCleared,
    AnnounceReceiptTimeout,
    SuperiorAnnounce,
    QualificationTimeout,
    CalibrationComplete,
}

/// A state/event combination the state machine does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(
    feature = "std",
    error("event {event:?} is not valid in state {state:?}")
)]
pub struct InvalidTransition {
    pub state: PortState,
    pub event: PortEvent,
}

#[cfg(not(feature = "std"))]
impl core::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "event {:?} is not valid in state {:?}",
            self.event, self.state
        )
    }
}

/// The transition function of the port state machine.
///
/// Pure: the outcome depends only on the arguments. Combinations without a
/// row are rejected so a caller can never coerce a port along a path the
/// protocol forbids, like Disabled directly to Master.
pub fn transition(state: PortState, event: PortEvent) -> Result<PortState, InvalidTransition> {
    use PortEvent::*;
    use PortState::*;

    match (state, event) {
        // administrative control, disable wins from every state
        (_, DisablePort) => Ok(Disabled),
        (Disabled | Initializing, EnablePort) => Ok(Listening),

        // fault handling
        (Disabled, FaultDetected) => Err(InvalidTransition { state, event }),
        (_, FaultDetected) => Ok(Faulty),
        (Faulty, FaultCleared) => Ok(Initializing),

        // a better master was announced
        (Listening | Slave, SuperiorAnnounce) => Ok(Uncalibrated),
        (Uncalibrated | Passive, SuperiorAnnounce) => Ok(state),
        (Master | PreMaster, SuperiorAnnounce) => Ok(Passive),

        // the current master went quiet
        (Listening | Uncalibrated | Slave | Passive, AnnounceReceiptTimeout) => Ok(Master),

        (PreMaster, QualificationTimeout) => Ok(Master),
        (Uncalibrated, CalibrationComplete) => Ok(Slave),

        _ => Err(InvalidTransition { state, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_rows() {
        use PortEvent::*;
        use PortState::*;

        assert_eq!(transition(Initializing, EnablePort), Ok(Listening));
        assert_eq!(transition(Listening, SuperiorAnnounce), Ok(Uncalibrated));
        assert_eq!(transition(Uncalibrated, CalibrationComplete), Ok(Slave));
        assert_eq!(transition(Slave, SuperiorAnnounce), Ok(Uncalibrated));
        assert_eq!(transition(Listening, AnnounceReceiptTimeout), Ok(Master));
        assert_eq!(transition(Slave, AnnounceReceiptTimeout), Ok(Master));
        assert_eq!(transition(Master, SuperiorAnnounce), Ok(Passive));
        assert_eq!(transition(PreMaster, QualificationTimeout), Ok(Master));
    }

    #[test]
    fn disable_always_lands_in_disabled() {
        use PortState::*;

        for state in [
            Initializing,
            Faulty,
            Disabled,
            Listening,
            PreMaster,
            Master,
            Passive,
            Uncalibrated,
            Slave,
        ] {
            assert_eq!(transition(state, PortEvent::DisablePort), Ok(Disabled));
        }
    }

    #[test]
    fn fault_recovery() {
        use PortEvent::*;
        use PortState::*;

        assert_eq!(transition(Slave, FaultDetected), Ok(Faulty));
        assert_eq!(transition(Faulty, FaultCleared), Ok(Initializing));
        assert_eq!(
            transition(Disabled, FaultDetected),
            Err(InvalidTransition {
                state: Disabled,
                event: FaultDetected,
            })
        );
    }

    #[test]
    fn invalid_rows_are_rejected() {
        use PortEvent::*;
        use PortState::*;

        // no direct promotion of a disabled port
        assert!(transition(Disabled, AnnounceReceiptTimeout).is_err());
        assert!(transition(Disabled, QualificationTimeout).is_err());
        // calibration only ends in the uncalibrated state
        assert!(transition(Listening, CalibrationComplete).is_err());
        // the rejected combination is reported back
        let error = transition(Master, CalibrationComplete).unwrap_err();
        assert_eq!(error.state, Master);
        assert_eq!(error.event, CalibrationComplete);
    }
}
