use crate::time::Duration;

/// Dynamic synchronization state of the local clock,
/// *IEEE1588-2019 section 8.2.2*
#[derive(Default, Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct CurrentDS {
    pub(crate) steps_removed: u16,
    pub(crate) offset_from_master: Duration,
}
