//! Decoder configuration.

/// Descriptor tag of the DVB teletext descriptor.
pub const TELETEXT_DESCRIPTOR_TAG: u8 = 0x56;

/// What to do when a PAT holds more programs than the output slice can take.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CapacityPolicy {
    /// Fill the output to capacity and report how many associations were dropped.
    Truncate,
    /// Fail with [`ErrorDetails::CapacityExceeded`](crate::ErrorDetails::CapacityExceeded).
    Fail,
}

/// Which PID to keep when a PMT lists several video (or audio) streams.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamSelection {
    /// Every matching entry overwrites the previous one.
    LastMatch,
    /// The first matching entry in section order is kept.
    FirstMatch,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Descriptor tag whose presence sets `teletext_present`.
    pub teletext_tag: u8,
    pub capacity_policy: CapacityPolicy,
    pub stream_selection: StreamSelection,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            teletext_tag: TELETEXT_DESCRIPTOR_TAG,
            capacity_policy: CapacityPolicy::Truncate,
            stream_selection: StreamSelection::LastMatch,
        }
    }
}

impl DecoderConfig {
    pub fn with_teletext_tag(mut self, tag: u8) -> Self {
        self.teletext_tag = tag;
        self
    }

    pub fn with_capacity_policy(mut self, policy: CapacityPolicy) -> Self {
        self.capacity_policy = policy;
        self
    }

    pub fn with_stream_selection(mut self, selection: StreamSelection) -> Self {
        self.stream_selection = selection;
        self
    }
}
