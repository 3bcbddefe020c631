//! The slice of the FIT global profile this encoder emits: message
//! numbers, field numbers, base types and the enum codes it uses.

/// Seconds between the unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET_SECS: i64 = 631_065_600;

pub const PROTOCOL_VERSION: u8 = 0x10;
pub const PROFILE_VERSION: u16 = 2132;

// Global message numbers.
pub const MSG_FILE_ID: u16 = 0;
pub const MSG_SESSION: u16 = 18;
pub const MSG_LAP: u16 = 19;
pub const MSG_RECORD: u16 = 20;
pub const MSG_DEVICE_INFO: u16 = 23;
pub const MSG_ACTIVITY: u16 = 34;
pub const MSG_FILE_CREATOR: u16 = 49;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseType {
    Enum,
    Uint8,
    Uint16,
    Uint32,
}

impl BaseType {
    pub fn code(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::Uint8 => 0x02,
            BaseType::Uint16 => 0x84,
            BaseType::Uint32 => 0x86,
        }
    }

    pub fn size(self) -> u8 {
        match self {
            BaseType::Enum | BaseType::Uint8 => 1,
            BaseType::Uint16 => 2,
            BaseType::Uint32 => 4,
        }
    }

    /// The profile's "invalid" placeholder for an absent value.
    pub fn invalid(self) -> u32 {
        match self {
            BaseType::Enum | BaseType::Uint8 => 0xFF,
            BaseType::Uint16 => 0xFFFF,
            BaseType::Uint32 => 0xFFFF_FFFF,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sport {
    Running,
    Cycling,
    FitnessEquipment,
    Swimming,
    Soccer,
    Walking,
    Hiking,
}

impl Sport {
    pub fn code(self) -> u32 {
        match self {
            Sport::Running => 1,
            Sport::Cycling => 2,
            Sport::FitnessEquipment => 4,
            Sport::Swimming => 5,
            Sport::Soccer => 7,
            Sport::Walking => 11,
            Sport::Hiking => 17,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubSport {
    Elliptical,
    StrengthTraining,
}

impl SubSport {
    pub fn code(self) -> u32 {
        match self {
            SubSport::Elliptical => 15,
            SubSport::StrengthTraining => 20,
        }
    }
}

pub const FILE_TYPE_ACTIVITY: u32 = 4;
pub const MANUFACTURER_GARMIN: u32 = 1;
// GarminProduct "connect"
pub const PRODUCT_CONNECT: u32 = 65534;
pub const DEVICE_INDEX_CREATOR: u32 = 0;
pub const CREATOR_DEVICE_TYPE: u32 = 21;
pub const FILE_CREATOR_SOFTWARE_VERSION: u32 = 320;

/// Unix milliseconds → FIT date_time (seconds since the FIT epoch).
pub fn fit_timestamp(unix_ms: i64) -> u32 {
    (unix_ms / 1000 - FIT_EPOCH_OFFSET_SECS) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_epoch_is_zero_at_1989_12_31() {
        // 1989-12-31T00:00:00Z in unix milliseconds
        assert_eq!(fit_timestamp(631_065_600_000), 0);
        // one minute later
        assert_eq!(fit_timestamp(631_065_660_000), 60);
    }

    #[test]
    fn base_type_sizes_match_codes() {
        assert_eq!(BaseType::Uint16.size(), 2);
        assert_eq!(BaseType::Uint32.size(), 4);
        assert_eq!(BaseType::Uint16.invalid(), 0xFFFF);
    }
}
