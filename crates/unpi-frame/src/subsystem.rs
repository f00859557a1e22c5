//! Built-in subsystem IDs.
//!
//! The subsystem lives in the low 5 bits of `cmd0`, so valid ids are
//! `0x00..=0x1F`.

/// Utility subsystem (hardware assert notifications).
pub const UTIL: u8 = 0x07;

/// Simple network processor subsystem.
pub const SNP: u8 = 0x15;

/// Connection monitor subsystem.
pub const CM: u8 = 0x17;

/// Real-time localization subsystem.
pub const RTLS: u8 = 0x19;

/// Largest id that fits in `cmd0`.
pub const MAX_SUBSYSTEM: u8 = 0x1F;

/// Returns a human-readable name for a subsystem ID.
pub fn subsystem_name(id: u8) -> &'static str {
    match id {
        UTIL => "UTIL",
        SNP => "SNP",
        CM => "CM",
        RTLS => "RTLS",
        _ => "UNKNOWN",
    }
}

/// Resolve a subsystem name back to its id.
pub fn subsystem_id(name: &str) -> Option<u8> {
    match name {
        "UTIL" => Some(UTIL),
        "SNP" => Some(SNP),
        "CM" => Some(CM),
        "RTLS" => Some(RTLS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for id in [UTIL, SNP, CM, RTLS] {
            assert_eq!(subsystem_id(subsystem_name(id)), Some(id));
        }
        assert_eq!(subsystem_name(0x01), "UNKNOWN");
        assert_eq!(subsystem_id("NOPE"), None);
    }
}
