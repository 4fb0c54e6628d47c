use internment::Intern;
use uuid::Uuid;

/// The origin a clock class's instances are counted from.
///
/// Distinguishes the three cases the muxer's compatibility table
/// (spec §4.4) cares about: the Unix epoch, a non-Unix origin identified
/// by a UUID shared across clock classes, or a non-Unix origin with no
/// UUID at all (in which case only the exact same clock class instance
/// is compatible with itself).
#[derive(Clone, Eq, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
pub enum ClockOrigin {
    UnixEpoch,
    Other { uuid: Option<Uuid> },
}

/// Describes a data stream's clock: its frequency, name, and origin.
/// Two `ClockClass` values are the "same clock class instance" for the
/// purposes of muxer compatibility when they're `Arc`-identical; see
/// [`crate::muxer::ClockExpectation`]. `serde`-derivable as a plausible
/// (de)serialization target for an external metadata resolver.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ClockClass {
    pub name: Intern<String>,
    pub frequency: u64,
    pub origin: ClockOrigin,
}

impl ClockClass {
    pub fn new(name: impl Into<String>, frequency: u64, origin: ClockOrigin) -> Self {
        Self {
            name: Intern::new(name.into()),
            frequency,
            origin,
        }
    }

    /// Converts a clock cycle count to nanoseconds since the clock's origin.
    pub fn cycles_to_ns(&self, cycles: u64) -> u128 {
        (cycles as u128 * 1_000_000_000) / self.frequency as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_class_round_trips_through_json() {
        let cc = ClockClass::new("monotonic", 1_000_000_000, ClockOrigin::Other { uuid: None });
        let json = serde_json::to_string(&cc).unwrap();
        let back: ClockClass = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, cc.name);
        assert_eq!(back.frequency, cc.frequency);
        assert_eq!(back.origin, cc.origin);
    }
}
