//! Built-in export projection

/// Default projection used when the caller supplies none and does not ask
/// for the full dictionary.
///
/// The roster covers the channels downstream ML pipelines train on: lap
/// timing and track position, vehicle state, driver inputs, body-frame
/// velocities and angular rates, orientation, accelerations, per-tire
/// center temperatures, wear and pressures, fuel, and ambient conditions.
/// Names that do not resolve against a file's dictionary are dropped.
pub const DEFAULT_ROSTER: &[&str] = &[
    // Time and lap position
    "SessionTime",
    "Lap",
    "LapDist",
    "LapDistPct",
    "LapCurrentLapTime",
    "LapLastLapTime",
    // Vehicle state
    "Speed",
    "RPM",
    "Gear",
    // Driver inputs
    "Throttle",
    "Brake",
    "Clutch",
    "SteeringWheelAngle",
    // Body-frame velocities
    "VelocityX",
    "VelocityY",
    "VelocityZ",
    // Angular rates
    "YawRate",
    "PitchRate",
    "RollRate",
    // Orientation
    "Yaw",
    "Pitch",
    "Roll",
    // Accelerations
    "LatAccel",
    "LongAccel",
    "VertAccel",
    // Tire carcass temperatures (center band)
    "LFtempCM",
    "RFtempCM",
    "LRtempCM",
    "RRtempCM",
    // Tire wear (middle band)
    "LFwearM",
    "RFwearM",
    "LRwearM",
    "RRwearM",
    // Tire pressures
    "LFpressure",
    "RFpressure",
    "LRpressure",
    "RRpressure",
    // Fuel
    "FuelLevel",
    "FuelLevelPct",
    "FuelUsePerHour",
    // Ambient and track conditions
    "TrackTempCrew",
    "AirTemp",
    "WindVel",
    "WindDir",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn roster_names_are_unique() {
        let lowered: HashSet<String> =
            DEFAULT_ROSTER.iter().map(|n| n.to_ascii_lowercase()).collect();
        assert_eq!(lowered.len(), DEFAULT_ROSTER.len());
    }

    #[test]
    fn roster_covers_core_driving_channels() {
        for name in ["Speed", "Throttle", "Brake", "SteeringWheelAngle", "YawRate", "Lap"] {
            assert!(DEFAULT_ROSTER.contains(&name), "roster missing {name}");
        }
    }
}
