//! Equal-power pan law and hard output routing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output routing for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelSelect {
    /// Left output only, full track volume, pan ignored.
    #[serde(rename = "left")]
    LeftOnly,
    /// Right output only, full track volume, pan ignored.
    #[serde(rename = "right")]
    RightOnly,
    /// Both outputs, weighted by the pan law.
    #[default]
    #[serde(rename = "both")]
    Both,
}

impl ChannelSelect {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::LeftOnly => 0,
            Self::RightOnly => 1,
            Self::Both => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::LeftOnly,
            1 => Self::RightOnly,
            _ => Self::Both,
        }
    }
}

/// Integer output-channel selector used by host layers: `0` left, `1` right,
/// anything else both.
impl From<i32> for ChannelSelect {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::LeftOnly,
            1 => Self::RightOnly,
            _ => Self::Both,
        }
    }
}

impl FromStr for ChannelSelect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Self::LeftOnly),
            "right" | "r" => Ok(Self::RightOnly),
            "both" | "b" | "stereo" => Ok(Self::Both),
            other => Err(format!("unknown routing '{}': expected left, right or both", other)),
        }
    }
}

impl fmt::Display for ChannelSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::LeftOnly => "left",
            Self::RightOnly => "right",
            Self::Both => "both",
        };
        f.write_str(label)
    }
}

/// Linear gain multipliers for the left and right outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanGains {
    pub left: f32,
    pub right: f32,
}

/// Quarter-sine equal-power pan: `-1.0` hard left, `0.0` centre, `1.0` hard right.
///
/// `left² + right²` stays at `1.0` across the range, so perceived loudness
/// does not dip at centre.
pub fn pan_gains(pan: f32) -> PanGains {
    let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
    let t = (f64::from(pan) + 1.0) / 2.0;
    let angle = t * std::f64::consts::FRAC_PI_2;
    PanGains {
        left: angle.cos() as f32,
        right: angle.sin() as f32,
    }
}

/// Gains for a track given its routing; hard routes bypass the pan law.
pub fn route_gains(select: ChannelSelect, pan: f32) -> PanGains {
    match select {
        ChannelSelect::LeftOnly => PanGains {
            left: 1.0,
            right: 0.0,
        },
        ChannelSelect::RightOnly => PanGains {
            left: 0.0,
            right: 1.0,
        },
        ChannelSelect::Both => pan_gains(pan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_are_hard_left_and_right() {
        let left = pan_gains(-1.0);
        assert_eq!(left.left, 1.0);
        assert!(left.right.abs() < 1e-7);

        let right = pan_gains(1.0);
        assert!(right.left.abs() < 1e-7);
        assert_eq!(right.right, 1.0);
    }

    #[test]
    fn centre_is_equal_power() {
        let gains = pan_gains(0.0);
        assert!((gains.left - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((gains.right - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn power_is_constant_across_range() {
        for step in 0..=200 {
            let pan = -1.0 + step as f32 / 100.0;
            let gains = pan_gains(pan);
            let power = gains.left * gains.left + gains.right * gains.right;
            assert!((power - 1.0).abs() < 1e-6, "pan {pan}: power {power}");
        }
    }

    #[test]
    fn out_of_range_pan_is_clamped() {
        assert_eq!(pan_gains(-5.0), pan_gains(-1.0));
        assert_eq!(pan_gains(3.0), pan_gains(1.0));
        assert_eq!(pan_gains(f32::NAN), pan_gains(0.0));
    }

    #[test]
    fn hard_routes_ignore_pan() {
        let left = route_gains(ChannelSelect::LeftOnly, 1.0);
        assert_eq!(left, PanGains { left: 1.0, right: 0.0 });
        let right = route_gains(ChannelSelect::RightOnly, -1.0);
        assert_eq!(right, PanGains { left: 0.0, right: 1.0 });
        assert_eq!(route_gains(ChannelSelect::Both, 0.25), pan_gains(0.25));
    }

    #[test]
    fn selector_conversions() {
        assert_eq!(ChannelSelect::from(0), ChannelSelect::LeftOnly);
        assert_eq!(ChannelSelect::from(1), ChannelSelect::RightOnly);
        assert_eq!(ChannelSelect::from(2), ChannelSelect::Both);
        assert_eq!(ChannelSelect::from(-3), ChannelSelect::Both);
        assert_eq!("Right".parse::<ChannelSelect>(), Ok(ChannelSelect::RightOnly));
        assert!("centre".parse::<ChannelSelect>().is_err());
        for select in [
            ChannelSelect::LeftOnly,
            ChannelSelect::RightOnly,
            ChannelSelect::Both,
        ] {
            assert_eq!(ChannelSelect::from_u8(select.to_u8()), select);
        }
    }
}
