// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Compile-time CAN-FD bit-timing derivation (§6), so a miscalibrated bus
//! clock is a build error rather than a silently-wrong bitrate, per the
//! REDESIGN FLAGS note on literal numeric timing registers.

/// The four register-level quantities a bit-timing configuration reduces
/// to: time segment 1 (quanta), time segment 2 (quanta), synchronization
/// jump width (quanta) and the input clock prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTiming {
    pub prescaler: u16,
    pub seg1: u8,
    pub seg2: u8,
    pub sjw: u8,
}

/// Derives a `BitTiming` for `bitrate_hz` from `bus_clock_hz`, targeting
/// `sample_point_ratio_milli` (e.g. 875 for 87.5%) within the given
/// tolerance (in parts per thousand of both the quantum count and the
/// resulting bitrate). Returns `None` if no integral configuration meets
/// tolerance — callers use this in a `const` context so that failure is a
/// compile error.
pub const fn derive_bit_timing(
    bus_clock_hz: u32,
    bitrate_hz: u32,
    sample_point_ratio_milli: u32,
    tolerance_milli: u32,
) -> Option<BitTiming> {
    // Total time quanta per bit, searched from the widest (most accurate)
    // down to the narrowest so the first hit is the best fit.
    let mut quanta: u32 = 25;
    while quanta >= 8 {
        if bus_clock_hz % (bitrate_hz * quanta) == 0 {
            let prescaler = bus_clock_hz / (bitrate_hz * quanta);
            if prescaler >= 1 && prescaler <= 0x1FFF {
                // seg1 includes the 1-quantum sync segment; seg2 is the
                // remainder after the sample point.
                let seg1_plus_sync = (quanta * sample_point_ratio_milli + 500) / 1000;
                let seg1 = seg1_plus_sync.saturating_sub(1);
                let seg2 = quanta - 1 - seg1;
                if seg1 >= 1 && seg1 <= 255 && seg2 >= 1 && seg2 <= 127 {
                    let achieved_sample_milli = ((seg1 + 1) * 1000) / quanta;
                    let diff = if achieved_sample_milli > sample_point_ratio_milli {
                        achieved_sample_milli - sample_point_ratio_milli
                    } else {
                        sample_point_ratio_milli - achieved_sample_milli
                    };
                    if diff <= tolerance_milli {
                        let sjw = if seg2 < 4 { seg2 as u8 } else { 4 };
                        return Some(BitTiming {
                            prescaler: prescaler as u16,
                            seg1: seg1 as u8,
                            seg2: seg2 as u8,
                            sjw,
                        });
                    }
                }
            }
        }
        quanta -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_valid_timing_for_500kbit_on_80mhz() {
        let timing = derive_bit_timing(80_000_000, 500_000, 875, 120).expect("should derive");
        let quanta = (timing.seg1 as u32) + (timing.seg2 as u32) + 1;
        let actual_bitrate = 80_000_000 / (timing.prescaler as u32 * quanta);
        assert_eq!(actual_bitrate, 500_000);
        assert!(timing.sjw >= 1);
    }

    #[test]
    fn derives_valid_timing_for_250kbit_on_80mhz() {
        let timing = derive_bit_timing(80_000_000, 250_000, 875, 120).expect("should derive");
        let quanta = (timing.seg1 as u32) + (timing.seg2 as u32) + 1;
        assert_eq!(80_000_000 / (timing.prescaler as u32 * quanta), 250_000);
    }

    #[test]
    fn impossible_bitrate_on_an_incompatible_clock_fails_to_derive() {
        // A clock that shares no useful factor with the target bitrate at
        // any quantum count within tolerance.
        assert!(derive_bit_timing(80_000_003, 500_000, 875, 10).is_none());
    }
}
