use crate::error::ConfigError;
use crate::timing::{BitTiming, Oscillator};

#[test]
fn test_default_bit_timing_registers() {
    assert_eq!(Ok((0x40, 0x8A, 0x02)), BitTiming::default().compute());
    assert_eq!(BitTiming::simplified(500), BitTiming::default());
}

#[test]
fn test_bit_timing_flags() {
    let timing = BitTiming {
        triple_sample: true,
        wake_filter: true,
        start_of_frame: true,
        btl_mode: false,
        prescaler: 3,
        sjw: 1,
        ..BitTiming::simplified(125)
    };
    assert_eq!(Ok((0x03, 0x4A, 0xC2)), timing.compute());
}

#[test]
fn test_prop_seg_eight_wraps() {
    let timing = BitTiming {
        prop_seg: 8,
        ..BitTiming::default()
    };
    let (_, cnf2, _) = timing.registers().unwrap();
    assert_eq!(0, cnf2.prseg());
    assert_eq!(1, cnf2.phseg1());
}

#[test]
fn test_bit_timing_range_errors() {
    let base = BitTiming::default();

    assert_eq!(
        Err(ConfigError::InvalidBaudRate(0)),
        BitTiming { baud_kbps: 0, ..base }.validate()
    );
    assert_eq!(
        Err(ConfigError::InvalidBaudRate(1001)),
        BitTiming { baud_kbps: 1001, ..base }.validate()
    );
    assert_eq!(
        Err(ConfigError::InvalidSyncJumpWidth(0)),
        BitTiming { sjw: 0, ..base }.validate()
    );
    assert_eq!(
        Err(ConfigError::InvalidSyncJumpWidth(5)),
        BitTiming { sjw: 5, ..base }.validate()
    );
    assert_eq!(
        Err(ConfigError::InvalidPrescaler(64)),
        BitTiming { prescaler: 64, ..base }.validate()
    );
    assert_eq!(
        Err(ConfigError::InvalidSegment(0)),
        BitTiming { phase_seg1: 0, ..base }.validate()
    );
    assert_eq!(
        Err(ConfigError::InvalidSegment(9)),
        BitTiming { phase_seg2: 9, ..base }.validate()
    );
}

#[test]
fn test_bit_timing_segment_relations() {
    let base = BitTiming::default();

    assert_eq!(
        Err(ConfigError::PhaseSeg2NotAboveSjw { phase_seg2: 3, sjw: 3 }),
        BitTiming { sjw: 3, ..base }.validate()
    );
    assert_eq!(
        Err(ConfigError::PhaseSeg2NotAboveSjw { phase_seg2: 2, sjw: 3 }),
        BitTiming {
            sjw: 3,
            phase_seg2: 2,
            ..base
        }
        .compute()
    );
    assert_eq!(
        Err(ConfigError::PhaseSeg2TooLong {
            prop_seg: 1,
            phase_seg1: 1,
            phase_seg2: 3
        }),
        BitTiming {
            prop_seg: 1,
            phase_seg1: 1,
            ..base
        }
        .validate()
    );
    assert_eq!(
        Err(ConfigError::PhaseSeg2TooLong {
            prop_seg: 1,
            phase_seg1: 1,
            phase_seg2: 3
        }),
        BitTiming {
            prop_seg: 1,
            phase_seg1: 1,
            ..base
        }
        .compute()
    );
}

#[test]
fn test_oscillator_range() {
    assert_eq!(Err(ConfigError::InvalidOscillator(0)), Oscillator::from_mhz(0));
    assert_eq!(Err(ConfigError::InvalidOscillator(41)), Oscillator::from_mhz(41));
    assert_eq!(Ok(Oscillator::MHZ16), Oscillator::from_mhz(16));
    assert_eq!(40, Oscillator::from_mhz(40).unwrap().mhz());
}

#[test]
fn test_settle_time_rounds_up() {
    assert_eq!(16, Oscillator::MHZ8.settle_time_us());
    assert_eq!(8, Oscillator::MHZ16.settle_time_us());
    assert_eq!(43, Oscillator::from_mhz(3).unwrap().settle_time_us());
    assert_eq!(4, Oscillator::from_mhz(40).unwrap().settle_time_us());
    assert_eq!(128, Oscillator::from_mhz(1).unwrap().settle_time_us());
}
