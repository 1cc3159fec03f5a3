//! Tests for target sequencing and cue assignment

use proptest::prelude::*;

use gazecal::error::ConfigError;
use gazecal::session::sequencer::{shuffled_cues, to_pixels};
use gazecal::session::{Cue, TargetSequence, CALIBRATION_CUE_SEED, VALIDATION_CUE_SEED};

use crate::test_utils::constants::{GRID_3X3, SCREEN};

#[test]
fn test_centre_maps_to_screen_centre() {
    assert_eq!(to_pixels((0.5, 0.5), (1920, 1080)), (960, 540));
}

#[test]
fn test_pixels_are_rounded() {
    // 0.1 * 1080 = 108.00000000000001, 0.333 * 1920 = 639.36
    assert_eq!(to_pixels((0.1, 0.1), (1920, 1080)), (192, 108));
    assert_eq!(to_pixels((0.333, 0.0), (1920, 1080)), (639, 0));
    assert_eq!(to_pixels((0.3335, 1.0), (1920, 1080)), (640, 1080));
}

#[test]
fn test_nine_point_grid_positions() {
    let sequence = TargetSequence::calibration(&GRID_3X3, SCREEN).expect("valid grid");
    assert_eq!(sequence.len(), 9);
    let positions: Vec<(i32, i32)> = sequence.iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(positions[0], (192, 108));
    assert_eq!(positions[4], (960, 540));
    assert_eq!(positions[8], (1728, 972));
}

#[test]
fn test_cues_are_deterministic() {
    let first = TargetSequence::calibration(&GRID_3X3, SCREEN).expect("valid grid");
    let second = TargetSequence::calibration(&GRID_3X3, SCREEN).expect("valid grid");
    assert_eq!(first, second);
    assert_eq!(first.cues(), shuffled_cues(9, CALIBRATION_CUE_SEED));
}

#[test]
fn test_validation_uses_its_own_seed() {
    let validation = TargetSequence::validation(&GRID_3X3, SCREEN).expect("valid grid");
    assert_eq!(validation.cues(), shuffled_cues(9, VALIDATION_CUE_SEED));
}

#[test]
fn test_seeds_produce_different_orders() {
    // At least one of these counts must differ between the two seeds.
    let differs = (6..=16).any(|n| {
        shuffled_cues(n, CALIBRATION_CUE_SEED) != shuffled_cues(n, VALIDATION_CUE_SEED)
    });
    assert!(differs);
}

#[test]
fn test_empty_and_single_point() {
    let empty = TargetSequence::calibration(&[], SCREEN).expect("empty is valid");
    assert!(empty.is_empty());
    assert!(empty.cycled(3).is_none());

    let single = TargetSequence::calibration(&[(0.5, 0.5)], SCREEN).expect("valid point");
    assert_eq!(single.cues(), vec![Cue::Right]);
}

#[test]
fn test_cycled_wraps_around() {
    let sequence = TargetSequence::calibration(&GRID_3X3, SCREEN).expect("valid grid");
    assert_eq!(sequence.cycled(9), sequence.get(0));
    assert_eq!(sequence.cycled(13), sequence.get(4));
}

#[test]
fn test_out_of_range_coordinate_rejected() {
    let result = TargetSequence::calibration(&[(0.5, 0.5), (1.2, 0.5)], SCREEN);
    match result {
        Err(ConfigError::CoordinateOutOfRange { index, x, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(x, 1.2);
        }
        other => panic!("expected a coordinate error, got {:?}", other),
    }

    assert!(TargetSequence::calibration(&[(f64::NAN, 0.5)], SCREEN).is_err());
}

#[test]
fn test_zero_screen_rejected() {
    let result = TargetSequence::calibration(&GRID_3X3, (0, 1080));
    assert!(matches!(result, Err(ConfigError::InvalidScreen(_))));
}

#[test]
fn test_cue_parsing() {
    assert_eq!("left".parse::<Cue>().ok(), Some(Cue::Left));
    assert_eq!("right".parse::<Cue>().ok(), Some(Cue::Right));
    crate::assert_error_contains!("up".parse::<Cue>(), "up");
    assert_eq!(Cue::Left.to_string(), "left");
}

proptest! {
    #[test]
    fn prop_cue_counts_split_in_half(count in 0usize..64, seed in any::<u64>()) {
        let cues = shuffled_cues(count, seed);
        let lefts = cues.iter().filter(|c| **c == Cue::Left).count();
        prop_assert_eq!(cues.len(), count);
        prop_assert_eq!(lefts, count / 2);
        prop_assert_eq!(cues.len() - lefts, count - count / 2);
    }

    #[test]
    fn prop_pixels_stay_on_screen(
        x in 0.0f64..=1.0,
        y in 0.0f64..=1.0,
        width in 1u32..8000,
        height in 1u32..8000,
    ) {
        let (px, py) = to_pixels((x, y), (width, height));
        prop_assert!(px >= 0 && px <= width as i32);
        prop_assert!(py >= 0 && py <= height as i32);
    }
}
