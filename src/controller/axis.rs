//! Analog signal conditioning
//!
//! Two helpers shared by the mapping engine:
//!
//! - [`apply_radial_deadzone`] turns a raw two-axis stick sample into a
//!   deadzone-corrected direction vector
//! - [`digitize_trigger`] turns a raw single-axis trigger value into a debounced
//!   pressed/released state using two thresholds

/// Applies a radial deadzone to a stick sample.
///
/// The magnitude is clamped to 1.0 first so diagonal samples from square-gated
/// sticks cannot leave the unit circle. Inside the deadzone the result is `(0, 0)`;
/// outside it the magnitude is rescaled to `(m - deadzone) / (1 - deadzone)` while
/// the direction is kept, so the output is continuous at the boundary.
pub fn apply_radial_deadzone(x: f32, y: f32, deadzone: f32) -> (f32, f32) {
    let raw_magnitude = (x * x + y * y).sqrt();
    if !raw_magnitude.is_finite() || raw_magnitude <= deadzone || raw_magnitude == 0.0 {
        return (0.0, 0.0);
    }

    let magnitude = raw_magnitude.min(1.0);
    if magnitude <= deadzone {
        return (0.0, 0.0);
    }

    let scaled = (magnitude - deadzone) / (1.0 - deadzone);
    let factor = scaled / raw_magnitude;
    (x * factor, y * factor)
}

/// Hysteresis digitizer for analog triggers.
///
/// Returns `(new_pressed, transitioned)`. A released trigger becomes pressed once
/// `value > press_threshold`; a pressed trigger becomes released once
/// `value < release_threshold`. Values in between keep the previous state.
/// Callers must keep `release_threshold < press_threshold`.
pub fn digitize_trigger(
    value: f32,
    pressed: bool,
    press_threshold: f32,
    release_threshold: f32,
) -> (bool, bool) {
    if !pressed && value > press_threshold {
        (true, true)
    } else if pressed && value < release_threshold {
        (false, true)
    } else {
        (pressed, false)
    }
}

/// Per-trigger pressed state fed through [`digitize_trigger`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerState {
    pressed: bool,
}

impl TriggerState {
    /// Feeds a new sample. Returns `Some(pressed)` on a transition.
    pub fn update(&mut self, value: f32, press_threshold: f32, release_threshold: f32) -> Option<bool> {
        let (pressed, transitioned) =
            digitize_trigger(value, self.pressed, press_threshold, release_threshold);
        self.pressed = pressed;
        transitioned.then_some(pressed)
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn reset(&mut self) {
        self.pressed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f32 = 1e-4;

    fn magnitude(x: f32, y: f32) -> f32 {
        (x * x + y * y).sqrt()
    }

    #[test]
    fn center_stays_zero() {
        assert_eq!(apply_radial_deadzone(0.0, 0.0, 0.3), (0.0, 0.0));
        assert_eq!(apply_radial_deadzone(0.0, 0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn full_deflection_maps_to_unit_magnitude() {
        let (x, y) = apply_radial_deadzone(1.0, 0.0, 0.2);
        assert!((x - 1.0).abs() < EPSILON);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn corner_samples_are_clamped_to_unit_circle() {
        let (x, y) = apply_radial_deadzone(1.0, 1.0, 0.2);
        assert!((magnitude(x, y) - 1.0).abs() < EPSILON);
        assert!((x - y).abs() < EPSILON);
    }

    #[test]
    fn output_is_continuous_at_boundary() {
        let (x, y) = apply_radial_deadzone(0.3001, 0.0, 0.3);
        assert!(magnitude(x, y) < 0.001);
    }

    #[test]
    fn trigger_ignores_dead_band() {
        let mut state = TriggerState::default();
        assert_eq!(state.update(0.4, 0.5, 0.3), None);
        assert_eq!(state.update(0.6, 0.5, 0.3), Some(true));
        assert_eq!(state.update(0.4, 0.5, 0.3), None);
        assert!(state.is_pressed());
        assert_eq!(state.update(0.2, 0.5, 0.3), Some(false));
        assert_eq!(state.update(0.0, 0.5, 0.3), None);
    }

    #[test]
    fn trigger_threshold_values_are_exclusive() {
        assert_eq!(digitize_trigger(0.5, false, 0.5, 0.3), (false, false));
        assert_eq!(digitize_trigger(0.3, true, 0.5, 0.3), (true, false));
    }

    proptest! {
        #[test]
        fn samples_inside_deadzone_are_zero(
            angle in 0.0f32..std::f32::consts::TAU,
            deadzone in 0.05f32..0.9,
            fraction in 0.0f32..0.999,
        ) {
            let radius = deadzone * fraction;
            let (x, y) = apply_radial_deadzone(radius * angle.cos(), radius * angle.sin(), deadzone);
            prop_assert_eq!((x, y), (0.0, 0.0));
        }

        #[test]
        fn samples_outside_deadzone_are_rescaled(
            angle in 0.0f32..std::f32::consts::TAU,
            deadzone in 0.05f32..0.9,
            fraction in 0.01f32..=1.0,
        ) {
            let radius = deadzone + (1.0 - deadzone) * fraction;
            let (ix, iy) = (radius * angle.cos(), radius * angle.sin());
            let input_magnitude = magnitude(ix, iy);
            prop_assume!(input_magnitude > deadzone);

            let (ox, oy) = apply_radial_deadzone(ix, iy, deadzone);
            let expected = (input_magnitude.min(1.0) - deadzone) / (1.0 - deadzone);
            prop_assert!((magnitude(ox, oy) - expected).abs() < EPSILON);

            // same direction: cross product zero, dot product non-negative
            prop_assert!((ix * oy - iy * ox).abs() < EPSILON);
            prop_assert!(ix * ox + iy * oy >= 0.0);
        }

        #[test]
        fn hysteresis_alternates_press_and_release(
            samples in proptest::collection::vec(0.0f32..=1.0, 1..200),
        ) {
            let mut state = TriggerState::default();
            let mut last = false;
            for value in samples {
                if let Some(pressed) = state.update(value, 0.5, 0.3) {
                    prop_assert_ne!(pressed, last);
                    last = pressed;
                }
            }
        }
    }
}
