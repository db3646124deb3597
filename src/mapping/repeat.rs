//! Hold-to-repeat scheduling
//!
//! Registrations are keyed by (element, layer) so that releasing the modifier can
//! drop only the modifier-layer repeats. Time is always passed in, which keeps the
//! scheduler deterministic under test.

use crate::mapping::mapping_types::{InputElement, Layer, RepeatPolicy};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// Due-time clock for one held input.
///
/// The first fire is due `initial_delay` after the start, later ones every
/// `interval`. If the caller polls late, the clock resumes from the poll time
/// instead of firing the missed repeats in a burst.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatClock {
    policy: RepeatPolicy,
    next_due: Instant,
    fired_once: bool,
}

impl RepeatClock {
    pub fn start(policy: RepeatPolicy, now: Instant) -> Self {
        Self {
            policy,
            next_due: now + policy.initial_delay,
            fired_once: false,
        }
    }

    /// Returns true if a repeat is due at `now` and advances the clock
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.policy.interval;
        if self.next_due <= now {
            self.next_due = now + self.policy.interval;
        }
        self.fired_once = true;
        true
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn fired_once(&self) -> bool {
        self.fired_once
    }
}

#[derive(Clone, Debug, Default)]
pub struct RepeatScheduler {
    registrations: BTreeMap<(InputElement, Layer), RepeatClock>,
}

impl RepeatScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts repeating `element`; a second press restarts the delay
    pub fn register(
        &mut self,
        element: InputElement,
        layer: Layer,
        policy: RepeatPolicy,
        now: Instant,
    ) {
        debug!(
            "Repeat registered for {} ({} layer), first repeat in {:?}",
            element, layer, policy.initial_delay
        );
        self.registrations
            .insert((element, layer), RepeatClock::start(policy, now));
    }

    /// Drops the registration of `element` in any layer
    pub fn remove(&mut self, element: InputElement) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|(registered, _), _| *registered != element);
        before != self.registrations.len()
    }

    pub fn clear_layer(&mut self, layer: Layer) {
        self.registrations
            .retain(|(_, registered_layer), _| *registered_layer != layer);
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.registrations.is_empty()
    }

    pub fn count_in_layer(&self, layer: Layer) -> usize {
        self.registrations
            .keys()
            .filter(|(_, registered_layer)| *registered_layer == layer)
            .count()
    }

    /// Advances every registration and returns those that fire at `now`
    pub fn tick(&mut self, now: Instant) -> Vec<(InputElement, Layer)> {
        let mut due = Vec::new();
        for (&(element, layer), clock) in self.registrations.iter_mut() {
            let first = !clock.fired_once();
            if clock.poll(now) {
                if first {
                    debug!("First repeat for {} ({} layer)", element, layer);
                }
                due.push((element, layer));
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const POLICY: RepeatPolicy = RepeatPolicy::from_millis(400, 20);

    #[test]
    fn held_half_second_at_fifty_hz_repeats_six_times() {
        let start = Instant::now();
        let mut scheduler = RepeatScheduler::new();
        scheduler.register(InputElement::DpadUp, Layer::Base, POLICY, start);

        let fired: usize = (1..=25)
            .map(|tick| scheduler.tick(start + Duration::from_millis(20 * tick)).len())
            .sum();

        assert_eq!(fired, 6);
    }

    #[test]
    fn nothing_fires_before_initial_delay() {
        let start = Instant::now();
        let mut scheduler = RepeatScheduler::new();
        scheduler.register(InputElement::ButtonB, Layer::Modifier, POLICY, start);

        assert!(scheduler
            .tick(start + Duration::from_millis(399))
            .is_empty());
        assert_eq!(
            scheduler.tick(start + Duration::from_millis(400)),
            vec![(InputElement::ButtonB, Layer::Modifier)]
        );
    }

    #[test]
    fn late_tick_does_not_burst() {
        let start = Instant::now();
        let mut clock = RepeatClock::start(POLICY, start);

        // one second late: exactly one repeat, then back on the interval
        assert!(clock.poll(start + Duration::from_millis(1400)));
        assert!(!clock.poll(start + Duration::from_millis(1410)));
        assert_eq!(clock.next_due(), start + Duration::from_millis(1420));
        assert!(clock.poll(start + Duration::from_millis(1420)));
    }

    #[test]
    fn remove_and_clear_layer() {
        let start = Instant::now();
        let mut scheduler = RepeatScheduler::new();
        scheduler.register(InputElement::DpadUp, Layer::Base, POLICY, start);
        scheduler.register(InputElement::ButtonB, Layer::Modifier, POLICY, start);
        scheduler.register(InputElement::DpadDown, Layer::Modifier, POLICY, start);
        assert!(scheduler.is_active());

        scheduler.clear_layer(Layer::Modifier);
        assert_eq!(scheduler.count_in_layer(Layer::Modifier), 0);
        assert_eq!(scheduler.count_in_layer(Layer::Base), 1);

        assert!(scheduler.remove(InputElement::DpadUp));
        assert!(!scheduler.remove(InputElement::DpadUp));
        assert!(!scheduler.is_active());
    }
}
