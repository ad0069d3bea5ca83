#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{dsp::automation::ParamCurve, MIN_TIME};

/*
Contour Generators
==================

The engine has two envelopes: the loudness contour (drives the amplitude
stage) and the filter contour (drives the cutoff). Both are the same shape,
and neither renders samples itself. An envelope here is a *scheduler*: on a
gate edge it writes ramps into a `ParamCurve` and remembers when the stages
end. The render loop then reads the curve.

Vocabulary
----------

  knob        Panel value 0-10. Times are exponential in the knob so each
              step feels like the same musical change.

  floor       The value the contour starts from and returns to (0 for
              loudness, the key-tracked base cutoff for the filter).

  peak        The value reached at the end of the attack (1 for loudness,
              base · 2^octaves for the filter).

  sustain     Fraction of the way from floor to peak held after decay.

  decay switch
              When on, release reuses the decay time instead of the
              release time.


The Shape
---------

  value
    peak ┐     ╱╲
         │    ╱  ╲___________
    S    │   ╱               ╲
         │  ╱                 ╲
   floor └─╱───────────────────╲──→ time
           A    D    sustain    R

Every gate edge starts from the curve's CURRENT value (cancel and hold). A
retrigger half way through a release therefore ramps up from wherever the
level is, never from the floor. That is what keeps fast playing click-free.


Time Mapping
------------

    time = 5 ms · (10 s / 5 ms)^(knob / 10)

    knob   0     2.5     5      7.5     10
    time   5 ms  33 ms   224 ms 1.5 s   10 s

High-resolution knobs (0-10000) use two lookup tables. The first maps a
position to a display value in milliseconds and has an exact inverse; the
second folds a position back onto the 0-10 knob before the exponential
mapping above.
*/

pub const MIN_ENVELOPE_TIME: f32 = 0.005;
pub const MAX_ENVELOPE_TIME: f32 = 10.0;

/// Knob position (0-10000) to display milliseconds.
const DISPLAY_STOPS: [(f32, f32); 7] = [
    (0.0, 0.0),
    (1_000.0, 10.0),
    (2_000.0, 200.0),
    (4_000.0, 600.0),
    (6_000.0, 1_000.0),
    (8_000.0, 5_000.0),
    (10_000.0, 10_000.0),
];

/// Knob position (0-10000) to the 0-10 knob.
const KNOB_STOPS: [(f32, f32); 7] = [
    (0.0, 0.0),
    (10.0, 3.0),
    (200.0, 5.0),
    (600.0, 7.0),
    (1_000.0, 8.5),
    (5_000.0, 9.5),
    (10_000.0, 10.0),
];

/// Exponential knob (0-10) to seconds.
pub fn knob_to_seconds(knob: f32) -> f32 {
    let knob = if knob.is_finite() { knob.clamp(0.0, 10.0) } else { 0.0 };
    MIN_ENVELOPE_TIME * (MAX_ENVELOPE_TIME / MIN_ENVELOPE_TIME).powf(knob / 10.0)
}

/// High-resolution position (0-10000) to display milliseconds.
pub fn knob_pos_to_value(pos: f32) -> f32 {
    interpolate(&DISPLAY_STOPS, pos, false)
}

/// Display milliseconds back to a high-resolution position.
pub fn value_to_knob_pos(value: f32) -> f32 {
    interpolate(&DISPLAY_STOPS, value, true)
}

/// High-resolution position (0-10000) to the 0-10 knob.
pub fn high_res_to_knob(pos: f32) -> f32 {
    interpolate(&KNOB_STOPS, pos, false)
}

/// Glide knob (0-10) to seconds: 20 ms at 0, 2 s at 10.
pub fn glide_seconds(knob: f32) -> f32 {
    let knob = if knob.is_finite() { knob.clamp(0.0, 10.0) } else { 0.0 };
    10f32.powf(knob / 5.0) * 0.02
}

fn interpolate(stops: &[(f32, f32)], x: f32, inverse: bool) -> f32 {
    let pick = |stop: &(f32, f32)| if inverse { (stop.1, stop.0) } else { *stop };
    let (first_in, first_out) = pick(&stops[0]);
    if !x.is_finite() || x <= first_in {
        return first_out;
    }

    for pair in stops.windows(2) {
        let (a_in, a_out) = pick(&pair[0]);
        let (b_in, b_out) = pick(&pair[1]);
        if x <= b_in {
            let t = (x - a_in) / (b_in - a_in);
            return a_out + t * (b_out - a_out);
        }
    }

    pick(&stops[stops.len() - 1]).1
}

/// Attack/decay/sustain/release knob values (0-10 each).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeParams {
    pub fn attack_time(&self) -> f32 {
        knob_to_seconds(self.attack)
    }

    pub fn decay_time(&self) -> f32 {
        knob_to_seconds(self.decay)
    }

    pub fn release_time(&self) -> f32 {
        knob_to_seconds(self.release)
    }

    pub fn sustain_level(&self) -> f32 {
        if self.sustain.is_finite() {
            (self.sustain / 10.0).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack: 1.0,
            decay: 5.0,
            sustain: 7.0,
            release: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Writes contour ramps into a curve on gate edges.
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    params: EnvelopeParams,
    decay_switch: bool,
    triggered_at: Option<f64>,
    released_at: Option<f64>,
    release_end: f64,
}

impl EnvelopeGenerator {
    pub fn new(params: EnvelopeParams, decay_switch: bool) -> Self {
        Self {
            params,
            decay_switch,
            triggered_at: None,
            released_at: None,
            release_end: 0.0,
        }
    }

    pub fn set_params(&mut self, params: EnvelopeParams, decay_switch: bool) {
        self.params = params;
        self.decay_switch = decay_switch;
    }

    pub fn params(&self) -> EnvelopeParams {
        self.params
    }

    /// Ramp from the live value to `peak`, then to the sustain point.
    ///
    /// Returns the time the sustain level is reached.
    pub fn trigger(&mut self, curve: &mut ParamCurve, now: f64, floor: f32, peak: f32) -> f64 {
        let attack_end = now + self.params.attack_time().max(MIN_TIME) as f64;
        let decay_end = attack_end + self.params.decay_time().max(MIN_TIME) as f64;
        let sustain = floor + (peak - floor) * self.params.sustain_level();

        curve.cancel_and_hold(now);
        curve.linear_ramp_to(peak, attack_end);
        curve.linear_ramp_to(sustain, decay_end);

        self.triggered_at = Some(now);
        self.released_at = None;
        decay_end
    }

    /// Open the gate without scheduling anything. Used while the contour is
    /// switched off so a later `reshape` knows where the stages fall.
    pub fn gate(&mut self, now: f64) {
        self.triggered_at = Some(now);
        self.released_at = None;
    }

    /// Reschedule what is left of the running contour for a new floor and
    /// peak, starting from the curve's live value.
    ///
    /// Stage boundaries stay where the gate put them. A contour already
    /// holding at sustain (or idle) settles on its new level over `settle`.
    pub fn reshape(&mut self, curve: &mut ParamCurve, now: f64, floor: f32, peak: f32, settle: f64) {
        let sustain = floor + (peak - floor) * self.params.sustain_level();
        let attack = self.params.attack_time() as f64;
        let decay = self.params.decay_time() as f64;

        curve.cancel_and_hold(now);
        match (self.stage_at(now), self.triggered_at) {
            (EnvelopeStage::Attack, Some(start)) => {
                curve.linear_ramp_to(peak, start + attack);
                curve.linear_ramp_to(sustain, start + attack + decay);
            }
            (EnvelopeStage::Decay, Some(start)) => curve.linear_ramp_to(sustain, start + attack + decay),
            (EnvelopeStage::Release, _) => curve.linear_ramp_to(floor, self.release_end),
            (EnvelopeStage::Idle, _) => curve.linear_ramp_to(floor, now + settle),
            _ => curve.linear_ramp_to(sustain, now + settle),
        }
    }

    /// Ramp from the live value to `rest`.
    ///
    /// Returns the time the release completes.
    pub fn release(&mut self, curve: &mut ParamCurve, now: f64, rest: f32) -> f64 {
        let end = now + self.release_duration().max(MIN_TIME) as f64;

        curve.cancel_and_hold(now);
        curve.linear_ramp_to(rest, end);

        self.released_at = Some(now);
        self.release_end = end;
        end
    }

    /// Release length, honouring the decay switch.
    pub fn release_duration(&self) -> f32 {
        if self.decay_switch {
            self.params.decay_time()
        } else {
            self.params.release_time()
        }
    }

    pub fn stage_at(&self, t: f64) -> EnvelopeStage {
        if let Some(released) = self.released_at {
            if t >= released {
                return if t < self.release_end {
                    EnvelopeStage::Release
                } else {
                    EnvelopeStage::Idle
                };
            }
        }

        match self.triggered_at {
            None => EnvelopeStage::Idle,
            Some(start) => {
                let attack_end = start + self.params.attack_time() as f64;
                let decay_end = attack_end + self.params.decay_time() as f64;
                if t < attack_end {
                    EnvelopeStage::Attack
                } else if t < decay_end {
                    EnvelopeStage::Decay
                } else {
                    EnvelopeStage::Sustain
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knob_mapping_spans_five_ms_to_ten_seconds() {
        assert!((knob_to_seconds(0.0) - 0.005).abs() < 1e-6);
        assert!((knob_to_seconds(10.0) - 10.0).abs() < 1e-3);
        assert!((knob_to_seconds(5.0) - 0.2236).abs() < 1e-3);
        assert!((knob_to_seconds(-3.0) - 0.005).abs() < 1e-6);
        assert!((knob_to_seconds(f32::NAN) - 0.005).abs() < 1e-6);
    }

    #[test]
    fn display_stops_round_trip() {
        for &ms in &[0.0, 5.0, 10.0, 150.0, 600.0, 999.0, 4_000.0, 10_000.0] {
            let back = knob_pos_to_value(value_to_knob_pos(ms));
            assert!((back - ms).abs() < 1e-2, "{ms} ms came back as {back}");
        }
        assert!((knob_pos_to_value(1_000.0) - 10.0).abs() < 1e-4);
        assert!((value_to_knob_pos(1_000.0) - 6_000.0).abs() < 1e-2);
    }

    #[test]
    fn high_res_positions_fold_onto_knob() {
        assert_eq!(high_res_to_knob(0.0), 0.0);
        assert!((high_res_to_knob(200.0) - 5.0).abs() < 1e-5);
        assert!((high_res_to_knob(3_000.0) - 9.0).abs() < 1e-5);
        assert_eq!(high_res_to_knob(20_000.0), 10.0);
    }

    #[test]
    fn glide_mapping() {
        assert!((glide_seconds(0.0) - 0.02).abs() < 1e-6);
        assert!((glide_seconds(5.0) - 0.2).abs() < 1e-5);
        assert!((glide_seconds(10.0) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn trigger_schedules_attack_then_decay() {
        let params = EnvelopeParams {
            attack: 5.0,
            decay: 5.0,
            sustain: 5.0,
            release: 5.0,
        };
        let mut env = EnvelopeGenerator::new(params, false);
        let mut curve = ParamCurve::new(0.0);

        let sustain_at = env.trigger(&mut curve, 0.0, 0.0, 1.0);
        let attack = params.attack_time() as f64;

        assert!((curve.value_at(attack) - 1.0).abs() < 1e-4);
        assert!((curve.value_at(sustain_at + 1.0) - 0.5).abs() < 1e-4);
        assert_eq!(env.stage_at(attack * 0.5), EnvelopeStage::Attack);
        assert_eq!(env.stage_at(attack * 1.5), EnvelopeStage::Decay);
        assert_eq!(env.stage_at(sustain_at + 0.1), EnvelopeStage::Sustain);
    }

    #[test]
    fn retrigger_starts_from_current_value() {
        let mut env = EnvelopeGenerator::new(EnvelopeParams::default(), false);
        let mut curve = ParamCurve::new(0.0);

        env.trigger(&mut curve, 0.0, 0.0, 1.0);
        env.release(&mut curve, 2.0, 0.0);
        let mid_release = 2.0 + env.release_duration() as f64 * 0.5;
        let level = curve.value_at(mid_release);
        assert!(level > 0.0);

        env.trigger(&mut curve, mid_release, 0.0, 1.0);
        assert!((curve.value_at(mid_release) - level).abs() < 1e-6);
        assert!(curve.value_at(mid_release + 0.001) >= level);
    }

    #[test]
    fn decay_switch_releases_over_decay_time() {
        let params = EnvelopeParams {
            attack: 0.0,
            decay: 2.0,
            sustain: 10.0,
            release: 9.0,
        };
        let mut env = EnvelopeGenerator::new(params, true);
        let mut curve = ParamCurve::new(0.0);

        env.trigger(&mut curve, 0.0, 0.0, 1.0);
        let end = env.release(&mut curve, 1.0, 0.0);
        assert!((end - (1.0 + params.decay_time() as f64)).abs() < 1e-6);
        assert_eq!(curve.value_at(end), 0.0);
        assert_eq!(env.stage_at(end + 0.01), EnvelopeStage::Idle);
    }

    #[test]
    fn reshape_mid_attack_keeps_the_attack_end() {
        let params = EnvelopeParams {
            attack: 8.0,
            decay: 5.0,
            sustain: 5.0,
            release: 5.0,
        };
        let mut env = EnvelopeGenerator::new(params, false);
        let mut curve = ParamCurve::new(400.0);
        let sustain_at = env.trigger(&mut curve, 0.0, 400.0, 1_600.0);
        let attack = params.attack_time() as f64;

        let now = attack * 0.25;
        let live = curve.value_at(now);
        env.reshape(&mut curve, now, 500.0, 2_000.0, 0.02);

        assert!((curve.value_at(now) - live).abs() < 1e-3);
        assert!((curve.value_at(attack) - 2_000.0).abs() < 1e-2);
        assert!((curve.value_at(sustain_at) - 1_250.0).abs() < 1e-2);
    }

    #[test]
    fn reshape_at_sustain_settles_quickly() {
        let mut env = EnvelopeGenerator::new(EnvelopeParams::default(), false);
        let mut curve = ParamCurve::new(0.0);
        let sustain_at = env.trigger(&mut curve, 0.0, 0.0, 1.0);

        let now = sustain_at + 1.0;
        env.reshape(&mut curve, now, 0.0, 2.0, 0.02);
        let sustain = 2.0 * EnvelopeParams::default().sustain_level();
        assert!((curve.value_at(now + 0.02) - sustain).abs() < 1e-4);
    }

    #[test]
    fn filter_contour_sustains_between_floor_and_peak() {
        let params = EnvelopeParams {
            attack: 0.0,
            decay: 0.0,
            sustain: 2.5,
            release: 0.0,
        };
        let mut env = EnvelopeGenerator::new(params, false);
        let mut curve = ParamCurve::new(400.0);

        let sustain_at = env.trigger(&mut curve, 0.0, 400.0, 1_600.0);
        assert!((curve.value_at(sustain_at) - 700.0).abs() < 1e-2);
    }
}
