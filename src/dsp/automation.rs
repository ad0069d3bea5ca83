/*
Scheduled Parameter Curves
==========================

Every time-varying control value in the engine (oscillator frequency, chain
gain, envelope level, filter cutoff, modulation depth) is a `ParamCurve`.
Control code never writes a value into the audio path directly. It schedules
where the value should be at some future instant, and the render loop asks
the curve what the value is right now.

Vocabulary
----------

  anchor      The (time, value) pair the curve starts from. Everything
              before the anchor time evaluates to the anchor value.

  ramp        A straight line from the previous point to (end, target).
              Ramps are chained: each one starts where the last one ended.

  hold        A ramp whose target equals the previous value. Used to delay
              a change without moving the value.

  cancel      Drop every ramp and re-anchor at the value the curve has at
              `now`. This is what makes retriggers click-free: a new ramp
              always starts from the live value, never from a stale target.


The Shape
---------

    value
      │            target₁
      │           ╱‾‾‾‾‾‾‾╲
      │          ╱         ╲ target₂
      │ anchor  ╱           ‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾
      │────────╱
      └───────┬─────────┬────────┬──────────→ time
            anchor     end₁     end₂

Storage is a fixed array so scheduling never allocates. Elapsed ramps are
folded into the anchor as the render loop advances.
*/

/// Maximum number of pending ramps on a single curve.
pub const MAX_RAMPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    end: f64,
    target: f32,
}

const EMPTY_RAMP: Ramp = Ramp {
    end: 0.0,
    target: 0.0,
};

#[derive(Debug, Clone)]
pub struct ParamCurve {
    anchor_time: f64,
    anchor_value: f32,
    ramps: [Ramp; MAX_RAMPS],
    len: usize,
}

impl ParamCurve {
    pub fn new(value: f32) -> Self {
        Self {
            anchor_time: 0.0,
            anchor_value: sanitize(value, 0.0),
            ramps: [EMPTY_RAMP; MAX_RAMPS],
            len: 0,
        }
    }

    /// Jump to `value` at `now`, discarding anything scheduled.
    pub fn set_value(&mut self, value: f32, now: f64) {
        self.anchor_value = sanitize(value, self.anchor_value);
        self.anchor_time = now;
        self.len = 0;
    }

    /// Re-anchor at the live value and drop pending ramps.
    pub fn cancel_and_hold(&mut self, now: f64) {
        let current = self.value_at(now);
        self.set_value(current, now);
    }

    /// Append a linear ramp from the last scheduled point to `target`.
    ///
    /// An `end_time` at or before the last point schedules a step.
    pub fn linear_ramp_to(&mut self, target: f32, end_time: f64) {
        if self.len == MAX_RAMPS {
            tracing::warn!(target, end_time, "parameter curve full, ramp dropped");
            return;
        }

        let end = end_time.max(self.end_time());
        self.ramps[self.len] = Ramp {
            end,
            target: sanitize(target, self.target()),
        };
        self.len += 1;
    }

    /// Keep the last scheduled value until `time`.
    pub fn hold_until(&mut self, time: f64) {
        let value = self.target();
        self.linear_ramp_to(value, time);
    }

    pub fn value_at(&self, t: f64) -> f32 {
        if t <= self.anchor_time {
            return self.anchor_value;
        }

        let mut start_time = self.anchor_time;
        let mut start_value = self.anchor_value;
        for ramp in &self.ramps[..self.len] {
            if t < ramp.end {
                let span = ramp.end - start_time;
                if span <= 0.0 {
                    return ramp.target;
                }
                let frac = ((t - start_time) / span) as f32;
                return start_value + (ramp.target - start_value) * frac;
            }
            start_time = ramp.end;
            start_value = ramp.target;
        }

        start_value
    }

    /// The value the curve settles at once every ramp has run.
    pub fn target(&self) -> f32 {
        if self.len == 0 {
            self.anchor_value
        } else {
            self.ramps[self.len - 1].target
        }
    }

    /// Time of the last scheduled point.
    pub fn end_time(&self) -> f64 {
        if self.len == 0 {
            self.anchor_time
        } else {
            self.ramps[self.len - 1].end
        }
    }

    /// Render one value per sample, starting at `start` and stepping by `dt`.
    pub fn fill(&mut self, start: f64, dt: f64, out: &mut [f32]) {
        self.compact(start);

        if self.len == 0 {
            out.fill(self.anchor_value);
            return;
        }

        for (i, sample) in out.iter_mut().enumerate() {
            *sample = self.value_at(start + dt * i as f64);
        }
    }

    // Fold ramps that finished before `t` into the anchor.
    fn compact(&mut self, t: f64) {
        let elapsed = self.ramps[..self.len]
            .iter()
            .take_while(|ramp| ramp.end <= t)
            .count();
        if elapsed == 0 {
            return;
        }

        let last = self.ramps[elapsed - 1];
        self.anchor_time = last.end;
        self.anchor_value = last.target;
        self.ramps.copy_within(elapsed..self.len, 0);
        self.len -= elapsed;
    }
}

impl Default for ParamCurve {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[inline]
fn sanitize(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
