//! Monophonic voice lifecycle on the render thread.
//!
//! `MonoSynth` owns the graph, both contour generators and at most two voice
//! records: the current voice and a predecessor still fading inside its
//! teardown window. Control messages are drained at the start of every
//! block, time-driven transitions are advanced, then the graph renders.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    dsp::{
        automation::ParamCurve,
        envelope::{glide_seconds, EnvelopeGenerator},
    },
    graph::{
        manager::{contour_peak, cutoff_hz, tracked_cutoff, Glide, VoiceGraphManager, LEGATO_TIME},
        node::{RenderCtx, VoiceId},
    },
    synth::{
        message::{MessageReceiver, SynthMessage},
        note::Note,
        settings::SynthSettings,
        voice::{Transition, Voice, VoiceState},
    },
    MAX_BLOCK_SIZE,
};

/// Fade applied when a released voice starts tearing down.
const TEARDOWN_RAMP: f32 = 0.01;
/// Ramp for cutoff moves that are not part of a contour.
const CUTOFF_RAMP: f64 = 0.02;
/// Output level above which a block counts as overloaded.
pub const OVERLOAD_LEVEL: f32 = 0.9;

/// Clip indicator written by the render side, readable from any thread.
#[derive(Debug, Clone, Default)]
pub struct OverloadMeter {
    flag: Arc<AtomicBool>,
}

impl OverloadMeter {
    /// Whether the last rendered block went above `OVERLOAD_LEVEL`.
    pub fn is_overloaded(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    // Returns true when the reading changed.
    fn update(&self, overloaded: bool) -> bool {
        self.flag.swap(overloaded, Ordering::Relaxed) != overloaded
    }
}

pub struct MonoSynth<R: MessageReceiver> {
    sample_rate: f32,
    rx: R,
    settings: SynthSettings,
    graph: VoiceGraphManager,
    loudness: EnvelopeGenerator,
    contour: EnvelopeGenerator,
    current: Option<Voice>,
    lingering: Option<Voice>,
    last_note: Option<Note>,
    overload: OverloadMeter,
    frames: u64,
    time: f64,
}

impl<R: MessageReceiver> MonoSynth<R> {
    pub fn new(sample_rate: f32, settings: SynthSettings, rx: R, seed: u64) -> Self {
        Self {
            sample_rate,
            rx,
            settings,
            graph: VoiceGraphManager::new(sample_rate, &settings, seed),
            loudness: EnvelopeGenerator::new(settings.loudness, settings.decay_switch),
            contour: EnvelopeGenerator::new(settings.filter.envelope, settings.decay_switch),
            current: None,
            lingering: None,
            last_note: None,
            overload: OverloadMeter::default(),
            frames: 0,
            time: 0.0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Engine time in seconds at the start of the next block.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    pub fn graph(&self) -> &VoiceGraphManager {
        &self.graph
    }

    pub fn current_voice(&self) -> Option<&Voice> {
        self.current.as_ref()
    }

    pub fn lingering_voice(&self) -> Option<&Voice> {
        self.lingering.as_ref()
    }

    pub fn state(&self) -> VoiceState {
        self.current.map_or(VoiceState::Idle, |voice| voice.state())
    }

    pub fn is_overloaded(&self) -> bool {
        self.overload.is_overloaded()
    }

    /// A reader for the overload flag that can live on another thread.
    pub fn overload_meter(&self) -> OverloadMeter {
        self.overload.clone()
    }

    pub fn handle(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn(note) => self.note_on(note),
            SynthMessage::NoteOff(note) => self.note_off(note),
            SynthMessage::NoteTransition { from, to } => self.handle_note_transition(from, to),
            SynthMessage::Settings(settings) => self.update_settings(settings),
            SynthMessage::AllNotesOff => self.all_notes_off(),
        }
    }

    pub fn note_on(&mut self, note: Note) {
        let now = self.time;
        match self.current {
            Some(voice) if voice.state() != VoiceState::TearingDown => {
                let time = self.transition_time();
                self.retrigger(note, now, time);
            }
            _ => {
                let glide = self.glide_from(self.last_note);
                self.start_voice(note, now, glide);
            }
        }
    }

    /// Release the current voice if it is holding `note`. Last-note
    /// priority: releases for any other note are ignored.
    pub fn note_off(&mut self, note: Note) {
        let now = self.time;
        let Some(voice) = self.current.as_mut() else {
            return;
        };
        if voice.note() != note || !voice.state().is_gated() {
            tracing::debug!(%note, held = %voice.note(), "stale note off ignored");
            return;
        }

        let release_end = match self.graph.amp_curve_mut(voice.id()) {
            Some(curve) => self.loudness.release(curve, now, 0.0),
            None => now,
        };
        let filter = &self.settings.filter;
        let base = tracked_cutoff(filter, note);
        if filter.contour_enabled {
            self.contour.release(self.graph.cutoff_curve_mut(), now, base);
        }

        voice.release(now, release_end);
        tracing::debug!(%note, release_end, "note released");
    }

    /// Move from `from` to `to`: a 50 ms pitch change when a voice is
    /// sounding, otherwise a fresh attack that glides in from `from` if
    /// glide is on.
    pub fn handle_note_transition(&mut self, from: Note, to: Note) {
        let now = self.time;
        match self.state() {
            state if state.is_gated() => {
                if let Some(voice) = self.current.as_mut() {
                    voice.glide(to);
                    self.graph.retrigger(voice.id(), to, &self.settings, now, LEGATO_TIME);
                    self.last_note = Some(to);
                }
            }
            VoiceState::Releasing => self.retrigger(to, now, LEGATO_TIME),
            _ => {
                let glide = self.glide_from(Some(from));
                self.start_voice(to, now, glide);
            }
        }
    }

    pub fn all_notes_off(&mut self) {
        if let Some(voice) = self.current.filter(|voice| voice.state().is_gated()) {
            self.note_off(voice.note());
        }
    }

    /// Install a new settings snapshot and push it into the live graph.
    pub fn update_settings(&mut self, next: SynthSettings) {
        let now = self.time;
        let prev = std::mem::replace(&mut self.settings, next);

        self.loudness.set_params(next.loudness, next.decay_switch);
        self.contour.set_params(next.filter.envelope, next.decay_switch);
        self.graph.update_globals(&next, now);

        let cutoff_moved = !prev.filter.same_cutoff_path(&next.filter);
        match self.current {
            Some(voice) if voice.state() != VoiceState::TearingDown => {
                self.graph.update_live(voice.id(), &prev, &next, voice.note(), now);
                if cutoff_moved {
                    self.retarget_cutoff(Some(voice), now);
                }
            }
            _ if cutoff_moved => self.retarget_cutoff(None, now),
            _ => {}
        }
    }

    /// Advance time-driven transitions and collect retired chains.
    pub fn tick(&mut self) {
        let now = self.time;

        if let Some(voice) = self.current.as_mut() {
            match voice.tick(now) {
                Some(Transition::Sustained) => tracing::debug!(note = %voice.note(), "sustaining"),
                Some(Transition::ReleaseFinished) => {
                    let deadline = self.graph.teardown(voice.id(), now, TEARDOWN_RAMP);
                    voice.begin_teardown(deadline);
                }
                Some(Transition::Expired) => {
                    Self::free_voice(&mut self.graph, voice);
                    self.current = None;
                }
                None => {}
            }
        }

        if let Some(voice) = self.lingering.as_mut() {
            if voice.tick(now) == Some(Transition::Expired) {
                Self::free_voice(&mut self.graph, voice);
                self.lingering = None;
            }
        }

        self.graph.collect(now);
    }

    pub fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.render_block_with_input(left, right, None);
    }

    /// Render stereo output, mixing `input` into the filter when the
    /// external input is enabled.
    pub fn render_block_with_input(&mut self, left: &mut [f32], right: &mut [f32], input: Option<&[f32]>) {
        while let Some(message) = self.rx.pop() {
            self.handle(message);
        }

        let len = left.len().min(right.len());
        let mut offset = 0;
        while offset < len {
            let end = (offset + MAX_BLOCK_SIZE).min(len);
            self.tick();

            let ctx = RenderCtx::new(self.sample_rate, self.time);
            let chunk = input.map(|input| &input[offset.min(input.len())..end.min(input.len())]);
            self.graph
                .render(&ctx, &mut left[offset..end], &mut right[offset..end], chunk);

            self.frames += (end - offset) as u64;
            self.time = self.frames as f64 / self.sample_rate as f64;
            offset = end;
        }

        let overloaded = left[..len]
            .iter()
            .chain(&right[..len])
            .any(|s| s.abs() > OVERLOAD_LEVEL);
        if self.overload.update(overloaded) {
            tracing::debug!(overloaded, "output overload changed");
        }
    }

    fn start_voice(&mut self, note: Note, now: f64, glide: Option<Glide>) {
        if let Some(mut stale) = self.lingering.take() {
            tracing::debug!(voice = %stale.id(), "forcing lingering voice out");
            Self::free_voice(&mut self.graph, &mut stale);
        }
        if let Some(previous) = self.current.take() {
            self.lingering = Some(previous);
        }

        let id = match self.graph.build(note, &self.settings, now, glide) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(%note, %err, "could not build voice");
                return;
            }
        };

        let sustain_at = self.trigger_envelopes(id, note, now);
        self.current = Some(Voice::new(id, note, sustain_at));
        self.last_note = Some(note);
        tracing::debug!(%note, voice = %id, "note on");
    }

    fn retrigger(&mut self, note: Note, now: f64, time: f32) {
        let Some(mut voice) = self.current else {
            return;
        };
        self.graph.retrigger(voice.id(), note, &self.settings, now, time);
        let sustain_at = self.trigger_envelopes(voice.id(), note, now);
        voice.retrigger(note, sustain_at);
        self.current = Some(voice);
        self.last_note = Some(note);
        tracing::debug!(%note, "legato retrigger");
    }

    // Start both contours from their live values; returns when the
    // loudness contour reaches sustain.
    fn trigger_envelopes(&mut self, id: VoiceId, note: Note, now: f64) -> f64 {
        let sustain_at = match self.graph.amp_curve_mut(id) {
            Some(curve) => self.loudness.trigger(curve, now, 0.0, 1.0),
            None => now,
        };

        let filter = &self.settings.filter;
        let base = tracked_cutoff(filter, note);
        let cutoff = self.graph.cutoff_curve_mut();
        if filter.contour_enabled {
            self.contour.trigger(cutoff, now, base, contour_peak(filter, base));
        } else {
            self.contour.gate(now);
            ramp_cutoff(cutoff, base, now);
        }
        sustain_at
    }

    // The cutoff knobs moved: a held note keeps its contour timing and
    // continues from the live cutoff toward the new targets.
    fn retarget_cutoff(&mut self, voice: Option<Voice>, now: f64) {
        let filter = self.settings.filter;
        let cutoff = self.graph.cutoff_curve_mut();
        match voice {
            Some(voice) if filter.contour_enabled && voice.state().is_gated() => {
                let base = tracked_cutoff(&filter, voice.note());
                let peak = contour_peak(&filter, base);
                self.contour.reshape(cutoff, now, base, peak, CUTOFF_RAMP);
            }
            Some(voice) => ramp_cutoff(cutoff, tracked_cutoff(&filter, voice.note()), now),
            None => ramp_cutoff(cutoff, cutoff_hz(filter.cutoff), now),
        }
    }

    fn transition_time(&self) -> f32 {
        if self.settings.glide.enabled {
            glide_seconds(self.settings.glide.time)
        } else {
            LEGATO_TIME
        }
    }

    fn glide_from(&self, from: Option<Note>) -> Option<Glide> {
        if !self.settings.glide.enabled {
            return None;
        }
        from.map(|from| Glide {
            from,
            time: glide_seconds(self.settings.glide.time),
        })
    }

    fn free_voice(graph: &mut VoiceGraphManager, voice: &mut Voice) {
        if let Err(err) = graph.free(voice.id()) {
            tracing::warn!(voice = %voice.id(), %err, "voice already freed");
        }
        voice.free();
    }
}

fn ramp_cutoff(curve: &mut ParamCurve, target: f32, now: f64) {
    curve.cancel_and_hold(now);
    curve.linear_ramp_to(target, now + CUTOFF_RAMP);
}
