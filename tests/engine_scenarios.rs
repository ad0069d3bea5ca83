#![cfg(feature = "rtrb")]

use ladder_mono::{
    dsp::envelope::{glide_seconds, knob_to_seconds},
    engine::{create_offline, SynthHandle},
    graph::manager::{contour_peak, cutoff_hz, oscillator_frequency, oscillator_gain, LEGATO_TIME, TUNER_LEVEL},
    synth::{
        settings::{GlideSettings, OscillatorSettings, SettingsPatch, SynthSettings},
        MonoSynth, Note, SynthMessage, VoiceState,
    },
};
use rtrb::Consumer;

const SR: f32 = 48_000.0;
const BLOCK: usize = 128;

type Synth = MonoSynth<Consumer<SynthMessage>>;

fn engine() -> (SynthHandle, Synth) {
    create_offline(SR)
}

/// Render `seconds` of audio and return the left channel.
fn run(synth: &mut Synth, seconds: f64) -> Vec<f32> {
    let (mut left, mut right) = ([0.0f32; BLOCK], [0.0f32; BLOCK]);
    let blocks = (seconds * SR as f64 / BLOCK as f64).ceil() as usize;
    let mut out = Vec::with_capacity(blocks * BLOCK);
    for _ in 0..blocks {
        synth.render_block(&mut left, &mut right);
        out.extend_from_slice(&left);
    }
    out
}

fn note(name: &str) -> Note {
    name.parse().unwrap()
}

#[test]
fn note_on_from_idle_opens_the_filter_over_the_attack() {
    let (mut handle, mut synth) = engine();
    handle.note_on("A4").unwrap();
    run(&mut synth, 0.001);

    assert_eq!(synth.state(), VoiceState::Attacking);
    let voice = *synth.current_voice().unwrap();
    assert_eq!(voice.note(), note("A4"));
    assert_eq!(synth.graph().sounding_chains(voice.id()), 3);

    let filter = synth.settings().filter;
    let base = cutoff_hz(filter.cutoff);
    let peak = contour_peak(&filter, base);
    let attack = filter.envelope.attack_time() as f64;

    assert!((synth.graph().cutoff_at(0.0) - base).abs() < 1.0);
    let halfway = synth.graph().cutoff_at(attack * 0.5);
    assert!(halfway > base && halfway < peak, "cutoff {halfway} not between {base} and {peak}");
    assert!((synth.graph().cutoff_at(attack) - peak).abs() < 1.0);
}

#[test]
fn legato_transition_moves_pitch_without_rebuilding() {
    let (mut handle, mut synth) = engine();
    handle.note_on("C4").unwrap();
    run(&mut synth, 0.3);
    let before = *synth.current_voice().unwrap();

    let t0 = synth.time();
    handle.handle_note_transition("C4", "E4").unwrap();
    run(&mut synth, 0.001);

    let after = *synth.current_voice().unwrap();
    assert_eq!(after.id(), before.id());
    assert_eq!(after.note(), note("E4"));
    assert!(after.state().is_gated());
    assert!(synth.lingering_voice().is_none());

    let settings = *synth.settings();
    let chain = synth.graph().oscillator(after.id(), 0).unwrap();
    let from = oscillator_frequency(&settings, 0, note("C4"));
    let to = oscillator_frequency(&settings, 0, note("E4"));

    assert!((chain.frequency_at(t0) - from).abs() < 0.5);
    let mid = chain.frequency_at(t0 + LEGATO_TIME as f64 * 0.5);
    assert!(mid > from && mid < to);
    assert!((chain.frequency_at(t0 + LEGATO_TIME as f64 + 0.001) - to).abs() < 0.5);
}

#[test]
fn stale_note_off_does_not_release() {
    let (mut handle, mut synth) = engine();
    handle.note_on("C4").unwrap();
    handle.note_on("E4").unwrap();
    handle.note_off("C4").unwrap();
    run(&mut synth, 0.05);

    assert!(synth.state().is_gated());
    assert_eq!(synth.current_voice().unwrap().note(), note("E4"));

    handle.note_off("E4").unwrap();
    run(&mut synth, 0.001);
    assert_eq!(synth.state(), VoiceState::Releasing);
}

#[test]
fn disabling_an_oscillator_fades_only_that_chain() {
    let (mut handle, mut synth) = engine();
    handle.note_on("A3").unwrap();
    run(&mut synth, 0.3);
    let id = synth.current_voice().unwrap().id();

    let muted = OscillatorSettings {
        enabled: false,
        ..SynthSettings::default().oscillators[1]
    };
    let t0 = synth.time();
    handle
        .update_settings(&SettingsPatch::default().oscillator(1, muted))
        .unwrap();
    run(&mut synth, 0.001);

    assert_eq!(synth.graph().sounding_chains(id), 2);
    let fading = synth.graph().oscillator(id, 1).unwrap();
    assert!(fading.gain_at(t0 + 0.1) < 1e-6);

    let settings = *synth.settings();
    for slot in [0, 2] {
        let chain = synth.graph().oscillator(id, slot).unwrap();
        assert!(chain.retire_at().is_none());
        assert!((chain.gain_at(t0 + 0.1) - oscillator_gain(&settings, slot)).abs() < 1e-6);
    }

    run(&mut synth, 0.4);
    assert!(synth.graph().oscillator(id, 1).is_none());
    assert!(synth.graph().oscillator(id, 0).is_some());
    assert!(synth.state().is_gated());
}

#[test]
fn retrigger_during_release_has_no_amplitude_jump() {
    let (mut handle, mut synth) = engine();
    handle.note_on("A4").unwrap();
    run(&mut synth, 0.4);
    handle.note_off("A4").unwrap();
    let release = synth.settings().loudness.release_time() as f64;
    run(&mut synth, release * 0.5);
    assert_eq!(synth.state(), VoiceState::Releasing);

    let id = synth.current_voice().unwrap().id();
    let t0 = synth.time();
    handle.note_on("A4").unwrap();
    run(&mut synth, 0.001);
    assert_eq!(synth.current_voice().unwrap().id(), id);
    assert_eq!(synth.state(), VoiceState::Attacking);

    let amp = synth.graph().amp(id).unwrap();
    let dt = 1.0 / SR as f64;
    let levels: Vec<f32> = (0..4_800).map(|n| amp.level_at(t0 + n as f64 * dt)).collect();
    assert!(levels[0] > 0.05, "release should still be audible");

    let max_step = levels
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .fold(0.0f32, f32::max);
    assert!(max_step < 0.01, "amplitude jumped by {max_step} in one sample");
}

#[test]
fn released_voice_tears_down_to_idle() {
    let (mut handle, mut synth) = engine();
    handle.note_on("G2").unwrap();
    run(&mut synth, 0.2);
    handle.note_off("G2").unwrap();

    let release = synth.settings().loudness.release_time() as f64;
    run(&mut synth, release + 0.5);

    assert_eq!(synth.state(), VoiceState::Idle);
    assert!(synth.graph().live_voices().iter().all(Option::is_none));
    let tail = run(&mut synth, 0.05);
    assert!(tail.iter().all(|&s| s == 0.0));
}

#[test]
fn new_note_after_teardown_builds_a_fresh_voice() {
    let (mut handle, mut synth) = engine();
    handle.note_on("C3").unwrap();
    run(&mut synth, 0.1);
    handle.note_off("C3").unwrap();
    let release = knob_to_seconds(synth.settings().loudness.release) as f64 + 0.02;
    run(&mut synth, release);
    assert_eq!(synth.state(), VoiceState::TearingDown);
    let old = synth.current_voice().unwrap().id();

    handle.note_on("C4").unwrap();
    run(&mut synth, 0.001);
    let fresh = synth.current_voice().unwrap().id();
    assert_ne!(fresh, old);
    assert_eq!(synth.lingering_voice().map(|v| v.id()), Some(old));

    run(&mut synth, 0.3);
    assert!(synth.lingering_voice().is_none());
    assert!(!synth.graph().is_live(old));
    assert!(synth.graph().is_live(fresh));
}

#[test]
fn transition_from_silence_starts_on_the_new_note_without_glide() {
    let (mut handle, mut synth) = engine();
    handle.handle_note_transition("A3", "A4").unwrap();
    run(&mut synth, 0.001);

    let voice = *synth.current_voice().unwrap();
    assert_eq!(voice.state(), VoiceState::Attacking);
    let settings = *synth.settings();
    let chain = synth.graph().oscillator(voice.id(), 0).unwrap();
    let target = oscillator_frequency(&settings, 0, note("A4"));
    assert!((chain.frequency_at(0.0) - target).abs() < 0.5);
    assert!((chain.frequency_at(LEGATO_TIME as f64 * 0.5) - target).abs() < 0.5);
}

#[test]
fn transition_from_silence_glides_from_the_previous_note() {
    let (mut handle, mut synth) = engine();
    handle
        .update_settings(&SettingsPatch {
            glide: Some(GlideSettings { enabled: true, time: 5.0 }),
            ..SettingsPatch::default()
        })
        .unwrap();
    handle.handle_note_transition("A3", "A4").unwrap();
    run(&mut synth, 0.001);

    let voice = *synth.current_voice().unwrap();
    let settings = *synth.settings();
    let chain = synth.graph().oscillator(voice.id(), 0).unwrap();
    let glide = glide_seconds(5.0) as f64;
    assert!((chain.frequency_at(0.0) - oscillator_frequency(&settings, 0, note("A3"))).abs() < 0.5);
    assert!((chain.frequency_at(glide + 0.01) - oscillator_frequency(&settings, 0, note("A4"))).abs() < 0.5);
}

#[test]
fn emphasis_move_during_a_long_attack_keeps_the_filter_contour() {
    let (mut handle, mut synth) = engine();
    let mut filter = SynthSettings::default().filter;
    filter.envelope.attack = 8.0;
    handle
        .update_settings(&SettingsPatch {
            filter: Some(filter),
            ..SettingsPatch::default()
        })
        .unwrap();
    handle.note_on("C4").unwrap();
    run(&mut synth, 0.001);

    let attack = filter.envelope.attack_time() as f64;
    let base = cutoff_hz(filter.cutoff);
    let peak = contour_peak(&filter, base);
    assert!((synth.graph().cutoff_at(attack) - peak).abs() < 1.0);

    filter.emphasis = 3.0;
    handle
        .update_settings(&SettingsPatch {
            filter: Some(filter),
            ..SettingsPatch::default()
        })
        .unwrap();
    run(&mut synth, 0.5);

    assert!((synth.graph().cutoff_at(attack) - peak).abs() < 1.0);
    let rising = synth.graph().cutoff_at(synth.time());
    assert!(rising > base && rising < peak);
}

#[test]
fn tuner_sounds_without_a_note() {
    let (mut handle, mut synth) = engine();
    handle
        .update_settings(&SettingsPatch::default().tuner(true))
        .unwrap();
    let out = run(&mut synth, 0.1);

    let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!((peak - TUNER_LEVEL).abs() < 0.01, "reference peak {peak}");
    assert_eq!(synth.state(), VoiceState::Idle);
    assert!(!handle.is_overloaded());
}

#[test]
fn resonant_low_cutoff_stays_bounded() {
    let (mut handle, mut synth) = engine();
    let mut filter = SynthSettings::default().filter;
    filter.cutoff = -4.0;
    filter.emphasis = 10.0;
    filter.contour_enabled = false;
    handle
        .update_settings(&SettingsPatch {
            filter: Some(filter),
            main_volume: Some(10.0),
            ..SettingsPatch::default()
        })
        .unwrap();
    handle.note_on("C2").unwrap();

    let out = run(&mut synth, 10.0);
    assert!(out.iter().all(|s| s.is_finite()));
    assert!(out.iter().all(|s| s.abs() <= 1.0));
}

#[test]
fn external_input_is_heard_through_a_gated_voice() {
    let (mut handle, mut synth) = engine();
    let silent = OscillatorSettings {
        enabled: false,
        ..OscillatorSettings::default()
    };
    let mut patch = SettingsPatch::default()
        .oscillator(0, silent)
        .oscillator(1, silent)
        .oscillator(2, silent);
    patch.external_input = Some(ladder_mono::synth::settings::ExternalInputSettings {
        enabled: true,
        volume: 10.0,
    });
    handle.update_settings(&patch).unwrap();

    let input: Vec<f32> = (0..BLOCK)
        .map(|n| 0.5 * (2.0 * std::f32::consts::PI * 220.0 * n as f32 / SR).sin())
        .collect();
    let (mut left, mut right) = ([0.0f32; BLOCK], [0.0f32; BLOCK]);

    synth.render_block_with_input(&mut left, &mut right, Some(&input));
    assert!(left.iter().all(|&s| s == 0.0), "no voice, no output");

    handle.note_on("C4").unwrap();
    let mut energy = 0.0;
    for _ in 0..100 {
        synth.render_block_with_input(&mut left, &mut right, Some(&input));
        energy += left.iter().map(|s| s * s).sum::<f32>();
    }
    assert_eq!(synth.current_voice().map(|v| synth.graph().sounding_chains(v.id())), Some(0));
    assert!(energy > 1e-3);
}

#[test]
fn all_notes_off_releases_the_held_voice() {
    let (mut handle, mut synth) = engine();
    handle.note_on("D3").unwrap();
    run(&mut synth, 0.1);
    handle.all_notes_off().unwrap();
    run(&mut synth, 0.001);
    assert_eq!(synth.state(), VoiceState::Releasing);
}
