//! Phrase playback on a device or offline

use std::{thread, time::Duration};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};

use ladder_mono::{
    engine::{create_offline_with, create_synth_with, EngineConfig, SynthHandle},
    synth::settings::{FilterSettings, GlideSettings, ModulationSettings, SettingsPatch, SynthSettings},
    MAX_BLOCK_SIZE,
};

use super::{BounceArgs, PhraseArgs};

/// Settings delta built from the command-line knobs.
fn patch_for(args: &PhraseArgs) -> SettingsPatch {
    let defaults = SynthSettings::default();
    let mut modulation: ModulationSettings = defaults.modulation;
    modulation.routing.pitch = args.vibrato;

    SettingsPatch {
        filter: Some(FilterSettings {
            cutoff: args.cutoff,
            emphasis: args.emphasis,
            ..defaults.filter
        }),
        glide: args.glide.map(|time| GlideSettings { enabled: true, time }),
        modulation: Some(modulation),
        mod_wheel: Some(args.mod_wheel),
        tuner: args.tuner.then_some(true),
        ..SettingsPatch::default()
    }
}

/// One step of the phrase, as a list of control calls.
enum Step<'a> {
    Start(&'a str),
    Move { from: &'a str, to: &'a str },
}

fn steps(args: &PhraseArgs) -> Vec<Step<'_>> {
    args.notes
        .iter()
        .enumerate()
        .map(|(i, note)| match i.checked_sub(1).map(|prev| &args.notes[prev]) {
            Some(prev) if args.legato => Step::Move {
                from: prev.as_str(),
                to: note.as_str(),
            },
            _ => Step::Start(note.as_str()),
        })
        .collect()
}

fn begin(handle: &mut SynthHandle, step: &Step<'_>) -> EyreResult<()> {
    match *step {
        Step::Start(note) => handle.note_on(note)?,
        Step::Move { from, to } => handle.handle_note_transition(from, to)?,
    }
    Ok(())
}

fn end(handle: &mut SynthHandle, args: &PhraseArgs, index: usize, note: &str) -> EyreResult<()> {
    let last = index + 1 == args.notes.len();
    if !args.legato || last {
        handle.note_off(note)?;
    }
    Ok(())
}

pub fn play(args: &PhraseArgs) -> EyreResult<()> {
    if args.notes.is_empty() {
        return Err(eyre!("no notes to play"));
    }

    let mut synth = create_synth_with(EngineConfig::default()).wrap_err("failed to open audio output")?;
    synth.update_settings(&patch_for(args))?;

    println!("=== ladder-mono ===");
    println!("Sample rate: {} Hz", synth.sample_rate());
    println!("Notes: {}", args.notes.join(" "));
    println!();

    let step = Duration::from_millis(args.step_ms);
    for (index, (note, action)) in args.notes.iter().zip(steps(args)).enumerate() {
        begin(synth.handle(), &action)?;
        thread::sleep(step.mul_f32(0.8));
        end(synth.handle(), args, index, note)?;
        thread::sleep(step.mul_f32(0.2));
    }

    // Let the last release ring out
    thread::sleep(Duration::from_millis(1_500));
    synth.dispose();
    Ok(())
}

pub fn bounce(args: &BounceArgs) -> EyreResult<()> {
    let phrase = &args.phrase;
    if phrase.notes.is_empty() {
        return Err(eyre!("no notes to render"));
    }

    let sample_rate = args.sample_rate as f32;
    let (mut handle, mut synth) = create_offline_with(sample_rate, &EngineConfig::default());
    handle.update_settings(&patch_for(phrase))?;

    let frames_per_step = (phrase.step_ms as f32 / 1_000.0 * sample_rate) as usize;
    let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut right = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut peak = 0.0f32;
    let mut energy = 0.0f64;
    let mut frames = 0usize;
    let mut overloads = 0usize;

    let mut render = |count: usize, synth: &mut ladder_mono::synth::MonoSynth<_>| {
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(256);
            synth.render_block(&mut left[..n], &mut right[..n]);
            for &s in left[..n].iter().chain(&right[..n]) {
                peak = peak.max(s.abs());
                energy += (s * s) as f64;
            }
            if synth.is_overloaded() {
                overloads += 1;
            }
            frames += n;
            remaining -= n;
        }
    };

    for (index, (note, action)) in phrase.notes.iter().zip(steps(phrase)).enumerate() {
        begin(&mut handle, &action)?;
        render(frames_per_step * 4 / 5, &mut synth);
        end(&mut handle, phrase, index, note)?;
        render(frames_per_step / 5, &mut synth);
    }
    render(sample_rate as usize, &mut synth);

    let rms = (energy / (2 * frames.max(1)) as f64).sqrt();
    println!("Rendered {frames} frames at {sample_rate} Hz");
    println!("Peak: {peak:.4}  RMS: {rms:.4}");
    println!("Overloaded blocks: {overloads}");
    println!("Final state: {:?}", synth.state());
    Ok(())
}
