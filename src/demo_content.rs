//! Built-in demo sounds: synthesized tones standing in for game assets.

use anyhow::{Context, Result};
use clockwork_audio::{
    ChannelLayout, EffectId, MachineClips, PcmFormat, SongId, SoundBank, SoundResource,
    VOICE_BANK_SIZE,
};
use std::f32::consts::TAU;
use std::sync::Arc;

const TICKS_PER_SECOND: u32 = 60;

/// Sample rate of every synthesized clip.
pub const DEMO_SAMPLE_RATE: u32 = 24_000;

/// One synthesized clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSpec {
    pub name: &'static str,
    pub ticks: u32,
    pub tone_hz: f32,
}

const fn clip(name: &'static str, ticks: u32, tone_hz: f32) -> ClipSpec {
    ClipSpec {
        name,
        ticks,
        tone_hz,
    }
}

const SONGS: &[(SongId, &[ClipSpec])] = &[
    (SongId::Title, &[clip("title-loop", 480, 220.0)]),
    (
        SongId::Map,
        &[clip("map-intro", 90, 262.0), clip("map-loop", 360, 247.0)],
    ),
    (SongId::Workshop, &[clip("workshop-loop", 420, 196.0)]),
    (
        SongId::Factory,
        &[clip("factory-intro", 120, 175.0), clip("factory-loop", 300, 165.0)],
    ),
    (SongId::Foundry, &[clip("foundry-loop", 360, 147.0)]),
    (
        SongId::Finale,
        &[
            clip("finale-intro", 60, 330.0),
            clip("finale-loop", 240, 294.0),
            clip("finale-outro", 150, 392.0),
        ],
    ),
    (SongId::Credits, &[clip("credits-loop", 600, 262.0)]),
];

const EFFECTS: &[(EffectId, ClipSpec)] = &[
    (EffectId::MenuMove, clip("menu-move", 4, 880.0)),
    (EffectId::MenuSelect, clip("menu-select", 8, 988.0)),
    (EffectId::MenuBack, clip("menu-back", 8, 659.0)),
    (EffectId::Achievement, clip("achievement", 45, 1047.0)),
    (EffectId::Pickup, clip("pickup", 10, 784.0)),
    (EffectId::Drop, clip("drop", 10, 392.0)),
    (EffectId::Bounce, clip("bounce", 6, 523.0)),
    (EffectId::Shatter, clip("shatter", 30, 1319.0)),
    (EffectId::Explosion, clip("explosion", 50, 82.0)),
    (EffectId::Countdown, clip("countdown", 12, 1760.0)),
    (EffectId::Siren, clip("siren", 180, 587.0)),
    (EffectId::Win, clip("win", 120, 523.0)),
    (EffectId::Lose, clip("lose", 90, 233.0)),
];

struct MachineSpec {
    index: usize,
    intro: Option<ClipSpec>,
    looping: ClipSpec,
    outro: Option<ClipSpec>,
}

const MACHINES: &[MachineSpec] = &[
    MachineSpec {
        index: 0,
        intro: None,
        looping: clip("conveyor-loop", 30, 110.0),
        outro: None,
    },
    MachineSpec {
        index: 1,
        intro: Some(clip("press-intro", 20, 140.0)),
        looping: clip("press-loop", 30, 120.0),
        outro: Some(clip("press-outro", 25, 90.0)),
    },
    MachineSpec {
        index: 2,
        intro: None,
        looping: clip("furnace-loop", 45, 70.0),
        outro: Some(clip("furnace-outro", 40, 60.0)),
    },
    MachineSpec {
        index: 3,
        intro: Some(clip("drill-intro", 15, 300.0)),
        looping: clip("drill-loop", 20, 280.0),
        outro: None,
    },
];

fn voice_spec(index: usize) -> ClipSpec {
    const NAMES: [&str; VOICE_BANK_SIZE] = [
        "voice-00", "voice-01", "voice-02", "voice-03", "voice-04", "voice-05", "voice-06",
        "voice-07", "voice-08", "voice-09", "voice-10", "voice-11", "voice-12",
    ];
    clip(NAMES[index], 150 + 15 * index as u32, 300.0 + 20.0 * index as f32)
}

/// Build the demo bank, asking `make` for each clip's playable resource.
pub fn build_bank(
    make: &mut dyn FnMut(&ClipSpec) -> Result<Arc<dyn SoundResource>>,
) -> Result<SoundBank> {
    let mut bank = SoundBank::new();
    for (song, clips) in SONGS {
        let resources = clips.iter().map(|spec| make(spec)).collect::<Result<Vec<_>>>()?;
        bank.register_song(*song, resources)
            .with_context(|| format!("registering song {}", song.name()))?;
    }
    for (effect, spec) in EFFECTS {
        bank.register_effect(*effect, make(spec)?)
            .with_context(|| format!("registering effect {}", effect.name()))?;
    }
    for index in 0..VOICE_BANK_SIZE {
        bank.register_voice(index, make(&voice_spec(index))?)
            .with_context(|| format!("registering voice {index}"))?;
    }
    Ok(bank)
}

/// PCM format of the synthesized machine clips.
pub fn machine_format() -> PcmFormat {
    PcmFormat::new(DEMO_SAMPLE_RATE, ChannelLayout::Mono)
}

/// Machine sound indices and their synthesized clips, ready for batch registration.
pub fn machine_clips() -> Result<(Vec<usize>, Vec<MachineClips>)> {
    let format = machine_format();
    let mut indices = Vec::with_capacity(MACHINES.len());
    let mut clips = Vec::with_capacity(MACHINES.len());
    for machine in MACHINES {
        let built = MachineClips::new(
            format,
            machine.intro.as_ref().map(pcm_bytes),
            pcm_bytes(&machine.looping),
            machine.outro.as_ref().map(pcm_bytes),
        )
        .with_context(|| format!("building machine sound {}", machine.index))?;
        indices.push(machine.index);
        clips.push(built);
    }
    Ok((indices, clips))
}

fn samples(spec: &ClipSpec) -> impl Iterator<Item = i16> + '_ {
    let count = DEMO_SAMPLE_RATE / TICKS_PER_SECOND * spec.ticks;
    (0..count).map(move |n| {
        let t = n as f32 / DEMO_SAMPLE_RATE as f32;
        ((TAU * spec.tone_hz * t).sin() * 0.25 * i16::MAX as f32) as i16
    })
}

/// Raw 16-bit little-endian mono PCM for a clip.
pub fn pcm_bytes(spec: &ClipSpec) -> Vec<u8> {
    samples(spec).flat_map(i16::to_le_bytes).collect()
}

/// The clip encoded as a WAV file, for decoders that need a container.
#[cfg(feature = "rodio_backend")]
pub fn wav_bytes(spec: &ClipSpec) -> Result<Vec<u8>> {
    let wav_spec = hound::WavSpec {
        channels: 1,
        sample_rate: DEMO_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(std::io::Cursor::new(&mut bytes), wav_spec)
            .with_context(|| format!("encoding {}", spec.name))?;
        for sample in samples(spec) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clockwork_audio::HeadlessBackend;

    #[test]
    fn demo_bank_covers_every_song_effect_and_voice() {
        let backend = HeadlessBackend::new();
        let bank = build_bank(&mut |spec: &ClipSpec| {
            Ok(backend.resource(spec.name, spec.ticks))
        })
        .unwrap();
        for song in SongId::ALL {
            assert!(bank.song(song).is_some(), "missing {song:?}");
        }
        for effect in EffectId::ALL {
            assert!(bank.effect(effect).is_some(), "missing {effect:?}");
        }
        for index in 0..VOICE_BANK_SIZE {
            assert!(bank.voice(index).is_some(), "missing voice {index}");
        }
        assert_eq!(bank.song(SongId::Finale).map(<[_]>::len), Some(3));
    }

    #[test]
    fn machine_clips_are_whole_ticks_of_pcm() {
        let (indices, clips) = machine_clips().unwrap();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(clips[1].has_intro() && clips[1].has_outro());
        assert!(!clips[0].has_intro() && !clips[0].has_outro());

        let bytes = pcm_bytes(&clip("tick", 1, 440.0));
        assert_eq!(bytes.len(), (DEMO_SAMPLE_RATE / TICKS_PER_SECOND * 2) as usize);
    }
}
