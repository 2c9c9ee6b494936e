// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Renders a patch to a WAV file: loads the patch YAML, plays a chord,
//! holds it, releases, and writes the result.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use keyzone::config::Patch;
use keyzone::{Sampler, CHUNK_SIZE};

#[derive(Parser)]
#[clap(author = "Michael Wilson", about = "Renders a keyzone patch to a WAV file.")]
struct Cli {
    /// The patch YAML to load.
    patch: PathBuf,

    /// Where to write the rendered audio.
    #[clap(short, long, default_value = "keyzone-demo.wav")]
    output: PathBuf,

    /// MIDI notes to play, comma separated.
    #[clap(short, long, default_value = "48,60,64,67", value_delimiter = ',')]
    notes: Vec<u8>,

    /// How long to hold the notes, in seconds.
    #[clap(long, default_value_t = 2.0)]
    hold: f32,

    /// How long to render after release, in seconds.
    #[clap(long, default_value_t = 1.0)]
    tail: f32,
}

const SAMPLE_RATE: f32 = 44100.0;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let (mut sampler, mut renderer) = Sampler::new(SAMPLE_RATE);
    let patch = Patch::from_yaml_file(&cli.patch)?;
    let base_path = cli.patch.parent().unwrap_or(std::path::Path::new("."));
    patch.apply(&mut sampler, base_path)?;

    for note in &cli.notes {
        sampler.play_note(*note, 100);
    }

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&cli.output, spec)?;

    let hold_blocks = (cli.hold * SAMPLE_RATE / CHUNK_SIZE as f32) as usize;
    let tail_blocks = (cli.tail * SAMPLE_RATE / CHUNK_SIZE as f32) as usize;
    let mut left = [0.0f32; CHUNK_SIZE];
    let mut right = [0.0f32; CHUNK_SIZE];

    for block in 0..hold_blocks + tail_blocks {
        if block == hold_blocks {
            for note in &cli.notes {
                sampler.stop_note(*note, false);
            }
        }
        left.fill(0.0);
        right.fill(0.0);
        renderer.render(&mut left, &mut right);
        for frame in 0..CHUNK_SIZE {
            writer.write_sample(left[frame])?;
            writer.write_sample(right[frame])?;
        }
    }
    writer.finalize()?;

    info!(output = ?cli.output, notes = ?cli.notes, "Render complete");
    Ok(())
}
