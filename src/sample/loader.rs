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

//! WAV loading.
//!
//! Samples are read entirely into memory up front; nothing here runs on the
//! audio thread.

use std::path::Path;

use hound::WavReader;
use tracing::info;

use super::OwnedSampleData;

/// Typed error for sample load failures.
#[derive(Debug, thiserror::Error)]
pub enum SampleLoadError {
    #[error("WAV read error: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannelCount(u16),
}

/// Reads a mono or stereo WAV file into an interleaved f32 buffer.
///
/// Integer formats are scaled to [-1, 1]; float files are passed through.
pub fn load_wav_file(path: &Path) -> Result<OwnedSampleData, SampleLoadError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.channels > 2 {
        return Err(SampleLoadError::UnsupportedChannelCount(spec.channels));
    }

    let pcm: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<Result<Vec<f32>, hound::Error>>()?
        }
    };

    let frame_count = pcm.len() / usize::from(spec.channels);
    info!(
        path = ?path,
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        frames = frame_count,
        "Sample loaded"
    );

    Ok(OwnedSampleData {
        sample_rate: spec.sample_rate as f32,
        channel_count: spec.channels,
        frame_count,
        pcm,
    })
}
