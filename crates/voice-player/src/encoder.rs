//! Raw PCM block to Opus frame conversion.

use audiopus::coder::Encoder;
use audiopus::{Application, Bitrate, Channels, SampleRate};

use crate::config::MAX_FRAME_BYTES;
use crate::error::{PlayerError, Result};

/// Opus encoder fixed at 48 kHz stereo.
///
/// One instance belongs to one decode session and is dropped with it. Callers must
/// hand it blocks of exactly 960 interleaved sample-frames; the size is not checked
/// here, and a wrong size surfaces as an [`PlayerError::EncodeFailed`] from the codec.
pub struct FrameEncoder {
    inner: Encoder,
    samples: Vec<i16>,
    out: Vec<u8>,
}

impl FrameEncoder {
    pub fn new(bitrate_bps: Option<i32>) -> Result<Self> {
        let mut inner = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
            .map_err(|e| PlayerError::EncodeFailed(format!("encoder init: {e}")))?;
        if let Some(bps) = bitrate_bps {
            inner
                .set_bitrate(Bitrate::BitsPerSecond(bps))
                .map_err(|e| PlayerError::EncodeFailed(format!("bitrate {bps}: {e}")))?;
        }
        Ok(Self {
            inner,
            samples: Vec::new(),
            out: vec![0u8; MAX_FRAME_BYTES],
        })
    }

    /// Encode one block of interleaved little-endian 16-bit PCM.
    pub fn encode(&mut self, block: &[u8]) -> Result<Vec<u8>> {
        pcm_to_samples(block, &mut self.samples);
        let len = self
            .inner
            .encode(&self.samples, &mut self.out)
            .map_err(|e| PlayerError::EncodeFailed(e.to_string()))?;
        Ok(self.out[..len].to_vec())
    }
}

/// Little-endian byte pairs to samples. A trailing odd byte is ignored.
pub fn pcm_to_samples(block: &[u8], samples: &mut Vec<i16>) {
    samples.clear();
    samples.extend(
        block
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
}
