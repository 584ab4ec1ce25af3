//! G.711 mu-law codec and telephony resampling
//!
//! The carrier delivers 8-bit mu-law at 8kHz mono; speech services produce
//! either the same or 16-bit linear PCM at 16kHz. All functions here are pure
//! integer arithmetic with no failure modes; callers are responsible for
//! passing well-formed buffer lengths.

/// Outbound frame size: 160 bytes = 20ms of mu-law at 8kHz
pub const FRAME_BYTES: usize = 160;

/// mu-law decode lookup table (index = encoded byte)
///
/// Symmetric: the low half is the negated mirror of the high half. Indices
/// 0x7F and 0xFF both decode to 0, so re-encoding 0 cannot reproduce both.
const MULAW_DECODE_TABLE: [i16; 256] = [
    -32124, -31100, -30076, -29052, -28028, -27004, -25980, -24956,
    -23932, -22908, -21884, -20860, -19836, -18812, -17788, -16764,
    -15996, -15484, -14972, -14460, -13948, -13436, -12924, -12412,
    -11900, -11388, -10876, -10364, -9852, -9340, -8828, -8316,
    -7932, -7676, -7420, -7164, -6908, -6652, -6396, -6140,
    -5884, -5628, -5372, -5116, -4860, -4604, -4348, -4092,
    -3900, -3772, -3644, -3516, -3388, -3260, -3132, -3004,
    -2876, -2748, -2620, -2492, -2364, -2236, -2108, -1980,
    -1884, -1820, -1756, -1692, -1628, -1564, -1500, -1436,
    -1372, -1308, -1244, -1180, -1116, -1052, -988, -924,
    -876, -844, -812, -780, -748, -716, -684, -652,
    -620, -588, -556, -524, -492, -460, -428, -396,
    -372, -356, -340, -324, -308, -292, -276, -260,
    -244, -228, -212, -196, -180, -164, -148, -132,
    -120, -112, -104, -96, -88, -80, -72, -64,
    -56, -48, -40, -32, -24, -16, -8, 0,
    32124, 31100, 30076, 29052, 28028, 27004, 25980, 24956,
    23932, 22908, 21884, 20860, 19836, 18812, 17788, 16764,
    15996, 15484, 14972, 14460, 13948, 13436, 12924, 12412,
    11900, 11388, 10876, 10364, 9852, 9340, 8828, 8316,
    7932, 7676, 7420, 7164, 6908, 6652, 6396, 6140,
    5884, 5628, 5372, 5116, 4860, 4604, 4348, 4092,
    3900, 3772, 3644, 3516, 3388, 3260, 3132, 3004,
    2876, 2748, 2620, 2492, 2364, 2236, 2108, 1980,
    1884, 1820, 1756, 1692, 1628, 1564, 1500, 1436,
    1372, 1308, 1244, 1180, 1116, 1052, 988, 924,
    876, 844, 812, 780, 748, 716, 684, 652,
    620, 588, 556, 524, 492, 460, 428, 396,
    372, 356, 340, 324, 308, 292, 276, 260,
    244, 228, 212, 196, 180, 164, 148, 132,
    120, 112, 104, 96, 88, 80, 72, 64,
    56, 48, 40, 32, 24, 16, 8, 0,
];

/// Decode one mu-law byte to a 16-bit linear sample
#[inline]
pub fn decode_mulaw(byte: u8) -> i16 {
    MULAW_DECODE_TABLE[byte as usize]
}

/// Encode one 16-bit linear sample to a mu-law byte
///
/// Analytic inverse of the decode table: sign/magnitude split, drop to the
/// 14-bit mu-law domain, add the bias, clip to the 13-bit ceiling, find the
/// segment exponent from the highest set bit, pack sign|exponent|mantissa and
/// invert. Bit-exact against the table at every table-defined point (0 always
/// re-encodes to 0xFF, never 0x7F).
#[inline]
pub fn encode_mulaw(sample: i16) -> u8 {
    const BIAS: i32 = 33;
    const CLIP: i32 = 0x1FFF;

    let mut magnitude = sample as i32;
    let sign = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0x00
    };

    magnitude = (magnitude >> 2) + BIAS;
    if magnitude > CLIP {
        magnitude = CLIP;
    }

    let mut exponent: i32 = 7;
    let mut seg_mask = 0x1000;
    while magnitude & seg_mask == 0 && exponent > 0 {
        exponent -= 1;
        seg_mask >>= 1;
    }

    let mantissa = (magnitude >> (exponent + 1)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Decode a mu-law buffer to little-endian 16-bit PCM bytes
pub fn decode_mulaw_buf(mulaw: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(mulaw.len() * 2);
    for &byte in mulaw {
        pcm.extend_from_slice(&decode_mulaw(byte).to_le_bytes());
    }
    pcm
}

/// Encode little-endian 16-bit PCM bytes to a mu-law buffer
pub fn encode_mulaw_buf(pcm: &[u8]) -> Vec<u8> {
    pcm.chunks_exact(2)
        .map(|pair| encode_mulaw(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

/// Halve the sample rate by averaging adjacent pairs
///
/// No filtering; the aliasing this introduces is an accepted latency/quality
/// tradeoff for telephony audio. An odd trailing sample is dropped.
pub fn downsample_16k_to_8k(pcm: &[i16]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
        .collect()
}

/// Accumulates irregular synthesis chunks and emits fixed-size mu-law frames
///
/// Speech synthesis returns bytes in whatever chunk sizes the vendor streams;
/// the carrier expects fixed 20ms frames. The trailing partial frame is
/// emitted by [`MulawFramer::finish`].
#[derive(Debug)]
pub struct MulawFramer {
    frame_bytes: usize,
    buffer: Vec<u8>,
}

impl Default for MulawFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl MulawFramer {
    pub fn new() -> Self {
        Self::with_frame_size(FRAME_BYTES)
    }

    pub fn with_frame_size(frame_bytes: usize) -> Self {
        Self {
            frame_bytes,
            buffer: Vec::new(),
        }
    }

    /// Append synthesis bytes, returning any complete frames
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while self.buffer.len() >= self.frame_bytes {
            let rest = self.buffer.split_off(self.frame_bytes);
            frames.push(std::mem::replace(&mut self.buffer, rest));
        }
        frames
    }

    /// Drain the trailing partial frame, if any
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}
