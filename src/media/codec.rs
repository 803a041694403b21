//! G.711 μ-law (PCMU) für den ausgehenden und den eingehenden Track
//!
//! Opus ist ohne zusätzliche native Abhängigkeiten nicht verfügbar,
//! PCMU wird von jeder WebRTC-Gegenstelle unterstützt.

use super::audio::SAMPLE_RATE;

/// Sample Rate von PCMU
pub const PCMU_SAMPLE_RATE: u32 = 8000;

/// μ-law kodierte Stille
pub const PCMU_SILENCE: u8 = 0xFF;

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;
const DECIMATION: usize = (SAMPLE_RATE / PCMU_SAMPLE_RATE) as usize;

/// Konvertiert ein lineares 16-bit Sample nach μ-law
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };

    pcm = pcm.min(CLIP) + BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && pcm & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = (pcm >> (exponent + 3)) & 0x0F;
    !(sign | (exponent << 4) | mantissa) as u8
}

/// Konvertiert ein μ-law Sample zurück nach linear 16-bit
pub fn ulaw_to_linear(code: u8) -> i16 {
    let code = !code as i32;
    let exponent = (code >> 4) & 0x07;
    let mantissa = code & 0x0F;
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;

    if code & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Dekodiert ein 8kHz PCMU Payload zu 48kHz Samples (f32, -1.0..1.0)
pub fn decode_pcmu_frame(payload: &[u8]) -> Vec<f32> {
    let mut samples = Vec::with_capacity(payload.len() * DECIMATION);
    for code in payload {
        let sample = ulaw_to_linear(*code) as f32 / i16::MAX as f32;
        samples.extend(std::iter::repeat(sample).take(DECIMATION));
    }
    samples
}

/// Kodiert einen 48kHz Frame (f32, -1.0..1.0) als 8kHz PCMU
pub fn encode_pcmu_frame(frame: &[f32]) -> Vec<u8> {
    frame
        .chunks(DECIMATION)
        .map(|chunk| {
            let avg = chunk.iter().sum::<f32>() / chunk.len() as f32;
            let pcm = (avg.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            linear_to_ulaw(pcm)
        })
        .collect()
}

/// Stille-Frame passender Länge für `samples` Eingangs-Samples
pub fn silence_frame(samples: usize) -> Vec<u8> {
    vec![PCMU_SILENCE; samples.div_ceil(DECIMATION)]
}
