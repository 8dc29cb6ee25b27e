//! YM2612 DAC capture: accumulates the raw 8-bit DAC sample timeline played
//! back through register 0x2A and partitions it into blocks of audible
//! content bounded by long runs of silence.

/// A contiguous, non-silent run of captured DAC samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DacSampleBlock {
    /// Index into the capture timeline where this block's audible content
    /// starts — used later to place the synthesized ADPCM-B playback
    /// commands at the equivalent point in the rewritten command stream.
    pub timestamp: u32,
    /// Raw unsigned 8-bit PCM, padded to a 512-byte multiple with 0x80.
    pub data: Vec<u8>,
}

/// Minimum run length (in identical consecutive samples) that counts as
/// silence and splits the timeline into separate blocks.
const SILENCE_RUN: usize = 512;
const BLOCK_ALIGNMENT: usize = 0x200;
const PADDING_BYTE: u8 = 0x80;

/// Tracks the data bank (source PCM a game streams from) and the output
/// timeline (what was actually audible, sample by sample).
#[derive(Debug, Clone, Default)]
pub struct Ym2612DacCapture {
    data_bank: Vec<u8>,
    timeline: Vec<u8>,
    cursor: usize,
}

impl Ym2612DacCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend_data_bank(&mut self, data: &[u8]) {
        self.data_bank.extend_from_slice(data);
    }

    /// The full captured sample timeline, for debug export.
    pub fn timeline(&self) -> &[u8] {
        &self.timeline
    }

    pub fn seek(&mut self, index: usize) {
        self.cursor = index;
    }

    /// Overwrite the most recently appended sample — used for direct DAC
    /// register writes (OPN address 0x2A) rather than data-bank playback.
    pub fn set_output(&mut self, data: u8) {
        if let Some(last) = self.timeline.last_mut() {
            *last = data;
        } else {
            self.timeline.push(data);
        }
    }

    /// Sustain the last sample (or silence, if nothing has played yet) for
    /// `count` additional timeline positions.
    pub fn delay(&mut self, count: u32) {
        let sample = self.timeline.last().copied().unwrap_or(0);
        self.timeline
            .extend(std::iter::repeat_n(sample, count as usize));
    }

    /// Read one byte from the data bank at the cursor, advance it, and
    /// append that single byte to the timeline. The remaining `delay - 1`
    /// sample-ticks implied by the DAC-write-with-delay opcode are emitted
    /// by the caller directly as an ordinary delay command and are *not*
    /// reflected in this timeline.
    pub fn output_data_bank_sample(&mut self) -> u8 {
        let sample = self.data_bank[self.cursor];
        self.cursor += 1;
        self.timeline.push(sample);
        sample
    }

    /// Find the first index range at or after `start` where the same byte
    /// value repeats for at least [`SILENCE_RUN`] consecutive samples.
    /// Returns `(run_start, run_end)`, where `run_end` is the index of the
    /// first sample that differs from the run (or the timeline length if
    /// the run extends to the end).
    fn scan_silence(&self, start: usize) -> Option<(usize, usize)> {
        let mut consecutive = 0usize;
        let mut prev = 0u8;
        let mut run_start = start;
        let mut index = start;

        while index < self.timeline.len() {
            let sample = self.timeline[index];
            if sample == prev {
                consecutive += 1;
            } else {
                if consecutive >= SILENCE_RUN {
                    return Some((run_start, index));
                }
                consecutive = 0;
                run_start = index;
            }
            prev = sample;
            index += 1;
        }

        None
    }

    fn pad(data: &mut Vec<u8>) {
        let remainder = data.len() % BLOCK_ALIGNMENT;
        if remainder > 0 {
            data.extend(std::iter::repeat_n(PADDING_BYTE, BLOCK_ALIGNMENT - remainder));
        }
    }

    /// Split the captured timeline into blocks of audible content, each
    /// starting where the previous silence run ended. Unlike the reference
    /// implementation this also closes out the final block against the end
    /// of the timeline instead of discarding any trailing audio that isn't
    /// itself followed by a silence run.
    pub fn partition_blocks(&self) -> Vec<DacSampleBlock> {
        let mut index = 0usize;
        let mut blocks = Vec::new();
        let mut current_start: Option<usize> = None;

        loop {
            match self.scan_silence(index) {
                Some((silence_start, silence_end)) => {
                    if let Some(start) = current_start {
                        let mut data = self.timeline[start..silence_start].to_vec();
                        Self::pad(&mut data);
                        blocks.push(DacSampleBlock {
                            timestamp: start as u32,
                            data,
                        });
                    }
                    current_start = Some(silence_end);
                    index = silence_end;
                }
                None => {
                    if let Some(start) = current_start {
                        if start < self.timeline.len() {
                            let mut data = self.timeline[start..].to_vec();
                            Self::pad(&mut data);
                            blocks.push(DacSampleBlock {
                                timestamp: start as u32,
                                data,
                            });
                        }
                    }
                    break;
                }
            }
        }

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_trailing_block_with_no_closing_silence() {
        let pattern: Vec<u8> = (0..2048).map(|i| if i % 2 == 0 { 0x40 } else { 0xc0 }).collect();
        let mut dac = Ym2612DacCapture::new();
        dac.delay(2048); // leading silence at the implicit default sample (0)
        dac.extend_data_bank(&pattern);
        for _ in 0..2048 {
            dac.output_data_bank_sample();
        }

        let blocks = dac.partition_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].timestamp, 2048);
        assert_eq!(&blocks[0].data[..2048], pattern.as_slice());
        assert_eq!(blocks[0].data.len() % 0x200, 0);
    }

    #[test]
    fn silence_between_two_tones_splits_into_two_blocks() {
        // Alternating bytes stand in for "tone" so no run inside a block is
        // mistaken for silence by the same ">=512 identical samples" rule
        // that's used to detect true silence.
        let tone: Vec<u8> = (0..600).map(|i| if i % 2 == 0 { 0x40 } else { 0x41 }).collect();
        let mut dac = Ym2612DacCapture::new();
        dac.extend_data_bank(&tone);
        dac.extend_data_bank(&[0x80; 520]);
        dac.extend_data_bank(&tone);
        for _ in 0..(600 + 520 + 600) {
            dac.output_data_bank_sample();
        }

        let blocks = dac.partition_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].timestamp, 0);
        assert_eq!(blocks[1].timestamp, 1120);
    }

    #[test]
    fn pure_silence_produces_no_blocks() {
        let mut dac = Ym2612DacCapture::new();
        dac.delay(4096);
        assert!(dac.partition_blocks().is_empty());
    }
}
