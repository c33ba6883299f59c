//! PCM capture to spectrum adapter
//!
//! Turns interleaved f32 samples arriving through a `ringbuf` SPSC queue
//! (filled by whatever capture callback the host owns) into the normalized
//! magnitude bins the level analyzer reads.
//!
//! Each read drains the queue, keeps the newest `fft_size` mono samples,
//! applies a Hann window and maps FFT magnitudes from -100 dB..-30 dB onto
//! 0.0-1.0, the same scale a browser analyser node reports.

use crate::collaborators::{SignalLost, SpectrumSource};
use ringbuf::traits::{Consumer, Observer};
use ringbuf::HeapCons;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default transform size; yields 128 bins
pub const DEFAULT_FFT_SIZE: usize = 256;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Samples pulled from the queue per pass, rounded to whole frames
const DRAIN_SAMPLES: usize = 4096;

/// [`SpectrumSource`] over a PCM ring buffer consumer
pub struct PcmSpectrumSource {
    consumer: HeapCons<f32>,
    channels: usize,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Newest `fft_size` mono samples
    history: VecDeque<f32>,
    drain: Vec<f32>,
    buffer: Vec<Complex32>,
}

impl PcmSpectrumSource {
    /// `channels` interleaved channels are averaged to mono
    pub fn new(consumer: HeapCons<f32>, channels: usize) -> Self {
        Self::with_fft_size(consumer, channels, DEFAULT_FFT_SIZE)
    }

    pub fn with_fft_size(consumer: HeapCons<f32>, channels: usize, fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let channels = channels.max(1);
        // At least one frame per pass, however wide the frames are
        let drain_len = (DRAIN_SAMPLES / channels).max(1) * channels;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window = (0..fft_size)
            .map(|i| {
                0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (fft_size - 1) as f32).cos()
            })
            .collect();

        Self {
            consumer,
            channels,
            fft_size,
            fft,
            window,
            history: std::iter::repeat(0.0).take(fft_size).collect(),
            drain: vec![0.0; drain_len],
            buffer: vec![Complex32::new(0.0, 0.0); fft_size],
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn drain_queue(&mut self) {
        loop {
            // The drain buffer holds whole frames only
            let frame_len = self.channels;
            let capacity = self.drain.len();
            let read = self.consumer.pop_slice(&mut self.drain[..]);
            if read == 0 {
                break;
            }
            for frame in self.drain[..read].chunks(frame_len) {
                let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                if self.history.len() == self.fft_size {
                    self.history.pop_front();
                }
                self.history.push_back(mono);
            }
            if read < capacity {
                break;
            }
        }
    }
}

impl SpectrumSource for PcmSpectrumSource {
    fn read_spectrum(&mut self, bins: &mut Vec<f32>) -> Result<(), SignalLost> {
        let producer_alive = self.consumer.write_is_held();
        self.drain_queue();
        if !producer_alive && self.consumer.is_empty() {
            return Err(SignalLost("capture producer dropped".to_string()));
        }

        for (i, (sample, w)) in self.history.iter().zip(self.window.iter()).enumerate() {
            self.buffer[i] = Complex32::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        bins.clear();
        bins.extend(self.buffer[..self.fft_size / 2].iter().map(|c| {
            let magnitude = c.norm() * scale;
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                MIN_DECIBELS
            };
            ((db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS)).clamp(0.0, 1.0)
        }));
        Ok(())
    }
}
