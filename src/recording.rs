//! Continuous multi-channel recording.
//!
//! [`Recording`] is the unit every continuous stage operates on: a `[C, T]`
//! f32 matrix in volts plus sampling rate, channel names and the marked bad
//! set. Stages mutate it in place and hand ownership forward through the
//! stage store; it is never shared across participants.

use crate::error::{PipelineError, Result};
use crate::events::{Event, EventStream};
use ndarray::{s, Array2};

#[derive(Debug, Clone)]
pub struct Recording {
    /// Signal matrix `[C, T]` in volts.
    pub data: Array2<f32>,
    /// Sampling rate in Hz.
    pub sfreq: f32,
    /// Channel names, row order matching `data`.
    pub ch_names: Vec<String>,
    /// Channel names currently marked bad.
    pub bads: Vec<String>,
}

impl Recording {
    pub fn new(data: Array2<f32>, sfreq: f32, ch_names: Vec<String>) -> Result<Self> {
        if data.nrows() != ch_names.len() {
            return Err(PipelineError::Shape(format!(
                "{} data rows but {} channel names",
                data.nrows(),
                ch_names.len()
            )));
        }
        Ok(Self { data, sfreq, ch_names, bads: Vec::new() })
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Recording duration in seconds.
    pub fn duration(&self) -> f32 {
        self.n_samples() as f32 / self.sfreq
    }

    pub fn channel_index(&self, name: &str) -> Result<usize> {
        self.ch_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PipelineError::UnknownChannel(name.to_string()))
    }

    /// Remove one channel entirely (used for the silent reference
    /// electrode before any processing).
    pub fn drop_channel(&mut self, name: &str) -> Result<()> {
        let idx = self.channel_index(name)?;
        let (n_ch, n_t) = self.data.dim();
        let mut out = Array2::<f32>::zeros((n_ch - 1, n_t));
        let mut row = 0;
        for ch in 0..n_ch {
            if ch == idx {
                continue;
            }
            out.row_mut(row).assign(&self.data.row(ch));
            row += 1;
        }
        self.data = out;
        self.ch_names.remove(idx);
        self.bads.retain(|b| b != name);
        Ok(())
    }

    /// Extract the event stream from the dedicated stimulus channel: a
    /// nonzero sample whose predecessor is zero (or stream start) is an
    /// event onset carrying that integer code.
    pub fn find_events(&self, stim_channel: &str) -> Result<EventStream> {
        let idx = self.channel_index(stim_channel)?;
        let stim = self.data.row(idx);
        let mut events = Vec::new();
        let mut prev = 0.0_f32;
        for (t, &v) in stim.iter().enumerate() {
            let code = v.round() as i32;
            if code != 0 && prev.round() as i32 == 0 {
                events.push(Event { sample: t, code });
            }
            prev = v;
        }
        Ok(EventStream::new(events))
    }

    /// Truncate the recording to `t_max` seconds (keeps `[0, t_max]`).
    pub fn crop(&mut self, t_max: f32) {
        let n_keep = ((t_max * self.sfreq) as usize + 1).min(self.n_samples());
        self.data = self.data.slice(s![.., ..n_keep]).to_owned();
    }

    /// Crop trailing silence: keep `margin` seconds after the final event
    /// on the stimulus channel, leaving the recording untouched when it
    /// already ends sooner.
    pub fn crop_after_last_event(&mut self, stim_channel: &str, margin: f32) -> Result<()> {
        let events = self.find_events(stim_channel)?;
        let Some(last) = events.iter().last() else {
            return Ok(());
        };
        let final_event_s = last.sample as f32 / self.sfreq;
        if self.duration() > final_event_s + margin {
            self.crop(final_event_s + margin);
        }
        Ok(())
    }
}
