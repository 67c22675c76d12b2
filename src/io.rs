//! Tensor-container I/O for stage artifacts.
//!
//! Every artifact the pipeline reads or writes (raw recordings, filtered
//! copies, epochs, averaged waveforms, ICA decompositions) lives in the same
//! minimal safetensors-style container: an 8-byte little-endian header
//! length, a JSON header mapping tensor names to dtype/shape/offsets, then
//! the raw tensor bytes. No dependency on the `safetensors` crate, we only
//! need bytes ↔ ndarray.

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, Array3};
use std::collections::HashMap;
use std::path::Path;

// ── Reader ───────────────────────────────────────────────────────────────────

/// Parsed container: JSON header entries plus the raw data block.
pub struct StReader {
    header: HashMap<String, serde_json::Value>,
    bytes: Vec<u8>,
    data_start: usize,
}

impl StReader {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        if bytes.len() < 8 {
            bail!("container too small: {}", path.display());
        }
        let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
        if bytes.len() < 8 + n {
            bail!("truncated header in {}", path.display());
        }
        let header: HashMap<String, serde_json::Value> =
            serde_json::from_slice(&bytes[8..8 + n])
                .with_context(|| format!("parsing header of {}", path.display()))?;
        Ok(Self { header, bytes, data_start: 8 + n })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<(&serde_json::Value, &[u8])> {
        let entry = self
            .header
            .get(name)
            .with_context(|| format!("missing tensor {name:?}"))?;
        let offsets = entry["data_offsets"]
            .as_array()
            .with_context(|| format!("tensor {name:?} has no data_offsets"))?;
        let s = offsets[0].as_u64().unwrap_or(0) as usize;
        let e = offsets[1].as_u64().unwrap_or(0) as usize;
        if self.data_start + e > self.bytes.len() || s > e {
            bail!("tensor {name:?} offsets out of range");
        }
        Ok((entry, &self.bytes[self.data_start + s..self.data_start + e]))
    }

    pub fn shape(&self, name: &str) -> Result<Vec<usize>> {
        let (entry, _) = self.entry(name)?;
        Ok(entry["shape"]
            .as_array()
            .with_context(|| format!("tensor {name:?} has no shape"))?
            .iter()
            .map(|v| v.as_u64().unwrap_or(0) as usize)
            .collect())
    }

    pub fn f32_vec(&self, name: &str) -> Result<Vec<f32>> {
        let (_, raw) = self.entry(name)?;
        Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    pub fn i32_vec(&self, name: &str) -> Result<Vec<i32>> {
        let (_, raw) = self.entry(name)?;
        Ok(raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Scalar convenience: first element of a 1-element f32 tensor.
    pub fn f32_scalar(&self, name: &str) -> Result<f32> {
        let v = self.f32_vec(name)?;
        v.first().copied().with_context(|| format!("tensor {name:?} is empty"))
    }

    pub fn f32_arr1(&self, name: &str) -> Result<Array1<f32>> {
        let shape = self.shape(name)?;
        if shape.len() != 1 {
            bail!("tensor {name:?}: expected 1-D, got {shape:?}");
        }
        Ok(Array1::from_vec(self.f32_vec(name)?))
    }

    pub fn f32_arr2(&self, name: &str) -> Result<Array2<f32>> {
        let shape = self.shape(name)?;
        if shape.len() != 2 {
            bail!("tensor {name:?}: expected 2-D, got {shape:?}");
        }
        Array2::from_shape_vec((shape[0], shape[1]), self.f32_vec(name)?)
            .with_context(|| format!("tensor {name:?} shape/data mismatch"))
    }

    pub fn f32_arr3(&self, name: &str) -> Result<Array3<f32>> {
        let shape = self.shape(name)?;
        if shape.len() != 3 {
            bail!("tensor {name:?}: expected 3-D, got {shape:?}");
        }
        Array3::from_shape_vec((shape[0], shape[1], shape[2]), self.f32_vec(name)?)
            .with_context(|| format!("tensor {name:?} shape/data mismatch"))
    }

    /// Newline-joined UTF-8 string list stored as a byte tensor.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        let (_, raw) = self.entry(name)?;
        let s = std::str::from_utf8(raw)
            .with_context(|| format!("tensor {name:?} is not UTF-8"))?;
        Ok(s.split('\n').filter(|l| !l.is_empty()).map(String::from).collect())
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Container writer handling F32, I32 and raw-byte (U8) tensors.
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl Default for StWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f32_arr1(&mut self, name: &str, arr: &Array1<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, &[arr.len()]);
    }

    pub fn add_f32_arr2(&mut self, name: &str, arr: &Array2<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_f32_arr3(&mut self, name: &str, arr: &Array3<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        let d = arr.dim();
        self.add_f32(name, &data, &[d.0, d.1, d.2]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Store a string list as a newline-joined UTF-8 byte tensor.
    pub fn add_string_list(&mut self, name: &str, items: &[String]) {
        let joined = items.join("\n");
        let bytes = joined.into_bytes();
        let n = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![n]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}
