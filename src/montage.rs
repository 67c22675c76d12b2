//! Electrode layout (montage).
//!
//! Parses the shared `.sfp` layout file: one `name x y z` line per
//! electrode, positions in metres. The montage is loaded once per run and
//! shared read-only across participants; it drives bad-channel
//! interpolation weights.

use anyhow::{bail, Context, Result};
use ndarray::Array1;
use std::collections::HashMap;
use std::path::Path;

/// Shared channel layout: electrode name → 3-D position.
#[derive(Debug, Clone)]
pub struct Montage {
    positions: HashMap<String, [f32; 3]>,
}

impl Montage {
    /// Parse an `.sfp` file. Lines starting with `#` and fiducial rows
    /// (names starting with `Fid`) are skipped.
    pub fn from_sfp(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading montage {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut positions = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                bail!("montage line {}: expected 'name x y z', got {line:?}", lineno + 1);
            }
            let name = fields[0];
            if name.starts_with("Fid") {
                continue;
            }
            let mut pos = [0.0_f32; 3];
            for (i, f) in fields[1..].iter().enumerate() {
                pos[i] = f
                    .parse::<f32>()
                    .with_context(|| format!("montage line {}: bad coordinate {f:?}", lineno + 1))?;
            }
            positions.insert(name.to_string(), pos);
        }
        if positions.is_empty() {
            bail!("montage contains no electrode positions");
        }
        Ok(Self { positions })
    }

    pub fn position(&self, ch_name: &str) -> Option<[f32; 3]> {
        self.positions.get(ch_name).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Inverse-distance weights from `target` onto `sources`, normalized to
    /// sum to one. Used to estimate a bad channel from its spatial
    /// neighbors. Channels without a montage position get zero weight.
    pub fn interpolation_weights(&self, target: &str, sources: &[String]) -> Option<Array1<f32>> {
        let tpos = self.position(target)?;
        let mut w = Array1::<f32>::zeros(sources.len());
        for (i, src) in sources.iter().enumerate() {
            if let Some(spos) = self.position(src) {
                let d2 = (tpos[0] - spos[0]).powi(2)
                    + (tpos[1] - spos[1]).powi(2)
                    + (tpos[2] - spos[2]).powi(2);
                // Coincident electrodes would give an infinite weight.
                w[i] = 1.0 / d2.max(1e-12).sqrt();
            }
        }
        let total: f32 = w.sum();
        if total <= 0.0 {
            return None;
        }
        w.mapv_inplace(|v| v / total);
        Some(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SFP: &str = "\
FidNz 0.0 0.10 0.0
E1 0.0 0.0 0.10
E2 0.01 0.0 0.10
E3 0.10 0.0 0.0
";

    #[test]
    fn parses_and_skips_fiducials() {
        let m = Montage::parse(SFP).unwrap();
        assert_eq!(m.len(), 3);
        assert!(m.position("FidNz").is_none());
        assert_eq!(m.position("E1").unwrap(), [0.0, 0.0, 0.10]);
    }

    #[test]
    fn weights_favor_nearby_channels() {
        let m = Montage::parse(SFP).unwrap();
        let srcs = vec!["E2".to_string(), "E3".to_string()];
        let w = m.interpolation_weights("E1", &srcs).unwrap();
        approx::assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-6);
        assert!(w[0] > w[1], "E2 is closer to E1 than E3");
    }

    #[test]
    fn malformed_line_rejected() {
        assert!(Montage::parse("E1 0.0 0.0").is_err());
    }
}
