use crate::config::EngineConfig;

/// Text/binary classification of blob content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryDetector {
    window: usize,
    ratio: f64,
}

impl Default for BinaryDetector {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl BinaryDetector {
    pub fn new(window: usize, ratio: f64) -> Self {
        BinaryDetector { window, ratio }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.binary_scan_window, config.binary_ratio)
    }

    /// Only the leading window is inspected; a NUL byte anywhere in it is decisive.
    pub fn is_binary(&self, data: &[u8]) -> bool {
        let sample = &data[..data.len().min(self.window)];
        if sample.is_empty() {
            return false;
        }
        if sample.contains(&0) {
            return true;
        }

        let unprintable = sample.iter().filter(|byte| !is_printable(**byte)).count();
        unprintable as f64 / sample.len() as f64 > self.ratio
    }
}

fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7e | 0x80..=0xff | b'\t' | b'\n' | 0x0b | 0x0c | b'\r' | 0x08 | 0x1b)
}
