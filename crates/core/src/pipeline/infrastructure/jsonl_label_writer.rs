use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::pipeline::label_sink::LabelSink;
use crate::shared::resolution::FrameResolution;

/// Writes one JSON object per identity label.
pub struct JsonlLabelWriter<W: Write + Send> {
    output: BufWriter<W>,
}

impl JsonlLabelWriter<File> {
    pub fn create(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::create(path)
            .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> JsonlLabelWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output: BufWriter::new(output),
        }
    }

    pub fn into_inner(self) -> Result<W, Box<dyn std::error::Error>> {
        self.output.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write + Send> LabelSink for JsonlLabelWriter<W> {
    fn write(&mut self, resolution: &FrameResolution) -> Result<(), Box<dyn std::error::Error>> {
        for label in &resolution.labels {
            serde_json::to_writer(&mut self.output, label)?;
            self.output.write_all(b"\n")?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.output.flush()?;
        Ok(())
    }
}
