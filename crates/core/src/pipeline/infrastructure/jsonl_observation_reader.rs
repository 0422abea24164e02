use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pipeline::observation_source::ObservationSource;
use crate::shared::detection::StreamEvent;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read line {line}: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads stream events from JSON Lines, one event per line. Blank lines
/// are ignored.
pub struct JsonlObservationReader {
    input: Box<dyn BufRead + Send>,
}

impl JsonlObservationReader {
    pub fn open(path: &Path) -> Result<Self, ReadError> {
        let file = File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader(input: impl BufRead + Send + 'static) -> Self {
        Self {
            input: Box::new(input),
        }
    }
}

impl ObservationSource for JsonlObservationReader {
    fn events(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<StreamEvent, Box<dyn std::error::Error>>> + '_> {
        Box::new(
            (&mut self.input)
                .lines()
                .enumerate()
                .filter_map(|(index, line)| parse_line(index + 1, line)),
        )
    }
}

fn parse_line(
    line: usize,
    text: std::io::Result<String>,
) -> Option<Result<StreamEvent, Box<dyn std::error::Error>>> {
    let text = match text {
        Ok(text) => text,
        Err(source) => return Some(Err(ReadError::Io { line, source }.into())),
    };
    if text.trim().is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(&text)
            .map_err(|source| ReadError::Parse { line, source }.into()),
    )
}
