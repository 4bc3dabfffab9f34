pub mod ctd;
pub mod hetio;
pub mod repodb;

use crate::error::{HetnetError, Result};
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use log::info;
use std::{fs, io, path};

/// Row accounting of one extraction pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub rows: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

impl ExtractReport {
    pub fn log(&self, what: &str) {
        info!("{}: {} rows read, {} skipped, {} duplicates", what, self.rows, self.skipped, self.duplicates);
    }
}

/// Open a source file, transparently decompressing `.gz` and `.bz2`.
pub fn open_input(input: &path::Path) -> Result<Box<dyn io::Read>> {
    if !input.exists() {
        return Err(HetnetError::NotFound {
            what: "source file",
            path: input.to_path_buf(),
        });
    }
    let file = io::BufReader::with_capacity(2_usize.pow(16), fs::File::open(input)?);
    match input.extension().and_then(|e| e.to_str()) {
        Some("gz") => Ok(Box::new(io::BufReader::new(MultiGzDecoder::new(file)))),
        Some("bz2") => Ok(Box::new(io::BufReader::new(MultiBzDecoder::new(file)))),
        _ => Ok(Box::new(file)),
    }
}

/// Split `"MESH:D001241"` into `("MESH", "D001241")`.
pub fn split_namespace(value: &str) -> Option<(&str, &str)> {
    value.split_once(':')
}

/// Split a `|`-delimited multi-value cell, dropping empty parts.
pub fn split_multi(value: &str) -> impl Iterator<Item = &str> {
    value.split('|').map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};

    #[test]
    fn gzip_input_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rows.csv.gz");
        let mut encoder = GzEncoder::new(fs::File::create(&input).unwrap(), Compression::default());
        encoder.write_all(b"a,b\n").unwrap();
        encoder.finish().unwrap();

        let mut content = String::new();
        open_input(&input).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "a,b\n");
    }

    #[test]
    fn bzip2_input_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("CTD_chemicals.csv.bz2");
        let mut encoder = bzip2::write::BzEncoder::new(fs::File::create(&input).unwrap(), bzip2::Compression::default());
        encoder.write_all(b"# Fields:\nAspirin,MESH:D001241\n").unwrap();
        encoder.finish().unwrap();

        let mut content = String::new();
        open_input(&input).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "# Fields:\nAspirin,MESH:D001241\n");
    }

    #[test]
    fn missing_input_is_not_found() {
        assert!(matches!(open_input(path::Path::new("/nonexistent.csv")), Err(HetnetError::NotFound { .. })));
    }

    #[test]
    fn multi_value_cells_split_on_pipe() {
        assert_eq!(split_multi("DB00945|DB01|").collect::<Vec<_>>(), vec!["DB00945", "DB01"]);
        assert_eq!(split_namespace("OMIM:601665"), Some(("OMIM", "601665")));
    }
}
