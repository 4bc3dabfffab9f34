use crate::error::{HetnetError, Result};
use crate::vocab::CrossReferenceVocabulary;
use crate::PROGRESS_INTERVAL;
use log::info;
use std::collections::{HashMap, HashSet};
use std::{fs, io, path};

pub const MRCONSO_COLUMNS: [&str; 19] = [
    "CUI", "LAT", "TS", "LUI", "STT", "SUI", "ISPREF", "AUI", "SAUI", "SCUI", "SDUI", "SAB", "TTY", "CODE", "STR", "SRL", "SUPPRESS", "CVF",
    "MISC",
];

const CUI: usize = 0;
const LAT: usize = 1;
const SAB: usize = 11;
const CODE: usize = 13;

/// English `MRCONSO.RRF` concepts indexed by `(SAB, CODE)`.
#[derive(Clone, Debug, Default)]
pub struct UmlsIndex {
    codes: HashMap<(String, String), Vec<String>>,
}

impl UmlsIndex {
    /// Load the rows whose source vocabulary is in `sources`; every vocabulary when `sources` is empty.
    pub fn from_path(mrconso: &path::Path, sources: &[String]) -> Result<Self> {
        if !mrconso.exists() {
            return Err(HetnetError::NotFound {
                what: "UMLS MRCONSO file",
                path: mrconso.to_path_buf(),
            });
        }
        info!("loading UMLS concepts from {}", mrconso.display());
        Self::from_reader(io::BufReader::new(fs::File::open(mrconso)?), sources)
    }

    pub fn from_reader<R: io::Read>(reader: R, sources: &[String]) -> Result<Self> {
        let keep: HashSet<&str> = sources.iter().map(String::as_str).collect();
        let mut rdr = csv::ReaderBuilder::new().has_headers(false).delimiter(b'|').quoting(false).flexible(true).from_reader(reader);

        let mut index = UmlsIndex::default();
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result?;
            if idx > 0 && idx % PROGRESS_INTERVAL == 0 {
                info!("read {} UMLS rows", idx);
            }
            let (Some(cui), Some(lat), Some(sab), Some(code)) = (record.get(CUI), record.get(LAT), record.get(SAB), record.get(CODE)) else {
                continue;
            };
            if lat != "ENG" || (!keep.is_empty() && !keep.contains(sab)) {
                continue;
            }
            if seen.insert((sab.to_string(), code.to_string(), cui.to_string())) {
                index.codes.entry((sab.to_string(), code.to_string())).or_default().push(cui.to_string());
            }
        }
        info!("indexed {} UMLS codes", index.codes.len());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl CrossReferenceVocabulary for UmlsIndex {
    fn lookup(&self, code: &str, namespace: &str) -> Vec<String> {
        self.codes.get(&(namespace.to_string(), code.to_string())).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MRCONSO: &str = "\
C0004057|ENG|P|L0004057|PF|S0011009|Y|A0021145||M0001873|D001241|MSH|MH|D001241|Aspirin|0|N|256|
C0004057|FRE|P|L0162037|PF|S0238467|Y|A0360123||M0001873|D001241|MSH|MH|D001241|Aspirine|3|N||
C0004057|ENG|P|L0004057|VO|S0011009|Y|A26662845||DB00945||DRUGBANK|IN|DB00945|Aspirin|0|N|256|
C0733397|ENG|S|L1297813|PF|S1551396|N|A26662846||DB00945||DRUGBANK|SY|DB00945|Acetylsalicylic acid|0|N|256|
C0004057|ENG|S|L0004057|PF|S0011009|Y|A8345234|||D001241|RXNORM|IN|1191|aspirin|0|N|4352|
";

    #[test]
    fn english_rows_of_kept_sources_are_indexed() {
        let sources = vec!["MSH".to_string(), "DRUGBANK".to_string()];
        let index = UmlsIndex::from_reader(MRCONSO.as_bytes(), &sources).unwrap();
        assert_eq!(index.lookup("D001241", "MSH"), vec!["C0004057"]);
        assert_eq!(index.lookup("DB00945", "DRUGBANK"), vec!["C0004057", "C0733397"]);
        assert!(index.lookup("1191", "RXNORM").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn empty_source_filter_keeps_every_vocabulary() {
        let index = UmlsIndex::from_reader(MRCONSO.as_bytes(), &[]).unwrap();
        assert_eq!(index.lookup("1191", "RXNORM"), vec!["C0004057"]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = UmlsIndex::from_path(path::Path::new("/nonexistent/MRCONSO.RRF"), &[]).unwrap_err();
        assert!(matches!(err, HetnetError::NotFound { .. }));
    }
}
