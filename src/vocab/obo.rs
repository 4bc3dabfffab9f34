use crate::error::{HetnetError, Result};
use crate::vocab::CrossReferenceVocabulary;
use async_once::AsyncOnce;
use lazy_static::lazy_static;
use log::{debug, info};
use reqwest::header;
use reqwest::redirect::Policy;
use std::collections::HashMap;
use std::io::BufRead;
use std::time::Duration;
use std::{fs, io, path};

lazy_static! {
    pub static ref REQWEST_CLIENT: AsyncOnce<reqwest::Client> = AsyncOnce::new(async {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("text/plain"));
        let result = reqwest::Client::builder()
            .redirect(Policy::limited(5))
            .timeout(Duration::from_secs(900))
            .default_headers(headers)
            .build();

        match result {
            Ok(request_client) => request_client,
            Err(e) => panic!("Could not create Reqwest Client: {}", e),
        }
    });
}

/// `xref:` values of every `[Term]` of an OBO ontology, keyed by term id.
#[derive(Clone, Debug, Default)]
pub struct OboOntology {
    xrefs: HashMap<String, Vec<String>>,
}

impl OboOntology {
    pub fn from_path(obo: &path::Path) -> Result<Self> {
        if !obo.exists() {
            return Err(HetnetError::NotFound {
                what: "OBO ontology",
                path: obo.to_path_buf(),
            });
        }
        Self::from_reader(io::BufReader::new(fs::File::open(obo)?))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut ontology = OboOntology::default();
        let mut in_term = false;
        let mut current: Option<String> = None;
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.starts_with('[') {
                in_term = line == "[Term]";
                current = None;
                continue;
            }
            if !in_term {
                continue;
            }
            if let Some(id) = line.strip_prefix("id:") {
                let id = id.trim().to_string();
                ontology.xrefs.entry(id.clone()).or_default();
                current = Some(id);
            } else if let (Some(xref), Some(id)) = (line.strip_prefix("xref:"), current.as_ref()) {
                // drop trailing description or qualifier block
                if let Some(value) = xref.split_whitespace().next() {
                    ontology.xrefs.entry(id.clone()).or_default().push(value.to_string());
                }
            }
        }
        info!("parsed {} ontology terms", ontology.xrefs.len());
        Ok(ontology)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.xrefs.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.xrefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xrefs.is_empty()
    }
}

impl CrossReferenceVocabulary for OboOntology {
    /// Xrefs of term `code` written as `<namespace>:<value>`, returned without the prefix.
    fn lookup(&self, code: &str, namespace: &str) -> Vec<String> {
        let Some(xrefs) = self.xrefs.get(code) else {
            debug!("term {} not in ontology", code);
            return vec![];
        };
        xrefs
            .iter()
            .filter_map(|x| x.split_once(':').filter(|(prefix, _)| *prefix == namespace).map(|(_, value)| value.to_string()))
            .collect()
    }
}

/// Return a local path for `location`, downloading it into `cache_dir` first when it is an http(s) URL.
pub async fn fetch(location: &str, cache_dir: &path::Path) -> Result<path::PathBuf> {
    if !(location.starts_with("http://") || location.starts_with("https://")) {
        return Ok(path::PathBuf::from(location));
    }
    let file_name = location.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or("ontology.obo");
    let dest = cache_dir.join(file_name);
    if dest.exists() {
        debug!("using cached {}", dest.display());
        return Ok(dest);
    }
    fs::create_dir_all(cache_dir)?;
    info!("downloading {}", location);
    let request_client = REQWEST_CLIENT.get().await;
    let response = request_client.get(location).send().await?.error_for_status()?;
    let body = response.bytes().await?;
    fs::write(&dest, &body)?;
    info!("saved {} bytes to {}", body.len(), dest.display());
    Ok(dest)
}

#[cfg(test)]
mod test {
    use super::*;

    const DOID: &str = "\
format-version: 1.2
ontology: doid

[Term]
id: DOID:14227
name: azoospermia
xref: MESH:D053713
xref: UMLS_CUI:C0004509
xref: ICD10CM:N46.0 {source=\"DO\"}

[Term]
id: DOID:0060001
name: headache disorder

[Typedef]
id: has_material_basis_in
xref: RO:0004001
";

    #[test]
    fn term_xrefs_are_looked_up_by_prefix() {
        let ontology = OboOntology::from_reader(DOID.as_bytes()).unwrap();
        assert_eq!(ontology.len(), 2);
        assert_eq!(ontology.lookup("DOID:14227", "UMLS_CUI"), vec!["C0004509"]);
        assert_eq!(ontology.lookup("DOID:14227", "MESH"), vec!["D053713"]);
        assert_eq!(ontology.lookup("DOID:14227", "ICD10CM"), vec!["N46.0"]);
        assert!(ontology.lookup("DOID:0060001", "MESH").is_empty());
        assert!(ontology.lookup("DOID:9999", "MESH").is_empty());
        assert!(!ontology.contains("has_material_basis_in"));
    }

    #[tokio::test]
    async fn local_location_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("doid.obo");
        let resolved = fetch(location.to_str().unwrap(), dir.path()).await.unwrap();
        assert_eq!(resolved, location);
    }
}
