use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::load::{Load, LoadId};
use crate::errors::DomainError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read load catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse load catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// Read-only set of loads the desk can offer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadCatalog {
    loads: Vec<Load>,
}

impl LoadCatalog {
    pub fn new(loads: Vec<Load>) -> Result<Self, DomainError> {
        let mut seen = HashSet::with_capacity(loads.len());
        for load in &loads {
            load.validate()?;
            if !seen.insert(load.load_id.clone()) {
                return Err(DomainError::InvalidInput(format!(
                    "duplicate load id `{}` in catalog",
                    load.load_id
                )));
            }
        }
        Ok(Self { loads })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let loads: Vec<Load> = serde_json::from_str(raw)?;
        Ok(Self::new(loads)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }

    pub fn find(&self, load_id: &LoadId) -> Option<&Load> {
        self.loads.iter().find(|load| &load.load_id == load_id)
    }

    pub fn require(&self, load_id: &LoadId) -> Result<&Load, DomainError> {
        self.find(load_id)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown load `{load_id}`")))
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn iter(&self) -> impl Iterator<Item = &Load> {
        self.loads.iter()
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{CatalogError, LoadCatalog};
    use crate::domain::load::LoadId;

    const TWO_LOADS: &str = r#"[
        {
            "load_id": "LD001",
            "origin": "Los Angeles, CA",
            "destination": "Houston, TX",
            "pickup_datetime": "2025-11-10T08:00:00Z",
            "delivery_datetime": "2025-11-12T17:00:00Z",
            "equipment_type": "dry_van",
            "loadboard_rate": "2500",
            "weight": 42000,
            "commodity_type": "Consumer electronics",
            "miles": 1547
        },
        {
            "load_id": "LD002",
            "origin": "Chicago, IL",
            "destination": "Atlanta, GA",
            "pickup_datetime": "2025-11-11T06:00:00Z",
            "delivery_datetime": "2025-11-12T20:00:00Z",
            "equipment_type": "reefer",
            "loadboard_rate": "2200",
            "weight": 38000,
            "commodity_type": "Frozen foods",
            "notes": "Keep at -10F",
            "miles": 716
        }
    ]"#;

    #[test]
    fn parses_catalog_and_finds_loads() {
        let catalog = LoadCatalog::from_json_str(TWO_LOADS).expect("catalog");
        assert_eq!(catalog.len(), 2);
        let load = catalog.find(&LoadId("LD002".to_string())).expect("LD002");
        assert_eq!(load.notes, "Keep at -10F");
        assert!(catalog.require(&LoadId("LD999".to_string())).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let duplicated = TWO_LOADS.replace("LD002", "LD001");
        let error = LoadCatalog::from_json_str(&duplicated).expect_err("duplicate ids");
        assert!(matches!(error, CatalogError::Invalid(_)));
        assert!(error.to_string().contains("duplicate load id"));
    }

    #[test]
    fn reads_catalog_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(TWO_LOADS.as_bytes()).expect("write");

        let catalog = LoadCatalog::from_path(file.path()).expect("catalog");
        assert_eq!(catalog.iter().count(), 2);

        let missing = LoadCatalog::from_path(&file.path().with_extension("missing"));
        assert!(matches!(missing, Err(CatalogError::Read { .. })));
    }
}
