//! CSV import of the three source tables.

pub(crate) mod normalizer;
mod parser;

use crate::allocation::SourceTables;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTable {
    Constituencies,
    Concentration,
    CouncilTransactions,
}

impl SourceTable {
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Constituencies => "constituencies.csv",
            Self::Concentration => "concentration.csv",
            Self::CouncilTransactions => "council_transactions.csv",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Constituencies => "constituency reference list",
            Self::Concentration => "concentration proxy table",
            Self::CouncilTransactions => "council transaction table",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceImportError {
    #[error("failed to read {table} from {}: {source}", .path.display())]
    Io {
        table: SourceTable,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid CSV data in {table}: {source}")]
    Csv {
        table: SourceTable,
        #[source]
        source: csv::Error,
    },
}

pub struct DatasetImporter;

impl DatasetImporter {
    /// Reads the tables from their conventional file names under `dir`.
    /// The concentration table may be absent, in which case every council
    /// falls back to population weighting.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<SourceTables, SourceImportError> {
        let dir = dir.as_ref();
        let constituencies = open(dir, SourceTable::Constituencies)?;
        let transactions = open(dir, SourceTable::CouncilTransactions)?;

        let concentration_path = dir.join(SourceTable::Concentration.file_name());
        let tables = if concentration_path.exists() {
            let concentration = open(dir, SourceTable::Concentration)?;
            Self::from_readers(constituencies, concentration, transactions)?
        } else {
            warn!(
                path = %concentration_path.display(),
                "concentration table not found; allocating by population only"
            );
            Self::from_readers(constituencies, io::empty(), transactions)?
        };

        debug!(dir = %dir.display(), "source tables loaded");
        Ok(tables)
    }

    pub fn from_readers<A: Read, B: Read, C: Read>(
        constituencies: A,
        concentration: B,
        transactions: C,
    ) -> Result<SourceTables, SourceImportError> {
        let constituencies = parser::parse_constituencies(constituencies)
            .map_err(|source| csv_error(SourceTable::Constituencies, source))?;
        let proxies = parser::parse_proxies(concentration)
            .map_err(|source| csv_error(SourceTable::Concentration, source))?;
        let transactions = parser::parse_transactions(transactions)
            .map_err(|source| csv_error(SourceTable::CouncilTransactions, source))?;

        debug!(
            constituencies = constituencies.len(),
            proxies = proxies.len(),
            councils = transactions.len(),
            "source rows parsed"
        );

        Ok(SourceTables {
            constituencies,
            proxies,
            transactions,
        })
    }
}

fn open(dir: &Path, table: SourceTable) -> Result<File, SourceImportError> {
    let path = dir.join(table.file_name());
    File::open(&path).map_err(|source| SourceImportError::Io {
        table,
        path,
        source,
    })
}

fn csv_error(table: SourceTable, source: csv::Error) -> SourceImportError {
    SourceImportError::Csv { table, source }
}
