//! SQLite data source

use std::path::Path;
use async_trait::async_trait;
use rusqlite::{Connection, types::ValueRef};
use tracing::{debug, info};

use assoc_core::{AssociationIndex, DataLoader, IndexBuilder};
use crate::config::{LoadConfig, NullConfig};
use crate::DataError;

/// SQLite source: one field per column of a table
#[derive(Clone)]
pub struct SqliteSource {
    config: LoadConfig,
    table: String,
    name: String,
}

impl SqliteSource {
    pub fn new(config: LoadConfig) -> Result<Self, DataError> {
        config.validate()?;
        let table = config.table.clone().unwrap_or_default();
        let name = format!("{}:{}", config.file_name(), table);
        Ok(Self { config, table, name })
    }

    /// Source over every column of `table`
    pub fn open_table<P: AsRef<Path>>(path: P, table: &str) -> Result<Self, DataError> {
        Self::new(LoadConfig::sqlite(path.as_ref(), table))
    }

    /// Read the table and build the index on the calling thread
    pub fn read_index(&self) -> Result<AssociationIndex, DataError> {
        let conn = Connection::open(&self.config.path)?;
        read_table(&conn, &self.table, &self.config)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column names of `table`, in declaration order
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, DataError> {
    let query = format!("PRAGMA table_info({})", quote_identifier(table));
    let mut stmt = conn.prepare(&query)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    if columns.is_empty() {
        return Err(DataError::Schema(format!("table '{table}' not found or has no columns")));
    }
    Ok(columns)
}

fn cell_text(value: ValueRef<'_>, nulls: &NullConfig) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            nulls.normalize(&text).map(str::to_string)
        }
    }
}

pub(crate) fn read_table(conn: &Connection, table: &str, config: &LoadConfig) -> Result<AssociationIndex, DataError> {
    let columns = table_columns(conn, table)?;
    if let Some(missing) = config
        .selected_fields
        .iter()
        .find(|field| !columns.contains(field))
    {
        return Err(DataError::Schema(format!("field '{missing}' not found in table '{table}'")));
    }

    let kept: Vec<&String> = columns.iter().filter(|c| config.includes_field(c)).collect();
    let mut builder = IndexBuilder::with_fields(kept.iter().map(|c| c.as_str()));

    let query = format!(
        "SELECT {} FROM {}",
        kept.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", "),
        quote_identifier(table)
    );
    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query([])?;

    let mut cells: Vec<Option<String>> = Vec::with_capacity(kept.len());
    while let Some(row) = rows.next()? {
        cells.clear();
        for idx in 0..kept.len() {
            cells.push(cell_text(row.get_ref(idx)?, &config.null_config));
        }
        builder.push_row(&cells)?;
    }

    debug!(table, fields = kept.len(), records = builder.record_count(), "read SQLite table");
    Ok(builder.build())
}

#[async_trait]
impl DataLoader for SqliteSource {
    async fn load(&self) -> anyhow::Result<AssociationIndex> {
        let source = self.clone();
        let index = tokio::task::spawn_blocking(move || source.read_index())
            .await
            .map_err(DataError::from)??;

        info!(
            source = %self.name,
            fields = index.field_count(),
            records = index.record_count(),
            "loaded SQLite source"
        );
        Ok(index)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
