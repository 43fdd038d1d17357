//! Inspection commands.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use strata_storage::KvStore;
use strata_table::{Db, Record};

use crate::formatter::{format_result, value_to_json, OutputFormat, ResultSet};

/// A command run against an open database.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tables with their prefixes and columns
    Tables,
    /// Show the schema of a table
    Schema {
        /// Table name
        table: String,
    },
    /// Print the rows of a table in primary-key order
    Dump {
        /// Table name
        table: String,
        /// Stop after this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show page, entry and free-list statistics
    Stats,
}

impl Command {
    /// Executes the command and returns the formatted output.
    pub fn execute<K: HasStats>(&self, db: &mut Db<K>, format: OutputFormat) -> Result<String> {
        match self {
            Command::Tables => Ok(format_result(&list_tables(db)?, format)),
            Command::Schema { table } => describe(db, table, format),
            Command::Dump { table, limit } => Ok(format_result(&dump(db, table, *limit)?, format)),
            Command::Stats => Ok(stats(db, format)),
        }
    }
}

/// Stores that can report statistics to the `stats` command.
pub trait HasStats: KvStore {
    /// Statistics as a flat JSON object.
    fn stats_json(&self) -> serde_json::Value;
}

impl HasStats for strata_storage::PagedKv {
    fn stats_json(&self) -> serde_json::Value {
        serde_json::to_value(self.stats()).unwrap_or_else(|_| json!({}))
    }
}

impl HasStats for strata_storage::MemoryKv {
    fn stats_json(&self) -> serde_json::Value {
        json!({ "entries": self.len() })
    }
}

fn list_tables<K: KvStore>(db: &mut Db<K>) -> Result<ResultSet> {
    let mut result = ResultSet::new(["name", "prefix", "columns", "primary_key"]);
    for name in db.tables()? {
        let def = db.table_def(&name)?;
        let columns: Vec<String> = def
            .cols
            .iter()
            .zip(&def.types)
            .map(|(col, ty)| format!("{} {}", col, ty))
            .collect();
        result.push(vec![
            json!(def.name),
            json!(def.prefix),
            json!(columns.join(", ")),
            json!(def.primary_key_columns().join(", ")),
        ]);
    }
    Ok(result)
}

fn describe<K: KvStore>(db: &mut Db<K>, table: &str, format: OutputFormat) -> Result<String> {
    let def = db.table_def(table)?;
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&*def)?);
    }

    let mut result = ResultSet::new(["column", "type", "primary_key"]);
    for (i, (col, ty)) in def.cols.iter().zip(&def.types).enumerate() {
        result.push(vec![json!(col), json!(ty.to_string()), json!(i < def.pkeys)]);
    }
    let mut out = format_result(&result, format);
    for index in &def.indexes {
        out.push_str(&format!("\nindex {} ({})", index.name, index.columns.join(", ")));
    }
    Ok(out)
}

fn dump<K: KvStore>(db: &mut Db<K>, table: &str, limit: Option<usize>) -> Result<ResultSet> {
    let def = db.table_def(table)?;
    let mut result = ResultSet::new(def.cols.iter().cloned());

    let mut scanner = db.scan_table(table)?;
    let mut rec = Record::new();
    while scanner.valid() && limit.map_or(true, |n| result.rows.len() < n) {
        scanner.deref(&mut rec)?;
        result.push(rec.values().iter().map(value_to_json).collect());
        scanner.next()?;
    }
    Ok(result)
}

fn stats<K: HasStats>(db: &Db<K>, format: OutputFormat) -> String {
    let stats = db.store().stats_json();
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(&stats).unwrap_or_else(|_| "{}".to_string());
    }

    let mut result = ResultSet::new(["metric", "value"]);
    if let serde_json::Value::Object(map) = stats {
        for (key, value) in map {
            result.push(vec![json!(key), value]);
        }
    }
    format_result(&result, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use strata_common::config::{DbConfig, StorageConfig};
    use strata_table::{TableDef, ValueType};
    use tempfile::tempdir;

    fn sample_db(dir: &Path) -> Db {
        let config = DbConfig::new(dir.join("cli.db")).with_storage(StorageConfig::for_testing());
        let mut db = Db::open(config).unwrap();
        db.table_new(
            TableDef::new("users")
                .column("id", ValueType::Int64)
                .column("name", ValueType::Bytes)
                .primary_keys(1),
        )
        .unwrap();
        for (id, name) in [(1, "ann"), (2, "bob"), (3, "cy")] {
            let rec = Record::new().add_int64("id", id).add_bytes("name", name);
            db.insert("users", &rec).unwrap();
        }
        db
    }

    #[test]
    fn test_tables() {
        let dir = tempdir().unwrap();
        let mut db = sample_db(dir.path());
        let out = Command::Tables.execute(&mut db, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["name"], json!("users"));
        assert_eq!(parsed[0]["prefix"], json!(100));
        assert_eq!(parsed[0]["columns"], json!("id INT64, name BYTES"));
    }

    #[test]
    fn test_schema() {
        let dir = tempdir().unwrap();
        let mut db = sample_db(dir.path());
        let cmd = Command::Schema {
            table: "users".into(),
        };
        let out = cmd.execute(&mut db, OutputFormat::Json).unwrap();
        let def: TableDef = serde_json::from_str(&out).unwrap();
        assert_eq!(def.pkeys, 1);

        let out = cmd.execute(&mut db, OutputFormat::Table).unwrap();
        assert!(out.contains("INT64"));
        assert!(out.contains("index primary (id)"));

        let missing = Command::Schema {
            table: "nope".into(),
        };
        assert!(missing.execute(&mut db, OutputFormat::Table).is_err());
    }

    #[test]
    fn test_dump_limit() {
        let dir = tempdir().unwrap();
        let mut db = sample_db(dir.path());
        let cmd = Command::Dump {
            table: "users".into(),
            limit: Some(2),
        };
        let out = cmd.execute(&mut db, OutputFormat::Json).unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], json!("bob"));
    }

    #[test]
    fn test_stats() {
        let dir = tempdir().unwrap();
        let mut db = sample_db(dir.path());
        let out = Command::Stats.execute(&mut db, OutputFormat::Json).unwrap();
        let stats: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(stats["entries"], json!(5));
        assert!(stats["page_count"].as_u64().unwrap() >= 3);

        let out = Command::Stats.execute(&mut db, OutputFormat::Table).unwrap();
        assert!(out.contains("free_pages"));
    }
}
