//! Command-line arguments and the configs derived from them.

use anyhow::{bail, Result};
use clap::Parser;
use encoding_rs::Encoding;
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;

use crate::process::filter::DEFAULT_GENERAL_TYPE_CODES;
use crate::process::{resolve_encoding, ColumnRoles, CorporationFilter};
use crate::schema::{ColumnKind, Layout, LayoutKind, TableName, COMPACT, PUBLISHED};

/// Import a corporate-number CSV into Postgres, keeping general corporations.
#[derive(Parser, Debug, Clone)]
#[command(name = "houjin-import", version)]
pub struct Args {
    /// CSV file to import
    pub csv_path: PathBuf,

    #[arg(long, env = "PGHOST", default_value = "localhost")]
    pub host: String,

    #[arg(long, env = "PGPORT", default_value_t = 5432)]
    pub port: u16,

    #[arg(long, env = "PGUSER", default_value = "postgres")]
    pub user: String,

    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "PGDATABASE", default_value = "companyinfo")]
    pub database: String,

    /// Target table, optionally schema-qualified
    #[arg(long, default_value = "companies")]
    pub table: String,

    /// Column holding the corporation type code
    #[arg(long, default_value = "kind")]
    pub general_type_column: String,

    /// Type codes kept as general corporations; pass '' to keep every row
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_GENERAL_TYPE_CODES)]
    pub general_type_codes: Vec<String>,

    /// Upsert key column
    #[arg(long, default_value = "corporate_number")]
    pub corporate_number_column: String,

    /// Legal name column; rows without a name are skipped
    #[arg(long, default_value = "company_name")]
    pub name_column: String,

    /// Rows per upsert statement
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Text encoding of the input (WHATWG label)
    #[arg(long, default_value = "shift_jis")]
    pub encoding: String,

    /// Column layout of the input; chosen from the first row's width when omitted
    #[arg(long, value_enum)]
    pub layout: Option<LayoutKind>,

    /// Parse, normalize and filter without connecting to a database
    #[arg(long)]
    pub dry_run: bool,

    /// Write the final statistics as JSON to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

/// Everything the pipeline needs apart from the database.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub csv_path: PathBuf,
    pub table: TableName,
    /// Forced layout; `None` lets the first row decide.
    pub layout: Option<LayoutKind>,
    pub columns: ColumnNames,
    pub filter: CorporationFilter,
    pub batch_size: usize,
    pub encoding: &'static Encoding,
    pub dry_run: bool,
    pub summary: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl DbConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        match &self.password {
            Some(password) => opts.password(password),
            None => opts,
        }
    }
}

/// Column names given on the command line, bound to indices once the layout
/// is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub key: String,
    pub name: String,
    pub kind: String,
}

fn resolve_column(layout: &Layout, option: &str, name: &str) -> Result<usize> {
    match layout.resolve(name) {
        Some(idx) => Ok(idx),
        None => bail!(
            "--{} '{}' is not a column of the {} layout",
            option,
            name,
            layout.name()
        ),
    }
}

impl ColumnNames {
    /// Resolve the names against `layout` and check their roles make sense.
    pub fn bind(&self, layout: &Layout) -> Result<ColumnRoles> {
        let key = resolve_column(layout, "corporate-number-column", &self.key)?;
        if layout.column(key).kind != ColumnKind::CorporateNumber {
            bail!(
                "--corporate-number-column '{}' does not hold corporate numbers",
                self.key
            );
        }
        let name = resolve_column(layout, "name-column", &self.name)?;
        let kind = resolve_column(layout, "general-type-column", &self.kind)?;
        if name == key {
            bail!("--name-column and --corporate-number-column must differ");
        }
        Ok(ColumnRoles { key, name, kind })
    }
}

impl Args {
    /// Validate names against the catalog and split into the two configs.
    ///
    /// With `--layout` the names must fit that layout. Without it they must
    /// fit at least one layout; the final check happens once the input's
    /// layout is known.
    pub fn resolve(self) -> Result<(ImportConfig, DbConfig)> {
        let columns = ColumnNames {
            key: self.corporate_number_column,
            name: self.name_column,
            kind: self.general_type_column,
        };
        match self.layout {
            Some(kind) => {
                columns.bind(kind.layout())?;
            }
            None => {
                if let Err(err) = columns.bind(&PUBLISHED) {
                    columns.bind(&COMPACT).map_err(|_| err)?;
                }
            }
        }

        let import = ImportConfig {
            csv_path: self.csv_path,
            table: TableName::parse(&self.table)?,
            layout: self.layout,
            columns,
            filter: CorporationFilter::new(&self.general_type_codes),
            batch_size: self.batch_size as usize,
            encoding: resolve_encoding(&self.encoding)?,
            dry_run: self.dry_run,
            summary: self.summary,
        };
        let db = DbConfig {
            host: self.host,
            port: self.port,
            user: self.user,
            password: self.password,
            database: self.database,
        };
        Ok((import, db))
    }
}
