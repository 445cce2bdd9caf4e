use super::driver::DumpProducer;
use crate::config::{BackupConfig, DumpOptions, TargetScope};
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, Row, Value};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing::{debug, info};

const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "performance_schema", "mysql", "sys"];
const INSERT_BATCH_SIZE: usize = 100;

/// Dumps over the MySQL wire protocol without an external client binary.
pub struct MysqlDriver {
    pool: Pool,
    scope: TargetScope,
    endpoint: String,
}

impl MysqlDriver {
    pub fn new(config: &BackupConfig) -> Result<Self> {
        let opts: Opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.expose().to_string()))
            .into();

        Ok(Self {
            pool: Pool::new(opts),
            scope: config.scope.clone(),
            endpoint: format!("{}:{}", config.host, config.port),
        })
    }
    async fn get_conn(&self) -> Result<Conn> {
        self.pool.get_conn().await.map_err(BackupError::from)
    }
    async fn list_databases(&self, conn: &mut Conn) -> Result<Vec<String>> {
        let databases: Vec<String> = conn.query("SHOW DATABASES").await?;
        let filtered: Vec<String> = databases
            .into_iter()
            .filter(|db| !SYSTEM_SCHEMAS.contains(&db.as_str()))
            .collect();
        debug!("Found {} user databases", filtered.len());
        Ok(filtered)
    }
    async fn get_tables(&self, conn: &mut Conn, db_name: &str) -> Result<Vec<String>> {
        let query = format!("SHOW FULL TABLES FROM `{}` WHERE Table_type = 'BASE TABLE'", db_name);
        let rows: Vec<(String, String)> = conn.query(query).await?;
        Ok(rows.into_iter().map(|(name, _)| name).collect())
    }
    async fn get_create_table(&self, conn: &mut Conn, db_name: &str, table: &str) -> Result<String> {
        let query = format!("SHOW CREATE TABLE `{}`.`{}`", db_name, table);
        let row: Option<Row> = conn.query_first(&query).await?;

        row.and_then(|r| r.get::<String, _>(1)).ok_or_else(|| {
            BackupError::Connection(format!(
                "could not get CREATE TABLE for {}.{}",
                db_name, table
            ))
        })
    }
    async fn dump_table_data<W: Write + Send>(
        &self,
        conn: &mut Conn,
        db_name: &str,
        table: &str,
        writer: &mut W,
    ) -> Result<()> {
        let columns_query = format!(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' ORDER BY ORDINAL_POSITION",
            escape_string(db_name),
            escape_string(table)
        );
        let columns: Vec<String> = conn.query(columns_query).await?;
        if columns.is_empty() {
            return Ok(());
        }

        let rows: Vec<Row> = conn
            .query(format!("SELECT * FROM `{}`.`{}`", db_name, table))
            .await?;
        let rows: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .map(|i| row.as_ref(i).cloned().unwrap_or(Value::NULL))
                    .collect()
            })
            .collect();

        write_inserts(writer, table, &columns, &rows)?;
        Ok(())
    }
    async fn dump_schema<W: Write + Send>(
        &self,
        conn: &mut Conn,
        db_name: &str,
        options: &DumpOptions,
        writer: &mut W,
    ) -> Result<()> {
        let mut tables = self.get_tables(conn, db_name).await?;
        if !options.tables.is_empty() {
            if let Some(unknown) = options.tables.iter().find(|t| !tables.contains(t)) {
                return Err(BackupError::Connection(format!(
                    "table {}.{} does not exist",
                    db_name, unknown
                )));
            }
            tables = options.tables.clone();
        }
        info!("Dumping {} tables from {}", tables.len(), db_name);

        for table in &tables {
            debug!("Dumping table: {}", table);
            let create_stmt = if options.data_only {
                None
            } else {
                Some(self.get_create_table(conn, db_name, table).await?)
            };
            write_table_preamble(writer, table, create_stmt.as_deref())?;
            self.dump_table_data(conn, db_name, table, writer).await?;
        }
        Ok(())
    }
}

/// Section header plus `DROP`/`CREATE` when DDL is wanted.
fn write_table_preamble<W: Write>(
    writer: &mut W,
    table: &str,
    create_stmt: Option<&str>,
) -> io::Result<()> {
    let table_header = format!("\n-- Table: {}\n-- ----------------------------------------\n\n", table);
    writer.write_all(table_header.as_bytes())?;
    if let Some(create_stmt) = create_stmt {
        writer.write_all(format!("DROP TABLE IF EXISTS `{}`;\n\n", table).as_bytes())?;
        writer.write_all(create_stmt.as_bytes())?;
        writer.write_all(b";\n\n")?;
    }
    Ok(())
}

/// Writes `rows` as multi-row `INSERT` statements, `INSERT_BATCH_SIZE` rows each.
fn write_inserts<W: Write>(
    writer: &mut W,
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> io::Result<()> {
    let column_list = columns
        .iter()
        .map(|c| format!("`{}`", c))
        .collect::<Vec<_>>()
        .join(", ");

    for chunk in rows.chunks(INSERT_BATCH_SIZE) {
        let values: Vec<String> = chunk
            .iter()
            .map(|row| {
                let vals: Vec<String> = row.iter().map(render_value).collect();
                format!("({})", vals.join(", "))
            })
            .collect();

        let insert = format!(
            "INSERT INTO `{}` ({}) VALUES\n{};\n\n",
            table,
            column_list,
            values.join(",\n")
        );
        writer.write_all(insert.as_bytes())?;
    }
    Ok(())
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\0', "\\0")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::NULL => "NULL".to_string(),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => format!("'{}'", escape_string(s)),
            Err(_) => format!("X'{}'", hex::encode(bytes)),
        },
        Value::Int(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Double(n) => n.to_string(),
        Value::Date(y, m, d, h, mi, s, us) => {
            format!("'{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}'", y, m, d, h, mi, s, us)
        }
        Value::Time(neg, d, h, m, s, us) => {
            let sign = if *neg { "-" } else { "" };
            format!("'{}{}:{:02}:{:02}.{:06}'", sign, d * 24 + *h as u32, m, s, us)
        }
    }
}

fn dump_header(scope: &TargetScope) -> String {
    format!(
        "-- MySQL dump generated by sqldump-rotate\n\
         -- Scope: {}\n\
         -- Generated at: {}\n\n\
         SET FOREIGN_KEY_CHECKS=0;\n\
         SET SQL_MODE='NO_AUTO_VALUE_ON_ZERO';\n\n",
        scope,
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[async_trait]
impl DumpProducer for MysqlDriver {
    async fn dump(&self, destination: File) -> Result<()> {
        info!("Starting native dump of {} from {}", self.scope, self.endpoint);
        let mut writer = BufWriter::new(destination);
        let mut conn = self.get_conn().await?;
        conn.query_drop("SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ").await?;
        conn.query_drop("START TRANSACTION WITH CONSISTENT SNAPSHOT").await?;

        writer.write_all(dump_header(&self.scope).as_bytes())?;

        match &self.scope {
            TargetScope::AllDatabases => {
                let full = DumpOptions::default();
                for db_name in self.list_databases(&mut conn).await? {
                    info!("Dumping database: {}", db_name);
                    let preamble = format!(
                        "\n-- Database: {db}\n\nCREATE DATABASE IF NOT EXISTS `{db}`;\nUSE `{db}`;\n",
                        db = db_name
                    );
                    writer.write_all(preamble.as_bytes())?;
                    self.dump_schema(&mut conn, &db_name, &full, &mut writer).await?;
                }
            }
            TargetScope::NamedSchema { name, options } => {
                self.dump_schema(&mut conn, name, options, &mut writer).await?;
            }
        }

        writer.write_all(b"\nSET FOREIGN_KEY_CHECKS=1;\n")?;
        writer.flush()?;
        conn.query_drop("COMMIT").await?;
        drop(conn);
        if let Err(e) = self.pool.clone().disconnect().await {
            debug!("Pool disconnect failed: {}", e);
        }

        info!("Completed native dump of {}", self.scope);
        Ok(())
    }

    fn method_name(&self) -> &'static str {
        "native"
    }
}
