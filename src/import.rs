//! The import pipeline: decode, map, filter, normalize, batch, upsert.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::config::ImportConfig;
use crate::load::{BatchLoader, ImportStats, UpsertSink};
use crate::process::{self, ColumnRoles, RowError, RowMapper};
use crate::schema::{Layout, LayoutKind};

/// Decoded input plus the layout and column roles it is read with.
///
/// Built before any database work so an unreadable file or a column name
/// that does not fit the file stops the run without touching the table.
#[derive(Debug)]
pub struct PreparedInput {
    pub text: String,
    pub layout: &'static Layout,
    pub roles: ColumnRoles,
}

impl PreparedInput {
    #[instrument(level = "info", skip(config), fields(path = %config.csv_path.display()))]
    pub fn read(config: &ImportConfig) -> Result<Self> {
        let text = process::read_decoded(&config.csv_path, config.encoding)?;
        Self::from_text(config, text)
    }

    /// Pick the layout (`--layout`, else the first row's width) and bind the
    /// configured column names to it.
    pub fn from_text(config: &ImportConfig, text: String) -> Result<Self> {
        let kind = match config.layout {
            Some(kind) => kind,
            None => {
                let first = process::csv_reader(&text).records().next().and_then(|r| r.ok());
                let kind = first
                    .as_ref()
                    .and_then(LayoutKind::for_first_row)
                    .unwrap_or_default();
                info!(
                    layout = kind.layout().name(),
                    cells = first.map(|r| r.len()),
                    "layout chosen from the first row"
                );
                kind
            }
        };
        let layout = kind.layout();
        let roles = config.columns.bind(layout)?;
        Ok(Self {
            text,
            layout,
            roles,
        })
    }
}

/// Run one import of `input` into `sink`.
///
/// 1) let the first row decide header handling
/// 2) for every data row: map, filter on the type code, normalize
/// 3) hand surviving records to the batch loader
///
/// Bad rows and failed batches are logged and counted, never fatal. Only an
/// unusable header stops the run.
#[instrument(level = "info", skip_all, fields(path = %config.csv_path.display(), layout = input.layout.name()))]
pub async fn run_import<S: UpsertSink>(
    config: &ImportConfig,
    input: &PreparedInput,
    sink: S,
) -> Result<(ImportStats, S)> {
    let mut stats = ImportStats::default();
    let mut loader = BatchLoader::new(sink, config.batch_size);
    let mut row_mapper: Option<RowMapper> = None;

    let mut rdr = process::csv_reader(&input.text);
    for (idx, result) in rdr.records().enumerate() {
        let fallback_line = idx as u64 + 1;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                let line = err
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                stats.rows_read += 1;
                stats.malformed_rows += 1;
                let err = RowError::Unreadable(err.to_string());
                warn!(line, error = %err, "skipping row");
                stats.record_skip(line, None, &err);
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(fallback_line);

        if row_mapper.is_none() {
            let detected = RowMapper::detect(input.layout, input.roles, &row)?;
            let is_header = detected.has_header();
            row_mapper = Some(detected);
            if is_header {
                stats.header_rows += 1;
                debug!(line, "skipping header row");
                continue;
            }
        }
        let Some(mapper) = row_mapper.as_ref() else {
            continue;
        };

        stats.rows_read += 1;
        let mapped = match mapper.map(&row) {
            Ok(mapped) => mapped,
            Err(err) => {
                stats.malformed_rows += 1;
                warn!(line, error = %err, "skipping row");
                stats.record_skip(line, None, &err);
                continue;
            }
        };

        if !config.filter.is_general(&mapped) {
            stats.filtered_rows += 1;
            debug!(
                line,
                type_code = mapped.type_code(),
                "not a general corporation; skipped"
            );
            continue;
        }

        let record = match mapped.normalize() {
            Ok(record) => record,
            Err(err) => {
                stats.invalid_rows += 1;
                warn!(
                    line,
                    corporate_number = mapped.corporate_number_hint(),
                    name = mapped.name_hint(),
                    error = %err,
                    "skipping row"
                );
                stats.record_skip(line, mapped.corporate_number_hint(), &err);
                continue;
            }
        };

        loader.push(line, record, &mut stats).await;
    }

    if row_mapper.is_none() {
        info!("input has no rows");
    }
    let sink = loader.finish(&mut stats).await;
    Ok((stats, sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::load::testing::MemorySink;
    use crate::process::Value;
    use clap::Parser;
    use chrono::NaiveDate;
    use encoding_rs::SHIFT_JIS;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    fn init_test_logging() {
        let _ = tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_max_level(Level::DEBUG)
                .with_test_writer()
                .finish(),
        );
    }

    fn sjis_file(text: &str) -> Result<NamedTempFile> {
        let (bytes, _, unmappable) = SHIFT_JIS.encode(text);
        assert!(!unmappable, "fixture must be representable in Shift_JIS");
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        Ok(tmp)
    }

    fn config(
        file: &NamedTempFile,
        layout: Option<LayoutKind>,
        batch_size: usize,
    ) -> Result<ImportConfig> {
        let argv = vec![
            "houjin-import".to_string(),
            "--batch-size".to_string(),
            batch_size.to_string(),
            file.path().to_string_lossy().to_string(),
        ];
        let (config, _) = Args::try_parse_from(argv)?.resolve()?;
        Ok(ImportConfig { layout, ..config })
    }

    async fn import<S: UpsertSink>(config: &ImportConfig, sink: S) -> Result<(ImportStats, S)> {
        let input = PreparedInput::read(config)?;
        run_import(config, &input, sink).await
    }

    #[tokio::test]
    async fn seven_column_row_is_upserted() -> Result<()> {
        init_test_logging();
        let file = sjis_file("1,1234567890123,301,Example Corp,Tokyo,,2001-04-01\n")?;
        let cfg = config(&file, Some(LayoutKind::Compact), 500)?;

        let (stats, sink) = import(&cfg, MemorySink::default()).await?;

        assert_eq!(stats.rows_read, 1);
        assert_eq!(stats.records_upserted, 1);
        let row = &sink.rows["1234567890123"];
        assert_eq!(row.get("company_name"), Some(&Value::Text("Example Corp".into())));
        assert_eq!(row.get("address"), Some(&Value::Text("Tokyo".into())));
        assert_eq!(row.get("furigana"), Some(&Value::Null));
        assert_eq!(
            row.get("established_on"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2001, 4, 1).unwrap()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn reimport_is_idempotent() -> Result<()> {
        init_test_logging();
        let file = sjis_file(
            "1,1234567890123,301,株式会社テスト,東京都,テスト,20010401\n\
             2,2234567890123,302,合同会社サンプル,大阪府,サンプル,\n",
        )?;
        let cfg = config(&file, Some(LayoutKind::Compact), 500)?;

        let (first, sink) = import(&cfg, MemorySink::default()).await?;
        let snapshot = sink.rows.clone();
        let (second, sink) = import(&cfg, sink).await?;

        assert_eq!(first, second);
        assert_eq!(sink.rows, snapshot);
        assert_eq!(sink.rows.len(), 2);
        assert_eq!(sink.name_of("2234567890123").as_deref(), Some("合同会社サンプル"));
        Ok(())
    }

    #[tokio::test]
    async fn non_general_rows_are_filtered_not_failed() -> Result<()> {
        init_test_logging();
        let file = sjis_file(
            "1,1234567890123,401,外国会社,,,\n\
             2,2234567890123,301,株式会社テスト,,,\n\
             3,3234567890123,499,その他,,,not-a-date\n",
        )?;
        let cfg = config(&file, Some(LayoutKind::Compact), 500)?;

        let (stats, sink) = import(&cfg, MemorySink::default()).await?;

        assert_eq!(stats.rows_read, 3);
        assert_eq!(stats.filtered_rows, 2);
        assert_eq!(stats.invalid_rows, 0);
        assert_eq!(stats.records_upserted, 1);
        assert!(stats.skipped.is_empty());
        assert!(sink.rows.contains_key("2234567890123"));
        Ok(())
    }

    #[tokio::test]
    async fn bad_rows_are_skipped_and_the_run_continues() -> Result<()> {
        init_test_logging();
        let file = sjis_file(
            "1,1234567890123,301,株式会社エー,,,\n\
             2,2234567890123,301,株式会社ビー,\n\
             3,12345,301,株式会社シー,,,\n\
             4,4234567890123,301,株式会社ディー,,,2001-13-45\n\
             5,5234567890123,301,,,,\n\
             6,6234567890123,301,株式会社エフ,,,\n",
        )?;
        let cfg = config(&file, Some(LayoutKind::Compact), 500)?;

        let (stats, sink) = import(&cfg, MemorySink::default()).await?;

        assert_eq!(stats.rows_read, 6);
        assert_eq!(stats.malformed_rows, 1);
        assert_eq!(stats.invalid_rows, 3);
        assert_eq!(stats.skipped_rows(), 4);
        assert_eq!(stats.records_upserted, 2);
        assert_eq!(sink.rows.len(), 2);

        let lines: Vec<u64> = stats.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 5]);
        assert_eq!(stats.skipped[1].corporate_number.as_deref(), Some("12345"));
        assert!(stats.skipped[3].reason.contains("missing company_name"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_and_header_only_files_load_nothing() -> Result<()> {
        init_test_logging();
        for text in ["", "順序番号,法人番号,法人種別,商号又は名称,所在地,フリガナ,設立年月日\n"] {
            let file = sjis_file(text)?;
            let cfg = config(&file, Some(LayoutKind::Compact), 500)?;
            let (stats, sink) = import(&cfg, MemorySink::default()).await?;
            assert_eq!(stats.rows_read, 0);
            assert_eq!(stats.records_upserted, 0);
            assert!(sink.batches.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn header_row_is_skipped_and_maps_columns() -> Result<()> {
        init_test_logging();
        let file = sjis_file(
            "法人番号,商号又は名称,法人種別\n\
             1234567890123,株式会社テスト,301\n",
        )?;
        let cfg = config(&file, Some(LayoutKind::Compact), 500)?;

        let (stats, sink) = import(&cfg, MemorySink::default()).await?;

        assert_eq!(stats.header_rows, 1);
        assert_eq!(stats.rows_read, 1);
        assert_eq!(sink.name_of("1234567890123").as_deref(), Some("株式会社テスト"));
        Ok(())
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_the_import() -> Result<()> {
        init_test_logging();
        let file = sjis_file(
            "1,1000000000001,301,A,,,\n\
             2,1000000000002,301,B,,,\n\
             3,1000000000003,301,C,,,\n\
             4,1000000000004,301,D,,,\n\
             5,1000000000005,301,E,,,\n",
        )?;
        let cfg = config(&file, Some(LayoutKind::Compact), 2)?;
        let sink = MemorySink {
            fail_batch: Some(2),
            ..Default::default()
        };

        let (stats, sink) = import(&cfg, sink).await?;

        assert_eq!(sink.batches, vec![2, 2, 1]);
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.records_failed, 2);
        assert_eq!(stats.records_upserted, 3);
        assert!(!sink.rows.contains_key("1000000000003"));
        assert!(sink.rows.contains_key("1000000000005"));
        let failed: Vec<u64> = stats.skipped.iter().map(|s| s.line).collect();
        assert_eq!(failed, vec![3, 4]);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_key_keeps_the_last_row() -> Result<()> {
        init_test_logging();
        let file = sjis_file(
            "1,1234567890123,301,旧商号,,,\n\
             2,1234567890123,301,新商号,,,\n",
        )?;
        let cfg = config(&file, Some(LayoutKind::Compact), 500)?;

        let (stats, sink) = import(&cfg, MemorySink::default()).await?;

        assert_eq!(stats.duplicate_rows, 1);
        assert_eq!(stats.records_upserted, 1);
        assert_eq!(sink.name_of("1234567890123").as_deref(), Some("新商号"));
        Ok(())
    }

    #[tokio::test]
    async fn published_layout_row_is_normalized() -> Result<()> {
        init_test_logging();
        let mut cells = vec![""; 30];
        cells[0] = "1";
        cells[1] = "5010001012345";
        cells[2] = "01";
        cells[3] = "0";
        cells[4] = "2015-10-05";
        cells[5] = "2015-10-05";
        cells[6] = "株式会社テスト";
        cells[8] = "301";
        cells[9] = "東京都";
        cells[10] = "千代田区";
        cells[11] = "丸の内1-1";
        cells[13] = "13";
        cells[14] = "101";
        cells[15] = "100-0005";
        cells[23] = "1";
        cells[28] = "テスト";
        cells[29] = "0";
        let file = sjis_file(&format!("{}\n", cells.join(",")))?;
        let cfg = config(&file, Some(LayoutKind::Published), 500)?;

        let (stats, sink) = import(&cfg, MemorySink::default()).await?;

        assert_eq!(stats.records_upserted, 1);
        let row = &sink.rows["5010001012345"];
        assert_eq!(row.get("sequence_number"), Some(&Value::Int(1)));
        assert_eq!(row.get("post_code"), Some(&Value::Text("1000005".into())));
        assert_eq!(row.get("latest"), Some(&Value::Bool(true)));
        assert_eq!(row.get("close_date"), Some(&Value::Null));
        assert_eq!(row.get("successor_corporate_number"), Some(&Value::Null));
        assert_eq!(
            row.get("update_date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2015, 10, 5).unwrap()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn default_args_pick_the_layout_from_the_first_row() -> Result<()> {
        init_test_logging();
        let file = sjis_file("1,1234567890123,301,Example Corp,Tokyo,,2001-04-01\n")?;
        let path = file.path().to_string_lossy().to_string();
        let (cfg, _) = Args::try_parse_from(["houjin-import", path.as_str()])?.resolve()?;

        let input = PreparedInput::read(&cfg)?;
        assert_eq!(input.layout.name(), "compact");
        let (stats, sink) = run_import(&cfg, &input, MemorySink::default()).await?;

        assert_eq!(stats.malformed_rows, 0);
        assert_eq!(stats.records_upserted, 1);
        let row = &sink.rows["1234567890123"];
        assert_eq!(row.get("company_name"), Some(&Value::Text("Example Corp".into())));
        assert_eq!(
            row.get("established_on"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2001, 4, 1).unwrap()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn explicit_layout_overrides_the_first_row() -> Result<()> {
        init_test_logging();
        let file = sjis_file("1,1234567890123,301,Example Corp,Tokyo,,2001-04-01\n")?;
        let cfg = config(&file, Some(LayoutKind::Published), 500)?;

        let (stats, _) = import(&cfg, MemorySink::default()).await?;

        assert_eq!(stats.malformed_rows, 1);
        assert_eq!(stats.records_upserted, 0);
        Ok(())
    }

    #[test]
    fn thirty_cell_rows_and_empty_files_use_the_published_layout() -> Result<()> {
        let file = sjis_file("")?;
        let cfg = config(&file, None, 500)?;
        let input = PreparedInput::from_text(&cfg, format!("{}\n", vec![""; 30].join(",")))?;
        assert_eq!(input.layout.name(), "published");
        assert_eq!(input.layout.column(input.roles.name).column, "company_name");

        let input = PreparedInput::read(&cfg)?;
        assert_eq!(input.layout.name(), "published");
        Ok(())
    }

    #[test]
    fn unreadable_file_fails_before_any_load() -> Result<()> {
        let file = sjis_file("")?;
        let mut cfg = config(&file, None, 500)?;
        cfg.csv_path = file.path().with_extension("missing");
        assert!(PreparedInput::read(&cfg).is_err());
        Ok(())
    }
}
