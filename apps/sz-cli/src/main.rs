use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sz_app::{
    export_file, get_plot3d_dataframe, get_ternary_dataframe, import_file_with_progress,
    list_sample_sets, load_config, open_session, AppConfig, AppError, AppResult,
    CommitProgressEvent, CommitStage, CsvCodec, ExportTemplate, Grid, ImportOptions, SyncSession,
};
use sz_sheet::{Column, GridRow, MergePolicy};

#[derive(Parser)]
#[command(name = "sz-cli")]
#[command(about = "Stampz sync - color measurement sample sets and plot sheets", long_about = None)]
struct Cli {
    /// Directory holding the sample-set stores (overrides STAMPZ_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Project through RGB instead of L*a*b*
    #[arg(long, global = true)]
    rgb: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List sample sets in the data directory
    Sets,
    /// Print the normalized sheet of a sample set
    Show {
        /// Sample set name
        set: String,
    },
    /// Report the detected source type and projection
    Detect {
        /// Sample set name
        set: String,
    },
    /// Import a CSV or normalized-layout file into a sample set
    Import {
        /// Sample set name
        set: String,
        /// File to import
        file: PathBuf,
        /// Let incoming annotation cells replace stored ones
        #[arg(long)]
        overwrite: bool,
        /// Explicit column mapping, e.g. --map DataID=Stamp
        #[arg(long = "map", value_name = "TARGET=SOURCE")]
        mappings: Vec<String>,
        /// Sheet name for multi-sheet workbooks
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Export a sample set to CSV
    Export {
        /// Sample set name
        set: String,
        /// Output file path
        file: PathBuf,
        /// Write the seven-row metadata block above the header
        #[arg(long)]
        rigid: bool,
    },
    /// Print the rows a plot view consumes as CSV
    Frame {
        /// Sample set name
        set: String,
        /// Ternary frame (L*a*b*, no centroid rows)
        #[arg(long)]
        ternary: bool,
    },
    /// Remove cluster assignments and centroids, keeping coordinates
    ClearClusters {
        /// Sample set name
        set: String,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if cli.rgb {
        config.sync.prefer_rgb = true;
    }
    let data_dir = config.resolve_data_dir(cli.data_dir.as_deref());
    tracing::debug!(
        data_dir = %data_dir.display(),
        projection = ?config.sync.projection(),
        "resolved settings"
    );

    match cli.command {
        Commands::Sets => cmd_sets(&data_dir),
        Commands::Show { set } => cmd_show(&data_dir, &config, &set),
        Commands::Detect { set } => cmd_detect(&data_dir, &config, &set),
        Commands::Import {
            set,
            file,
            overwrite,
            mappings,
            sheet,
        } => {
            let options = ImportOptions {
                policy: overwrite.then_some(MergePolicy::Overwrite),
                column_overrides: parse_mappings(&mappings)?,
                sheet,
            };
            cmd_import(&data_dir, &config, &set, &file, &options)
        }
        Commands::Export { set, file, rigid } => {
            let template = if rigid {
                ExportTemplate::Rigid
            } else {
                ExportTemplate::Standard
            };
            cmd_export(&data_dir, &config, &set, &file, template)
        }
        Commands::Frame { set, ternary } => cmd_frame(&data_dir, &config, &set, ternary),
        Commands::ClearClusters { set } => cmd_clear_clusters(&data_dir, &config, &set),
    }
}

fn parse_mappings(raw: &[String]) -> AppResult<Vec<(Column, String)>> {
    raw.iter()
        .map(|m| {
            let (target, source) = m.split_once('=').ok_or_else(|| {
                AppError::InvalidInput(format!("mapping '{}' is not TARGET=SOURCE", m))
            })?;
            let column = Column::from_name(target).ok_or_else(|| {
                AppError::InvalidInput(format!("unknown target column '{}'", target))
            })?;
            Ok((column, source.trim().to_string()))
        })
        .collect()
}

fn session(data_dir: &Path, config: &AppConfig, set: &str) -> AppResult<SyncSession> {
    open_session(data_dir, set, &config.sync)
}

fn cmd_sets(data_dir: &Path) -> AppResult<()> {
    let sets = list_sample_sets(data_dir)?;
    if sets.is_empty() {
        println!("No sample sets found in {}", data_dir.display());
    } else {
        println!("Sample sets in {}:", data_dir.display());
        for s in sets {
            println!(
                "  {} - {} measurements, {} clustered, {} centroids ({})",
                s.name,
                s.measurements,
                s.annotated,
                s.centroids,
                s.source_type.label()
            );
        }
    }
    Ok(())
}

fn cmd_show(data_dir: &Path, config: &AppConfig, set: &str) -> AppResult<()> {
    let mut session = session(data_dir, config, set)?;
    let rows = session.full_rebuild();
    for (idx, row) in rows.rows.iter().enumerate() {
        if row.is_blank() {
            continue;
        }
        println!("{:>4}  {}", idx + 1, row.cells().join("\t"));
    }
    Ok(())
}

fn cmd_detect(data_dir: &Path, config: &AppConfig, set: &str) -> AppResult<()> {
    let session = session(data_dir, config, set)?;
    println!("Sample set: {}", session.name());
    println!("  Source type: {}", session.source_type().label());
    println!("  Projection:  {:?}", session.projection());
    println!("  Measurements: {}", session.store().measurement_count());
    Ok(())
}

fn cmd_import(
    data_dir: &Path,
    config: &AppConfig,
    set: &str,
    file: &Path,
    options: &ImportOptions,
) -> AppResult<()> {
    println!("Importing {} into {}", file.display(), set);
    let mut session = session(data_dir, config, set)?;

    let mut last_emit = Instant::now();
    let mut progress = |event: &CommitProgressEvent| -> ControlFlow<()> {
        if event.stage != CommitStage::Reconciling || last_emit.elapsed().as_millis() >= 100 {
            render_cli_progress(event);
            last_emit = Instant::now();
        }
        ControlFlow::Continue(())
    };
    let report = import_file_with_progress(
        &mut session,
        file,
        options,
        config.sync.default_merge_policy,
        None,
        Some(&mut progress),
    )?;
    clear_progress_line();

    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    let commit = &report.commit;
    println!(
        "✓ Imported {} ({} layout): {} inserted, {} updated, {} centroids",
        report.format.label(),
        if report.native_layout { "normalized" } else { "mapped" },
        commit.inserted,
        commit.updated,
        commit.centroids
    );
    for conflict in &commit.conflicts {
        println!(
            "  kept {} of {}: stored '{}', file had '{}'",
            conflict.field, conflict.data_id, conflict.stored, conflict.incoming
        );
    }
    for err in &commit.errors {
        println!("  ✗ {}", err);
    }
    Ok(())
}

fn cmd_export(
    data_dir: &Path,
    config: &AppConfig,
    set: &str,
    file: &Path,
    template: ExportTemplate,
) -> AppResult<()> {
    let session = session(data_dir, config, set)?;
    let report = export_file(session.store(), file, session.projection(), template, None)?;
    println!(
        "✓ Exported {} rows ({} measurements) to {}",
        report.rows_written,
        report.data_rows,
        report.path.display()
    );
    Ok(())
}

fn cmd_frame(data_dir: &Path, config: &AppConfig, set: &str, ternary: bool) -> AppResult<()> {
    let session = session(data_dir, config, set)?;
    let rows = if ternary {
        get_ternary_dataframe(session.store())
    } else {
        get_plot3d_dataframe(session.store(), session.projection(), true)
    };
    let grid = frame_grid(&rows);
    CsvCodec.write_to(io::stdout().lock(), Path::new("<stdout>"), &grid)?;
    tracing::info!(set, ternary, rows = rows.len(), "frame written");
    Ok(())
}

/// Header plus one line per frame row, ready for CSV output.
fn frame_grid(rows: &[GridRow]) -> Grid {
    std::iter::once(GridRow::header())
        .chain(rows.iter().cloned())
        .map(|row| row.cells().to_vec())
        .collect()
}

fn cmd_clear_clusters(data_dir: &Path, config: &AppConfig, set: &str) -> AppResult<()> {
    let mut session = session(data_dir, config, set)?;
    let (measurements, centroids) = session.clear_cluster_data()?;
    println!(
        "✓ Cleared cluster data from {} measurements and removed {} centroids",
        measurements, centroids
    );
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &CommitProgressEvent) {
    let width = 28usize;
    let fraction = event.fraction_complete();
    let filled = ((fraction * width as f64).round() as usize).min(width);
    print!(
        "\r[{}{}] {:>6.2}%  rows={}/{}  inserted={}  updated={}  errors={}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled)),
        fraction * 100.0,
        event.rows_processed,
        event.rows_total,
        event.inserted,
        event.updated,
        event.errors
    );
    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_output_quotes_free_text_cells() {
        let mut row = GridRow::blank();
        row.set(Column::DataId, "S1");
        row.set(Column::Color, "red, dark");
        let grid = frame_grid(&[row]);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0][3], "DataID");

        let mut out = Vec::new();
        CsvCodec
            .write_to(&mut out, Path::new("<memory>"), &grid)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let second = text.lines().nth(1).unwrap();
        assert!(second.contains("\"red, dark\""));
        assert_eq!(second.matches(',').count(), 13);
    }

    #[test]
    fn mappings_parse_target_and_source() {
        let parsed = parse_mappings(&["dataid = Stamp ".to_string()]).unwrap();
        assert_eq!(parsed, vec![(Column::DataId, "Stamp".to_string())]);
        assert!(parse_mappings(&["Nope=X".to_string()]).is_err());
        assert!(parse_mappings(&["DataID".to_string()]).is_err());
    }
}
