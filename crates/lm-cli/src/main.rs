//! List merger CLI
//!
//! Command-line tool for aligning up to four CSV/Excel files on a shared key
//! column and exporting the merged table.

mod logging;

use clap::{Parser, Subcommand};
use lm_core::{
    export_table, parse_file, ExportFormat, MergePlan, MergeSession, MergedTable,
    OutputSelection, MAX_SOURCES,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rows shown by default when previewing a table
const PREVIEW_ROWS: usize = 100;

#[derive(Parser)]
#[command(name = "lm")]
#[command(about = "Merge up to four tabular files on a shared key column", long_about = None)]
#[command(version)]
struct Cli {
    /// Show informational logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the headers of each file, the common headers and the union
    Headers {
        /// Files to inspect (up to four, in slot order)
        #[arg(short, long, required = true)]
        file: Vec<PathBuf>,
    },

    /// Parse and display a single file
    Parse {
        /// Path to a CSV or Excel file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Merge files on a key column and preview or export the result
    Merge {
        /// Files to merge (up to four, in slot order); overrides the plan's files
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Merge plan (JSON) to start from
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Key column used to match rows
        #[arg(short, long)]
        key: Option<String>,

        /// Measure column per file, as FILE_NUMBER=HEADER (e.g. 2=Score)
        #[arg(short, long, value_parser = parse_measure)]
        measure: Vec<(usize, String)>,

        /// Output columns in order (comma-separated); all others are excluded
        #[arg(short, long)]
        columns: Option<String>,

        /// Columns to leave out of the output (comma-separated)
        #[arg(long)]
        exclude: Option<String>,

        /// Output file path; without it the result is only previewed
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (xlsx, csv or json); defaults to the plan's or the file extension
        #[arg(long)]
        format: Option<String>,

        /// Maximum number of rows to preview
        #[arg(short, long, default_value_t = PREVIEW_ROWS)]
        limit: usize,
    },

    /// Create a merge plan template
    CreatePlan {
        /// Output path for the plan file
        #[arg(short, long)]
        output: PathBuf,

        /// Files to include; their headers are used to fill in defaults
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Key column
        #[arg(short, long)]
        key: Option<String>,

        /// Measure column per file, as FILE_NUMBER=HEADER
        #[arg(short, long, value_parser = parse_measure)]
        measure: Vec<(usize, String)>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> lm_core::Result<()> {
    match command {
        Commands::Headers { file } => cmd_headers(&file),
        Commands::Parse { file, limit } => cmd_parse(&file, limit),
        Commands::Merge {
            file,
            plan,
            key,
            measure,
            columns,
            exclude,
            output,
            format,
            limit,
        } => {
            let mut merge_plan = match &plan {
                Some(path) => MergePlan::load(path)?,
                None => MergePlan::new(),
            };
            if !file.is_empty() {
                merge_plan.files = file;
            }
            if key.is_some() {
                merge_plan.key = key;
            }
            merge_plan.measures.extend(measure);
            if let Some(path) = output {
                merge_plan.format = ExportFormat::from_path(&path);
                merge_plan.output_path = Some(path);
            }
            if let Some(format) = format {
                merge_plan.format = format.parse()?;
            }

            cmd_merge(&merge_plan, columns.as_deref(), exclude.as_deref(), limit)
        }
        Commands::CreatePlan {
            output,
            file,
            key,
            measure,
        } => cmd_create_plan(&output, file, key, measure),
    }
}

fn cmd_headers(files: &[PathBuf]) -> lm_core::Result<()> {
    let mut session = MergeSession::new();
    load_files(&mut session, files)?;

    for (slot, source) in session.loaded_sources() {
        println!("File {}: {} ({} rows)", slot + 1, source.id(), source.row_count());
        println!("  {}", source.headers().join(", "));
    }
    println!();

    let common = session.common_headers();
    if common.is_empty() {
        println!("Common headers: (none)");
    } else {
        println!("Common headers: {}", common.join(", "));
    }
    println!("All headers: {}", session.all_headers().join(", "));

    Ok(())
}

fn cmd_parse(file: &Path, limit: usize) -> lm_core::Result<()> {
    let source = parse_file(file)?;

    println!("File: {}", file.display());
    println!("Columns: {}", source.column_count());
    println!("Rows: {}", source.row_count());
    println!();

    println!("{}", source.headers().join("\t"));
    println!("{}", "-".repeat(source.column_count() * 12));

    for row in source.rows().iter().take(limit) {
        let values: Vec<String> = source
            .headers()
            .iter()
            .map(|h| row.get(h).map(|v| v.to_string_value()).unwrap_or_default())
            .collect();
        println!("{}", values.join("\t"));
    }

    if source.row_count() > limit {
        println!("... ({} more rows)", source.row_count() - limit);
    }

    Ok(())
}

fn cmd_merge(
    plan: &MergePlan,
    columns: Option<&str>,
    exclude: Option<&str>,
    limit: usize,
) -> lm_core::Result<()> {
    let mut session = MergeSession::new();
    plan.apply_to(&mut session)?;

    if let Some(columns) = columns {
        let listed = split_list(columns);
        debug!(?listed, "restricting output columns");
        let mut selection: OutputSelection = listed.iter().map(|c| (c.as_str(), true)).collect();
        for header in session.all_headers() {
            if !listed.contains(&header) {
                selection.set(header, false);
            }
        }
        session.replace_output(selection);
    }
    if let Some(exclude) = exclude {
        for name in split_list(exclude) {
            session.set_output(name, false);
        }
    }

    let table = session.merge()?;

    print_table(table, limit);
    if table.skipped_rows > 0 {
        println!(
            "({} input rows without a key value were left out)",
            table.skipped_rows
        );
    }

    if let Some(path) = &plan.output_path {
        export_table(table, path, plan.format)?;
        println!();
        println!("Exported {} rows to {}", table.row_count(), path.display());
    }

    Ok(())
}

fn cmd_create_plan(
    output: &Path,
    files: Vec<PathBuf>,
    key: Option<String>,
    measures: Vec<(usize, String)>,
) -> lm_core::Result<()> {
    let mut plan = MergePlan::new();
    plan.files = files;

    if plan.files.is_empty() {
        // Placeholders to edit by hand
        plan.key = Some("ID".to_string());
        plan.measures.insert(1, "Value".to_string());
        plan.measures.insert(2, "Value".to_string());
    } else {
        let mut session = MergeSession::new();
        load_files(&mut session, &plan.files)?;

        plan.key = session.key().map(str::to_string);
        plan.measures = session
            .measures()
            .iter()
            .map(|(slot, header)| (slot + 1, header.clone()))
            .collect();
        plan.output = session.output_selection().clone();
    }

    if key.is_some() {
        plan.key = key;
    }
    plan.measures.extend(measures);
    plan.output_path = Some(PathBuf::from(lm_core::DEFAULT_EXPORT_NAME));

    plan.save(output)?;
    println!("Created plan file: {}", output.display());
    println!("Files: {}", plan.files.len());
    println!("Key: {}", plan.key.as_deref().unwrap_or("(none)"));
    println!();
    println!("Edit the file to adjust the merge, then run:");
    println!("  lm merge --plan {}", output.display());

    Ok(())
}

fn load_files(session: &mut MergeSession, files: &[PathBuf]) -> lm_core::Result<()> {
    if files.len() > MAX_SOURCES {
        return Err(lm_core::Error::SlotOutOfRange {
            slot: files.len(),
            max: MAX_SOURCES,
        });
    }
    for (slot, path) in files.iter().enumerate() {
        session.load_file(slot, path)?;
    }
    Ok(())
}

fn print_table(table: &MergedTable, limit: usize) {
    println!("{}", table.columns.join("\t"));
    println!("{}", "-".repeat(table.column_count() * 12));

    for row in table.rows.iter().take(limit) {
        let values: Vec<String> = table
            .columns
            .iter()
            .map(|c| row.get(c).map(|v| v.to_string_value()).unwrap_or_default())
            .collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > limit {
        println!("... ({} more rows)", table.row_count() - limit);
    }
}

/// Parse `FILE_NUMBER=HEADER`
fn parse_measure(s: &str) -> Result<(usize, String), String> {
    let (number, header) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FILE_NUMBER=HEADER, got '{}'", s))?;

    let number: usize = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid file number '{}'", number))?;
    if number == 0 || number > MAX_SOURCES {
        return Err(format!("file number must be between 1 and {}", MAX_SOURCES));
    }

    let header = header.trim();
    if header.is_empty() {
        return Err("measure header is empty".to_string());
    }
    Ok((number, header.to_string()))
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
