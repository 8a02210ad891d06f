//! ElabLite CLI - experiment metadata from templates to export bundles
//!
//! # Main Commands
//!
//! ```bash
//! elablite serve                                  # Start HTTP server (port 3000)
//! elablite inspect xrf.json                       # Show a template's fields
//! elablite form xrf.json                          # Generate the form with defaults
//! elablite export --session s.elablite --files data/ --column IdentifierAnalysis
//! ```
//!
//! # Other Commands
//!
//! ```bash
//! elablite preset create xrf.json --title T1 --author Ada --technique XRF
//! elablite preset show 20240101_T1.elablite
//! elablite techniques list
//! elablite store list --kind presets
//! ```

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use elablite::form::FormItem;
use elablite::{
    read_elablite, register_technique, technique, techniques, Config, DefaultRenderer, ExperimentBaseMetadata,
    Session, StoreKind, TemplateReader, TemplateStore, WorkingSet,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "elablite")]
#[command(about = "Experiment metadata templates, forms and export bundles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the format, fields and preset content of a template file
    Inspect {
        /// Template or preset (.json, .csv, .eln, .elablite)
        input: PathBuf,
    },

    /// Generate the form of a template and print committed values as JSON
    Form {
        /// Template or preset
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the export zip from a session and a folder of data files
    Export {
        /// Session: `.elablite` preset or working-set JSON
        #[arg(short, long)]
        session: PathBuf,

        /// Folder holding the data files
        #[arg(short, long)]
        files: Option<PathBuf>,

        /// One experiment for all analyses
        #[arg(short, long)]
        grouped: bool,

        /// Column used in generated filenames (repeatable)
        #[arg(short, long = "column")]
        columns: Vec<String>,

        /// Output zip (default: <YYYYMMDD>_experiences.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create or show `.elablite` presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Technique catalog
    Techniques {
        #[command(subcommand)]
        action: TechniqueAction,
    },

    /// Temporary template store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: ELABLITE_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// Save a template with base metadata and default form values
    Create {
        /// Template file
        template: PathBuf,

        #[arg(long)]
        title: String,

        #[arg(long)]
        author: String,

        /// Technique code
        #[arg(long)]
        technique: String,

        /// Experiment date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// CSV of per-analysis rows
        #[arg(long)]
        table: Option<PathBuf>,

        /// Output file (default: <YYYYMMDD>_<title>.elablite)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a preset as working-set JSON
    Show {
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum TechniqueAction {
    /// List all techniques
    List,

    /// Register a technique
    Add {
        code: String,

        /// English name
        english: String,

        /// French name
        #[arg(long, default_value = "")]
        french: String,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// List stored files, newest first
    List {
        #[arg(short, long, value_enum, default_value = "templates")]
        kind: KindArg,
    },

    /// Copy a template or preset into the store
    Add {
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Templates,
    Presets,
}

impl From<KindArg> for StoreKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Templates => StoreKind::Templates,
            KindArg::Presets => StoreKind::Presets,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match cli.command {
        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::Form { input, output } => cmd_form(&input, output.as_deref()),

        Commands::Export {
            session,
            files,
            grouped,
            columns,
            output,
        } => cmd_export(&session, files.as_deref(), grouped, &columns, output.as_deref()),

        Commands::Preset { action } => cmd_preset(action),

        Commands::Techniques { action } => cmd_techniques(action),

        Commands::Store { action } => cmd_store(action, &config),

        Commands::Serve { port } => cmd_serve(port.unwrap_or(config.port), &config).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());

    let reader = TemplateReader::open(input)?;
    eprintln!("   Format: {}", reader.format());

    let template = reader.read_metadata()?;
    template.validate()?;
    if template.is_empty() {
        eprintln!("   No field schema");
    } else {
        eprintln!("   Fields ({}):", template.extra_fields.len());
        for (name, config) in &template.extra_fields {
            println!(
                "     {:<24} {:<10} pos {:>3}  group {:>2}{}",
                name,
                config.field_type(name)?.as_str(),
                config.sort_position(),
                config.group_id.unwrap_or(0),
                if config.required { "  required" } else { "" }
            );
        }
    }

    let (base, form_data) = reader.read_preset();
    if let Some(base) = base {
        eprintln!("\n🧪 Experiment: {} ({}, {})", base.title, base.date, base.author);
        if let Some(code) = base.technique_code() {
            eprintln!("   Technique: {}", code);
        }
    }
    if let Some(form_data) = form_data {
        eprintln!("   {} committed form value(s)", form_data.len());
    }
    if let Some(table) = reader.read_dataframe() {
        eprintln!("\n📊 Table: {} row(s)", table.len());
        eprintln!("   Columns: {}", table.columns().join(", "));
    }

    Ok(())
}

fn cmd_form(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::new();
    session.load_template(input)?;
    let outcome = session.generate_form(&mut DefaultRenderer, false)?;

    for item in &outcome.items {
        match item {
            FormItem::Separator => eprintln!("   ────────────"),
            FormItem::Field(field) => eprintln!(
                "   {}{}: {}",
                field.label(),
                if field.required { " *" } else { "" },
                field.value.to_json()
            ),
        }
    }

    let missing = outcome.missing_required();
    if missing.is_empty() {
        eprintln!("✅ Form complete");
    } else {
        eprintln!("⚠️  Required field(s) empty: {}", missing.join(", "));
    }

    let json = serde_json::to_string_pretty(session.form_data())?;
    write_output(&json, output)
}

/// Load a session from a preset or working-set JSON.
fn load_session(path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let mut session = Session::new();
    if path.extension().and_then(|e| e.to_str()) == Some("elablite") {
        session.load_template(path)?;
    } else {
        let working_set: WorkingSet = serde_json::from_str(&fs::read_to_string(path)?)?;
        session.load_working_set(working_set)?;
    }
    Ok(session)
}

fn cmd_export(
    session_path: &Path,
    files_dir: Option<&Path>,
    grouped: bool,
    columns: &[String],
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📦 Exporting: {}", session_path.display());

    let mut session = load_session(session_path)?;
    session.set_grouped(grouped);

    if let Some(dir) = files_dir {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push((name.to_string(), fs::read(&path)?));
            }
        }
        eprintln!("   {} data file(s)", files.len());
        session.attach_files(files)?;
    }

    if !columns.is_empty() {
        if let Some(example) = session.validate_filenames(columns)? {
            eprintln!("   Filename example: {}", example);
        }
    }

    let bundle = session.export(None)?;
    let target = output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(&bundle.file_name));
    fs::write(&target, &bundle.bytes)?;
    eprintln!(
        "✅ {} row(s), {} file(s) → {}",
        bundle.csv_rows,
        bundle.file_count,
        target.display()
    );
    Ok(())
}

fn cmd_preset(action: PresetAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PresetAction::Create {
            template,
            title,
            author,
            technique: code,
            date,
            tags,
            table,
            output,
        } => {
            let option = technique(&code).ok_or_else(|| format!("Unknown technique: {}", code))?;
            let date = date.unwrap_or_else(elablite::form::today);

            let mut session = Session::new();
            session.load_template(&template)?;
            let mut base = ExperimentBaseMetadata::new(title, date, author).with_technique(option);
            for tag in tags {
                base.add_tag(tag);
            }
            session.set_base(base);
            session.generate_form(&mut DefaultRenderer, false)?;

            if let Some(csv_path) = table {
                let rows = TemplateReader::open(&csv_path)?
                    .read_dataframe()
                    .ok_or_else(|| format!("No rows in {}", csv_path.display()))?;
                eprintln!("   {} row(s) from {}", rows.len(), csv_path.display());
                *session.table_mut()? = rows;
            }

            let (name, bytes) = session.save_preset()?;
            let target = output.unwrap_or_else(|| PathBuf::from(name));
            fs::write(&target, &bytes)?;
            eprintln!("💾 Preset saved to: {}", target.display());
        }

        PresetAction::Show { input } => {
            let container = read_elablite(&fs::read(&input)?)?;
            let json = serde_json::to_string_pretty(&WorkingSet::from(container))?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn cmd_techniques(action: TechniqueAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TechniqueAction::List => {
            for option in techniques() {
                println!("  {:<12} {}", option.code, option.english_name);
            }
        }

        TechniqueAction::Add { code, english, french } => {
            let option = register_technique(&code, &french, &english)?;
            eprintln!("✅ Technique added: {} ({})", option.code, option.english_name);
        }
    }

    Ok(())
}

fn cmd_store(action: StoreAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = TemplateStore::from_config(config);

    match action {
        StoreAction::List { kind } => {
            let stored = store.list(kind.into())?;
            if stored.is_empty() {
                eprintln!("📋 Nothing stored in {}", store.root().display());
                return Ok(());
            }

            eprintln!("📋 Stored files ({}):\n", stored.len());
            for file in stored {
                println!("  📄 {} ({} bytes, {})", file.name, file.size, file.modified.format("%Y-%m-%d %H:%M"));
            }
        }

        StoreAction::Add { input } => {
            let name = input
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| format!("Invalid file name: {}", input.display()))?;
            let mut session = Session::new();
            session.upload_template(&store, name, &fs::read(&input)?)?;
            eprintln!("✅ Stored: {}", name);
        }
    }

    Ok(())
}

async fn cmd_serve(port: u16, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    elablite::server::start_server(port, TemplateStore::from_config(config)).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
