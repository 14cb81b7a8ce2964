use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use authorlink_core::{AppConfig, ConsolidatedAuthor, RunOutcome, SourceInput};
use authorlink_science::identifiers::scan_pdf;
use authorlink_science::{
    CancelFlag, ContributorDirectory, EnrichmentPipeline, OrcidRegistry, OsfDirectory,
    ResearcherRegistry, normalize,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "authorlink",
    about = "Resolve preprint authors to identifiers and emails",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Wrap output in a JSON envelope (for scripts).
    /// Also enabled by setting AUTHORLINK_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Skip every network lookup.
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every preprint of an input file into consolidated authors.
    Resolve {
        input: PathBuf,
        /// Write rows (or the `--json` envelope) here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// One JSON object per line.
        #[arg(long)]
        jsonl: bool,
    },

    /// Show the per-preprint mention batches an input file normalizes to.
    Normalize { input: PathBuf },

    /// List candidate emails and ORCID iDs found in a PDF.
    ExtractPdf { file: PathBuf },

    /// Query an external source directly.
    Lookup {
        #[command(subcommand)]
        action: LookupAction,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum LookupAction {
    /// Registry record for an ORCID iD.
    Orcid { id: String },
    /// Platform profile for a contributor id.
    Contributor { id: String },
    /// Registry candidates for a name.
    Name {
        #[arg(long)]
        family: String,
        #[arg(long, default_value = "")]
        given: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file location.
    Path,
    /// Write the default configuration to the config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "authorlink=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let json_output = cli.json || std::env::var("AUTHORLINK_JSON").as_deref() == Ok("1");

    let mut config = AppConfig::load().context("failed to load config")?;
    if cli.offline {
        config.pipeline.offline = true;
    }

    match cli.command {
        Commands::Resolve {
            input,
            output,
            jsonl,
        } => {
            let input = read_input(&input)?;
            let pipeline = EnrichmentPipeline::from_config(&config)?;

            let cancel = CancelFlag::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, finishing in-flight preprint");
                    on_signal.cancel();
                }
            });

            let report = pipeline.run(&input, &cancel).await;
            let dur = start.elapsed().as_millis();

            if json_output {
                let envelope = serde_json::json!({
                    "status": "ok",
                    "data": report,
                    "meta": { "duration_ms": dur }
                });
                match &output {
                    Some(path) => write_json(path, &envelope)?,
                    None => print_json(&envelope)?,
                }
            } else {
                match &output {
                    Some(path) => {
                        let file = File::create(path)
                            .with_context(|| format!("cannot create {}", path.display()))?;
                        write_rows(BufWriter::new(file), &report.authors, jsonl)?;
                    }
                    None => write_rows(std::io::stdout().lock(), &report.authors, jsonl)?,
                }
                let s = &report.stats;
                eprintln!(
                    "{} authors from {}/{} preprints ({} identifiers, {} emails, {} conflicts, {} notes)",
                    report.authors.len(),
                    s.preprints_completed,
                    s.preprints_total,
                    s.identifiers_resolved,
                    s.emails_resolved,
                    s.conflicts,
                    report.notes.len(),
                );
                for note in &report.notes {
                    eprintln!("  {}: {}", note.preprint_id, note.message);
                }
            }

            match report.outcome {
                RunOutcome::Completed => {}
                RunOutcome::Cancelled => {
                    eprintln!("Run cancelled; rows of finished preprints were kept.");
                    std::process::exit(130);
                }
                RunOutcome::Aborted { reason } => {
                    eprintln!("Run aborted: {reason}");
                    std::process::exit(3);
                }
            }
        }

        Commands::Normalize { input } => {
            let input = read_input(&input)?;
            let normalized = normalize(&input);
            let dur = start.elapsed().as_millis();
            let notes: Vec<serde_json::Value> = normalized
                .notes
                .iter()
                .map(|(id, msg)| serde_json::json!({ "preprint_id": id, "message": msg }))
                .collect();
            let data = serde_json::json!({
                "batches": normalized.batches,
                "malformed_dropped": normalized.malformed_dropped,
                "notes": notes,
            });
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":data,"meta":{"duration_ms":dur}}))?;
            } else {
                print_json(&data)?;
            }
        }

        Commands::ExtractPdf { file } => {
            let scan = scan_pdf(&file).with_context(|| format!("cannot read {}", file.display()))?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":scan,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Emails ({}):", scan.emails.len());
                for email in &scan.emails {
                    println!("  {email}");
                }
                println!("ORCID iDs ({}):", scan.orcids.len());
                for orcid in &scan.orcids {
                    println!("  {orcid}");
                }
            }
        }

        Commands::Lookup { action } => {
            if config.pipeline.offline {
                eprintln!("Lookups need the network; drop --offline.");
                std::process::exit(1);
            }
            let user_agent = config.user_agent();
            let found: std::result::Result<serde_json::Value, authorlink_science::ScienceError> =
                match action {
                    LookupAction::Orcid { id } => {
                        let registry = OrcidRegistry::new(&config.registry, &user_agent)?;
                        registry.person(&id).await.and_then(to_value)
                    }
                    LookupAction::Contributor { id } => {
                        let directory = OsfDirectory::new(&config.platform, &user_agent)?;
                        directory.contributor(&id).await.and_then(to_value)
                    }
                    LookupAction::Name { family, given } => {
                        let registry = OrcidRegistry::new(&config.registry, &user_agent)?;
                        registry
                            .search_by_name(&family, &given)
                            .await
                            .and_then(to_value)
                    }
                };
            let dur = start.elapsed().as_millis();

            match found {
                Ok(data) => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":data,"meta":{"duration_ms":dur}}))?;
                    } else {
                        print_json(&data)?;
                    }
                }
                Err(err) if err.is_not_found() => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"error","error":"not_found","message":err.to_string(),"meta":{"duration_ms":dur}}))?;
                    } else {
                        eprintln!("Not found: {err}");
                    }
                    std::process::exit(2);
                }
                Err(err) => return Err(err.into()),
            }
        }

        // ── Config ─────────────────────────────────────────────────────────

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::Show => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":config,"meta":{"duration_ms":dur}}))?;
                    } else {
                        print!("{}", toml_string(&config)?);
                    }
                }
                ConfigAction::Path => {
                    let path = AppConfig::config_path();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":path,"exists":path.exists()},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    let path = AppConfig::config_path();
                    if path.exists() && !force {
                        eprintln!("{} already exists. Add --force to overwrite.", path.display());
                        std::process::exit(8);
                    }
                    AppConfig::default().save_to(&path)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":path},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("Wrote {}", path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn write_json(path: &Path, val: &serde_json::Value) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, val)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn read_input(path: &Path) -> Result<SourceInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a valid input file", path.display()))
}

fn write_rows(mut out: impl Write, rows: &[ConsolidatedAuthor], jsonl: bool) -> Result<()> {
    if jsonl {
        for row in rows {
            serde_json::to_writer(&mut out, row)?;
            writeln!(out)?;
        }
    } else {
        serde_json::to_writer_pretty(&mut out, rows)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn to_value<T: Serialize>(value: T) -> authorlink_science::Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| authorlink_science::ScienceError::Parse(e.to_string()))
}

fn toml_string(config: &AppConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
