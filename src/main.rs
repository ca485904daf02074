use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use opsreport::ingest::ReportKind;
use opsreport::reconcile::ImportSummary;
use opsreport::{config, connect_store, import_file, observability, run};

#[derive(Parser)]
#[command(name = "opsreport", about = "opsreport - Excel-fed operations reporting service")]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
	Categorizations,
	WarRooms,
	RequestTags,
}

impl From<Kind> for ReportKind {
	fn from(k: Kind) -> Self {
		match k {
			Kind::Categorizations => ReportKind::Categorizations,
			Kind::WarRooms => ReportKind::WarRooms,
			Kind::RequestTags => ReportKind::RequestTags,
		}
	}
}

#[derive(Subcommand)]
enum Commands {
	/// Run the HTTP API (default)
	Serve {
		/// Keep data in process memory instead of PostgreSQL
		#[arg(long)]
		in_memory: bool,
	},
	/// Apply database migrations and exit
	Migrate,
	/// Import a workbook from disk
	Import {
		#[arg(value_enum)]
		kind: Kind,
		path: PathBuf,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let settings = match config::load() {
		Ok(s) => s,
		Err(e) => {
			eprintln!("failed to load config, using defaults: {}", e);
			config::Settings::default()
		}
	};
	let obs = observability::init_observability(settings.log_level)?;

	match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
		Commands::Serve { in_memory } => run(settings, in_memory, obs.metrics).await,
		Commands::Migrate => {
			connect_store(&settings).await?;
			log::info!("migrations applied");
			Ok(())
		}
		Commands::Import { kind, path } => {
			let store = connect_store(&settings).await?;
			let summary =
				import_file(&store, kind.into(), &path, settings.insert_batch_size).await?;
			match summary {
				ImportSummary::Upserted { outcome, total } => println!(
					"{}: {} created, {} updated, {} rows parsed",
					path.display(),
					outcome.created,
					outcome.updated,
					total
				),
				ImportSummary::Replaced { imported, total } => {
					println!("{}: {} of {} rows imported", path.display(), imported, total)
				}
			}
			Ok(())
		}
	}
}
