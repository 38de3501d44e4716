use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault_core::{
    resolve_config, ConfigValues, GalleryChild, MediaRecord, NonEmptyText, SearchQuery,
    VaultService,
};

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Media vault CLI")]
struct Cli {
    /// Data directory (overrides VAULT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Name recorded as the acting user
    #[arg(long, global = true, default_value = "cli")]
    user: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file as a new record
    Put {
        /// File to upload
        path: PathBuf,
        /// Title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// MIME type (detected from the content when omitted)
        #[arg(long)]
        mime: Option<String>,
        /// Tag to attach; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Write a record's content to a file or stdout
    Get {
        id: String,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a record as JSON, with gallery children resolved
    Show { id: String },
    /// Move a record to the trash
    Rm { id: String },
    /// List active records
    Ls,
    /// List records in the trash
    Trash,
    /// Permanently purge the trash
    EmptyTrash,
    /// Search active records
    Search {
        text: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn print_record(record: &MediaRecord) {
    println!(
        "ID: {}, Title: {}, Type: {}, Size: {}, Modified: {}",
        record.id_str(),
        record.title,
        record.mime_type,
        record.size,
        record
            .modification_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".into())
    );
}

fn print_records(records: &[MediaRecord], empty: &str) {
    if records.is_empty() {
        println!("{}", empty);
    }
    for record in records {
        print_record(record);
    }
}

fn open_vault(data_dir: Option<PathBuf>) -> anyhow::Result<VaultService> {
    let mut values = ConfigValues::from_lookup(|key| std::env::var(key).ok());
    if let Some(dir) = data_dir {
        values.data_dir = Some(dir.display().to_string());
    }
    let cfg = resolve_config(values)?;
    Ok(VaultService::open(&cfg)?)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vault=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'vault --help' for commands");
        return Ok(());
    };

    let vault = open_vault(cli.data_dir)?;
    let user = cli.user;

    match command {
        Commands::Put {
            path,
            title,
            mime,
            tags,
        } => {
            let bytes = std::fs::read(&path)?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let mut record = MediaRecord::new(
                title.unwrap_or_else(|| filename.clone()),
                filename,
                mime.unwrap_or_default(),
            );
            for tag in tags {
                record.tags.insert(NonEmptyText::new(&tag)?);
            }

            match vault.create(record, Some(bytes.as_slice()), &user) {
                Ok(created) => println!("Stored record with ID: {}", created.id_str()),
                Err(e) => eprintln!("Error storing {}: {}", path.display(), e),
            }
        }
        Commands::Get { id, out } => match vault.content(&id)? {
            Some((record, bytes)) => match out {
                Some(out) => {
                    std::fs::write(&out, &bytes)?;
                    println!("Wrote {} bytes of '{}' to {}", bytes.len(), record.title, out.display());
                }
                None => std::io::stdout().write_all(&bytes)?,
            },
            None => eprintln!("No content stored for record {}", id),
        },
        Commands::Show { id } => {
            let view = vault.read(&id)?;
            println!("{}", serde_json::to_string_pretty(&view.record)?);
            for child in &view.children {
                match child {
                    GalleryChild::Current(record) => {
                        print!("  child ");
                        print_record(record);
                    }
                    GalleryChild::Missing { id } => println!("  child {} (missing)", id),
                }
            }
        }
        Commands::Rm { id } => match vault.delete(&id, &user) {
            Ok(_) => println!("Moved record {} to trash", id),
            Err(e) => eprintln!("Error deleting {}: {}", id, e),
        },
        Commands::Ls => print_records(&vault.list_active()?, "No records found."),
        Commands::Trash => print_records(&vault.list_trash()?, "Trash is empty."),
        Commands::EmptyTrash => {
            let purged = vault.empty_trash(&user)?;
            println!("Purged {} record(s) from trash", purged);
        }
        Commands::Search { text, limit } => {
            let mut query = SearchQuery::text(text);
            if let Some(limit) = limit {
                query.limit = limit;
            }
            print_records(&vault.search(&query, &user)?, "No matches.");
        }
    }

    Ok(())
}
