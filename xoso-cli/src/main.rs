mod dataset;
mod display;
mod import;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use xoso_db::db::{count_draws, data_dir, db_path, latest_date, open_db};
use xoso_db::models::{Draw, Game, Session, validate_draw};
use xoso_db::store::{HistoryStore, SqliteStore};
use xoso_engine::config::EngineConfig;
use xoso_engine::engine::{load_histories, run_daily};
use xoso_engine::mode::local_now;
use xoso_engine::record::{load_record, record_path, save_record};

use crate::display::{display_draws, display_import_summary, display_record};

#[derive(Parser)]
#[command(name = "xoso", about = "Pronostics quotidiens des loteries vietnamiennes")]
struct Cli {
    /// Répertoire des données (par défaut : ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Fichier de configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Calculer les pronostics du jour et fusionner les derniers résultats
    Run {
        /// Instant d'exécution (RFC 3339), par défaut maintenant
        #[arg(long)]
        at: Option<String>,
    },

    /// Importer les tirages d'un jeu depuis un fichier CSV
    Import {
        #[arg(short, long)]
        game: Game,

        /// Chemin vers le fichier CSV
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Ajouter un tirage manuellement
    Add {
        #[arg(short, long)]
        game: Game,

        /// Date (AAAA-MM-JJ ou JJ/MM/AAAA)
        #[arg(short, long)]
        date: String,

        /// Numéros séparés par des virgules
        #[arg(short, long)]
        numbers: String,

        /// Numéro spécial (Power, Lotto 5/35)
        #[arg(long)]
        special: Option<String>,

        /// Séance 13 ou 21 (Lotto 5/35)
        #[arg(long)]
        session: Option<String>,

        #[arg(long, default_value = "manual")]
        source: String,
    },

    /// Lister les derniers tirages d'un jeu
    History {
        #[arg(short, long)]
        game: Game,

        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: usize,
    },

    /// Afficher le dernier fichier de pronostics
    Show,

    /// Exporter le jeu de données XSMB (long format) pour l'apprentissage
    ExportDataset {
        /// Fichier de sortie (par défaut : <data>/dataset_ml.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Afficher le répertoire des données
    DataDir,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,xoso=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let dir = cli.data_dir.unwrap_or_else(data_dir);
    let config = EngineConfig::load_or_default(cli.config.as_deref());

    match cli.command {
        Command::DataDir => {
            println!("{}", dir.display());
            Ok(())
        }
        Command::Show => cmd_show(&dir),
        Command::Run { at } => cmd_run(&open_store(&dir, &config)?, &dir, at.as_deref(), &config),
        Command::Import { game, file } => cmd_import(&open_store(&dir, &config)?, game, &file),
        Command::Add {
            game,
            date,
            numbers,
            special,
            session,
            source,
        } => {
            let draw = build_draw(game, &date, &numbers, special.as_deref(), session.as_deref(), source)?;
            cmd_add(&open_store(&dir, &config)?, game, draw)
        }
        Command::History { game, last } => cmd_history(&open_store(&dir, &config)?, game, last),
        Command::ExportDataset { output } => {
            let output = output.unwrap_or_else(|| dir.join("dataset_ml.csv"));
            cmd_export_dataset(&open_store(&dir, &config)?, &output)
        }
    }
}

fn open_store(dir: &Path, config: &EngineConfig) -> Result<SqliteStore> {
    let conn = open_db(&db_path(dir))?;
    SqliteStore::new(conn, config.history_caps)
}

fn parse_now(at: Option<&str>, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    match at {
        None => Ok(local_now(offset)),
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("Instant invalide (RFC 3339 attendu) : '{}'", raw))?;
            Ok(parsed.with_timezone(&offset))
        }
    }
}

fn cmd_run(store: &dyn HistoryStore, dir: &Path, at: Option<&str>, config: &EngineConfig) -> Result<()> {
    let now = parse_now(at, config.offset()?)?;
    let histories = load_histories(store, &config.history_caps);

    let path = record_path(dir);
    let record = run_daily(&histories, load_record(&path), now, config);
    save_record(&path, &record)?;
    info!(path = %path.display(), mode = %record.mode, "pronostics enregistrés");

    display_record(&record);
    Ok(())
}

fn cmd_show(dir: &Path) -> Result<()> {
    let path = record_path(dir);
    match load_record(&path) {
        Some(record) => display_record(&record),
        None => println!("Aucun pronostic enregistré. Lancez d'abord : xoso run"),
    }
    Ok(())
}

fn cmd_import(store: &dyn HistoryStore, game: Game, file: &Path) -> Result<()> {
    let result = import::import_csv(store, game, file)?;
    info!(game = game.id(), inserted = result.inserted, "import terminé");
    display_import_summary(&result);
    Ok(())
}

fn build_draw(
    game: Game,
    date: &str,
    numbers: &str,
    special: Option<&str>,
    session: Option<&str>,
    source: String,
) -> Result<Draw> {
    let date: NaiveDate = import::parse_date(date)?;
    let numbers = numbers
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| game.domain().normalize(s))
        .collect::<Result<Vec<_>>>()?;

    let special = match (special, game.special_domain()) {
        (Some(sp), Some(domain)) => Some(domain.normalize(sp)?),
        (Some(sp), None) => bail!("{} : pas de numéro spécial ({} reçu)", game.label(), sp),
        (None, _) => None,
    };
    let session = session.map(str::parse::<Session>).transpose()?;

    let draw = Draw {
        date,
        session,
        numbers,
        special,
        source,
    };
    validate_draw(game, &draw)?;
    Ok(draw)
}

fn cmd_add(store: &dyn HistoryStore, game: Game, draw: Draw) -> Result<()> {
    println!("Tirage à insérer :");
    display_draws(std::slice::from_ref(&draw));

    if store.append(game, &draw)? {
        println!("Tirage inséré avec succès.");
    } else {
        println!("Ce tirage existe déjà (doublon ignoré).");
    }
    Ok(())
}

fn cmd_history(store: &SqliteStore, game: Game, last: usize) -> Result<()> {
    let conn = store.connection();
    let n = count_draws(conn, game)?;
    if n == 0 {
        println!("Aucun tirage {}. Lancez d'abord : xoso import --game {}", game.label(), game.id());
        return Ok(());
    }
    if let Some(latest) = latest_date(conn, game)? {
        println!("{} : {} tirage(s) conservé(s), dernier le {}\n", game.label(), n, latest);
    }
    let history = store.load(game)?;
    display_draws(history.tail(last));
    Ok(())
}

fn cmd_export_dataset(store: &dyn HistoryStore, output: &Path) -> Result<()> {
    let history = store.load(Game::Xsmb)?;
    let rows = dataset::export_dataset(history.draws(), output)?;
    println!("{} lignes écrites dans {}", rows, output.display());
    Ok(())
}
