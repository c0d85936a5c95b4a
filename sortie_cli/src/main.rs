use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use sortie_optimizer::json::types::{JsonCheckpoint, JsonMissionRequest, JsonSolverParams};
use tracing::debug;
use uuid::Uuid;

use crate::{
    command::MissionCommand,
    file_utils::{read_json, write_json},
    mission_store::FileMissionStore,
    orchestrator::{CommandOutcome, Orchestrator},
    schema::SchemaSubcommands,
};

mod command;
mod file_utils;
mod mission_store;
mod orchestrator;
mod parsers;
mod report;
mod schema;

#[cfg(test)]
mod test_utils;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const STORE_FOLDER_ENV_VAR: &str = "SORTIE_STORE_FOLDER";

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long)]
    debug: bool,

    /// Folder holding the missions, defaults to $SORTIE_STORE_FOLDER or ./missions
    #[arg(long)]
    store: Option<PathBuf>,

    /// Print missions as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solves a mission request and stores the result
    Solve {
        #[arg(short, long)]
        input: PathBuf,

        /// Time limit of the exact search per vehicle (e.g. "10s", "PT1M")
        #[arg(long, value_parser = parsers::parse_duration)]
        exact_time_limit: Option<jiff::SignedDuration>,

        /// "auto" or a number of threads
        #[arg(long, value_parser = parsers::parse_threads)]
        threads: Option<usize>,
    },
    /// Runs the post-optimizer again on a stored mission
    Optimize {
        mission_id: Uuid,

        /// JSON file overriding the mission's solver parameters
        #[arg(short, long)]
        params: Option<PathBuf>,
    },
    /// Replans the rest of a stored mission from a checkpoint file
    Replan {
        mission_id: Uuid,

        #[arg(short, long)]
        checkpoint: PathBuf,
    },
    #[command(visible_alias = "ls")]
    List,
    Show {
        mission_id: Uuid,

        /// Writes the solution JSON to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Executes a JSON mission command
    Run {
        #[arg(short, long)]
        input: PathBuf,
    },
    Schema {
        #[command(subcommand)]
        commands: SchemaSubcommands,
    },
}

fn store_folder(cli_folder: Option<PathBuf>) -> PathBuf {
    cli_folder
        .or_else(|| std::env::var(STORE_FOLDER_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("missions"))
}

fn print_outcome(outcome: &CommandOutcome, json: bool) -> Result<(), anyhow::Error> {
    match outcome {
        CommandOutcome::Mission(record) if json => {
            println!("{}", serde_json::to_string_pretty(record)?)
        }
        CommandOutcome::Mission(record) => println!("{}", report::mission_report(record)),
        CommandOutcome::Missions(records) if json => {
            println!("{}", serde_json::to_string_pretty(records)?)
        }
        CommandOutcome::Missions(records) => println!("{}", report::missions_table(records)),
    }

    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let show_out = match &cli.command {
        Some(Commands::Show { out, .. }) => out.clone(),
        _ => None,
    };

    let command = match cli.command {
        Some(Commands::Schema { commands }) => return schema::run(commands),
        Some(Commands::Solve {
            input,
            exact_time_limit,
            threads,
        }) => {
            let mut request: JsonMissionRequest = read_json(&input)?;
            if exact_time_limit.is_some() || threads.is_some() {
                let params = request.params.get_or_insert_with(JsonSolverParams::default);
                if exact_time_limit.is_some() {
                    params.exact_time_limit = exact_time_limit;
                }
                if threads.is_some() {
                    params.solver_threads = threads;
                }
            }

            MissionCommand::Solve { request }
        }
        Some(Commands::Optimize { mission_id, params }) => MissionCommand::Optimize {
            mission_id,
            params: params.as_deref().map(read_json).transpose()?,
        },
        Some(Commands::Replan {
            mission_id,
            checkpoint,
        }) => MissionCommand::Replan {
            mission_id,
            checkpoint: read_json::<JsonCheckpoint>(&checkpoint)?,
        },
        Some(Commands::List) => MissionCommand::List,
        Some(Commands::Show { mission_id, .. }) => MissionCommand::Show { mission_id },
        Some(Commands::Run { input }) => read_json(&input)?,
        None => return Ok(()),
    };

    let store = FileMissionStore::new(store_folder(cli.store))?;
    debug!(folder = %store.folder().display(), "Using mission store");

    let outcome = Orchestrator::new(store).execute(command)?;

    if let (Some(out), CommandOutcome::Mission(record)) = (&show_out, &outcome) {
        write_json(out, &record.solution)?;
    }

    print_outcome(&outcome, cli.json)
}
