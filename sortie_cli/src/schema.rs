use std::path::PathBuf;

use clap::Subcommand;
use sortie_optimizer::json::schema::{
    generate_checkpoint_schema, generate_json_schema, generate_solution_schema,
};

#[derive(Subcommand)]
pub enum SchemaSubcommands {
    /// Mission request accepted by `solve`
    Request {
        #[arg(long, short = 'o')]
        out: PathBuf,
    },
    Solution {
        #[arg(long, short = 'o')]
        out: PathBuf,
    },
    Checkpoint {
        #[arg(long, short = 'o')]
        out: PathBuf,
    },
}

pub fn run(subcommand: SchemaSubcommands) -> Result<(), anyhow::Error> {
    let (schema, out) = match subcommand {
        SchemaSubcommands::Request { out } => (generate_json_schema()?, out),
        SchemaSubcommands::Solution { out } => (generate_solution_schema()?, out),
        SchemaSubcommands::Checkpoint { out } => (generate_checkpoint_schema()?, out),
    };

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(out, schema)?;

    Ok(())
}
