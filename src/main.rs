use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser, Debug)]
#[command(name = "spedc", version, about = "ICMS incentive calculator for SPED fiscal files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate the incentive for one or more periods
    Calculate(cmd::calculate::CalculateCommand),
    /// List generic CFOPs and adjustment codes waiting for a decision
    Pending(cmd::pending::PendingCommand),
    /// Check the structure of SPED files
    Validate(cmd::validate::ValidateCommand),
    /// Print the record layouts the reader understands
    Layout(cmd::layout::LayoutCommand),
    /// Print the JSON Schema of the resolutions file
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Calculate(calculate) => calculate.exec(),
        Command::Pending(pending) => pending.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Layout(layout) => layout.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
