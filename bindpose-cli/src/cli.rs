//! Root CLI structure for bindpose

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bindpose")]
#[command(about = "Resolve skeletal bind poses and pack GPU skinning buffers", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display an armature's bone hierarchy as a tree
    Tree(crate::commands::tree::TreeArgs),

    /// Resolve world-space bind poses for an action
    Resolve(crate::commands::resolve::ResolveArgs),

    /// Pack skinning buffers for a mesh and write them as JSON
    Pack(crate::commands::pack::PackArgs),

    /// Step the playback clock and show the offset record per tick
    Play(crate::commands::play::PlayArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["bindpose", "-vv", "tree", "armature.json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}
