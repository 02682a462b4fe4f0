//! Command-line argument parsing

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imgcheck")]
#[command(about = "Discover image checks and inspect container images")]
#[command(version, author)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(
        long = "verbose",
        short = 'v',
        global = true,
        help = "Enable verbose output and debug diagnostics"
    )]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        conflicts_with = "verbose",
        help = "Only print errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List checks discovered under the given directories
    Checks(ChecksArgs),
    /// Acquire an image and report its metadata
    Inspect(InspectArgs),
}

#[derive(ClapArgs, Debug)]
pub struct ChecksArgs {
    #[arg(
        long = "path",
        short = 'p',
        required = true,
        num_args = 1..,
        help = "Directory to scan for *.check units (repeatable)"
    )]
    pub paths: Vec<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct InspectArgs {
    /// Image reference, or archive path with --archive
    pub target: String,

    #[arg(long = "pull", help = "Pull from the registry instead of the local docker daemon")]
    pub pull: bool,

    #[arg(
        long = "insecure",
        short = 'k',
        help = "Use plain HTTP and skip TLS verification towards the registry"
    )]
    pub insecure: bool,

    #[arg(
        long = "archive",
        short = 'a',
        conflicts_with = "pull",
        help = "Treat the target as a docker-archive tarball"
    )]
    pub archive: bool,

    #[arg(
        long = "file",
        short = 'f',
        help = "Report whether this path exists inside the image (repeatable)"
    )]
    pub files: Vec<String>,

    #[arg(long = "keep", help = "Leave the staging directory in place")]
    pub keep: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Checks(_) => Ok(()),
            Command::Inspect(inspect) => {
                if inspect.target.trim().is_empty() {
                    return Err("Target must not be empty".to_string());
                }
                if inspect.archive && !std::path::Path::new(&inspect.target).is_file() {
                    return Err(format!("Archive does not exist: {}", inspect.target));
                }
                if let Some(file) = inspect.files.iter().find(|f| f.is_empty()) {
                    return Err(format!("Invalid file path: '{}'", file));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_flags_parse() {
        let args = Args::try_parse_from([
            "imgcheck", "inspect", "quay.io/acme/widget:v2", "--pull", "-k", "-f", "/etc/os-release",
            "-f", "/help.1", "--keep",
        ])
        .unwrap();
        let Command::Inspect(inspect) = args.command else {
            panic!("expected inspect");
        };
        assert!(inspect.pull && inspect.insecure && inspect.keep);
        assert!(!inspect.archive);
        assert_eq!(inspect.files, vec!["/etc/os-release", "/help.1"]);
    }

    #[test]
    fn archive_conflicts_with_pull() {
        assert!(Args::try_parse_from(["imgcheck", "inspect", "x.tar", "--archive", "--pull"]).is_err());
    }

    #[test]
    fn checks_requires_a_path() {
        assert!(Args::try_parse_from(["imgcheck", "checks"]).is_err());
        let args = Args::try_parse_from(["imgcheck", "-v", "checks", "-p", "a", "b"]).unwrap();
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Checks(c) if c.paths.len() == 2));
    }

    #[test]
    fn missing_archive_fails_validation() {
        let args =
            Args::try_parse_from(["imgcheck", "inspect", "/nonexistent/image.tar", "--archive"]).unwrap();
        assert!(args.validate().is_err());
    }
}
