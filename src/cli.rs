//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the macOS provisioning engine.
#[derive(Parser, Debug)]
#[command(
    name = "macprov",
    about = "Install packages from disk images and query the system inventory",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to $MACPROV_CONFIG, then /Library/Preferences/macprov.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a package from a local or remote disk image
    Install(InstallOpts),
    /// Download a URL to a file
    Fetch(FetchOpts),
    /// Attach a disk image and print its mount point
    Mount(MountOpts),
    /// Eject a mounted disk image
    Eject(VolumeOpts),
    /// Unmount a volume
    Unmount(VolumeOpts),
    /// Install a flat package directly
    Pkg(PkgOpts),
    /// Install a configuration profile
    Profile(ProfileOpts),
    /// Query the cached system inventory
    #[command(subcommand)]
    Inventory(InventoryCommand),
    /// Print `laptop` or `desktop`
    HostKind,
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Short name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Install(_) => "install",
            Self::Fetch(_) => "fetch",
            Self::Mount(_) => "mount",
            Self::Eject(_) => "eject",
            Self::Unmount(_) => "unmount",
            Self::Pkg(_) => "pkg",
            Self::Profile(_) => "profile",
            Self::Inventory(_) => "inventory",
            Self::HostKind => "host-kind",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Options shared by commands that download.
#[derive(Parser, Debug, Clone, Default)]
pub struct TransferOpts {
    /// Expected SHA-256 of the download (hex)
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Show transfer diagnostics
    #[arg(long)]
    pub verbose_transfer: bool,
}

/// Options for the `install` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct InstallOpts {
    /// Disk image path or http/https/ftp URL
    pub source: String,

    /// Package path relative to the image root
    pub package: PathBuf,

    /// Install target volume
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Download options.
    #[command(flatten)]
    pub transfer: TransferOpts,
}

/// Options for the `fetch` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct FetchOpts {
    /// URL to download
    pub url: String,

    /// Destination file (a temporary file is kept when omitted)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Download options.
    #[command(flatten)]
    pub transfer: TransferOpts,
}

/// Options for the `mount` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct MountOpts {
    /// Disk image to attach
    pub image: PathBuf,

    /// Directory to mount on (a temporary directory when omitted)
    #[arg(long, value_name = "DIR")]
    pub mountpoint: Option<PathBuf>,
}

/// Options for the `eject` and `unmount` subcommands.
#[derive(Parser, Debug, Clone)]
pub struct VolumeOpts {
    /// Mount point of the volume
    pub mount_point: PathBuf,
}

/// Options for the `pkg` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct PkgOpts {
    /// Package file
    pub package: PathBuf,

    /// Install target volume
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,
}

/// Options for the `profile` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ProfileOpts {
    /// Configuration profile (.mobileconfig)
    pub path: PathBuf,
}

/// `inventory` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum InventoryCommand {
    /// List the categories the profiler supports
    Types,
    /// Print every record of a category
    Get {
        /// Category name, e.g. Hardware or SPHardwareDataType
        category: String,
        /// Print JSON instead of one line per field
        #[arg(long)]
        json: bool,
    },
    /// Print one field of the first record
    Field {
        /// Category name
        category: String,
        /// Field name
        field: String,
    },
    /// Print records whose field contains a substring
    Find {
        /// Category name
        category: String,
        /// Field name
        field: String,
        /// Text to look for
        substring: String,
    },
    /// List the field names of the first record
    Keys {
        /// Category name
        category: String,
    },
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_install_local_image() {
        let cli = Cli::parse_from(["macprov", "install", "/tmp/pkg.dmg", "Installer.pkg"]);
        let Command::Install(opts) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(opts.source, "/tmp/pkg.dmg");
        assert_eq!(opts.package, PathBuf::from("Installer.pkg"));
        assert_eq!(opts.target, None);
        assert!(!opts.transfer.verbose_transfer);
    }

    #[test]
    fn parse_install_with_transfer_options() {
        let cli = Cli::parse_from([
            "macprov",
            "install",
            "https://example.com/Tool.dmg",
            "Tool.pkg",
            "--target",
            "/Volumes/Data",
            "--sha256",
            "abc123",
            "--verbose-transfer",
        ]);
        let Command::Install(opts) = cli.command else {
            panic!("expected install");
        };
        insta::assert_debug_snapshot!(opts, @r#"
        InstallOpts {
            source: "https://example.com/Tool.dmg",
            package: "Tool.pkg",
            target: Some(
                "/Volumes/Data",
            ),
            transfer: TransferOpts {
                sha256: Some(
                    "abc123",
                ),
                verbose_transfer: true,
            },
        }
        "#);
    }

    #[test]
    fn parse_inventory_find() {
        let cli = Cli::parse_from([
            "macprov",
            "inventory",
            "find",
            "Applications",
            "path",
            "/Applications/",
        ]);
        let Command::Inventory(sub) = cli.command else {
            panic!("expected inventory");
        };
        insta::assert_debug_snapshot!(sub, @r#"
        Find {
            category: "Applications",
            field: "path",
            substring: "/Applications/",
        }
        "#);
    }

    #[test]
    fn parse_inventory_get_json() {
        let cli = Cli::parse_from(["macprov", "inventory", "get", "Hardware", "--json"]);
        assert!(matches!(
            cli.command,
            Command::Inventory(InventoryCommand::Get { json: true, .. })
        ));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["macprov", "host-kind", "-v", "--config", "/tmp/m.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
        assert_eq!(cli.command.name(), "host-kind");
    }

    #[test]
    fn parse_mount_and_eject() {
        let cli = Cli::parse_from(["macprov", "mount", "/tmp/a.dmg", "--mountpoint", "/tmp/mnt"]);
        let Command::Mount(opts) = cli.command else {
            panic!("expected mount");
        };
        assert_eq!(opts.mountpoint, Some(PathBuf::from("/tmp/mnt")));

        let cli = Cli::parse_from(["macprov", "eject", "/tmp/mnt"]);
        assert!(matches!(cli.command, Command::Eject(_)));
    }

    #[test]
    fn parse_completions_shell() {
        let cli = Cli::parse_from(["macprov", "completions", "zsh"]);
        let Command::Completions(opts) = cli.command else {
            panic!("expected completions");
        };
        assert_eq!(opts.shell, clap_complete::Shell::Zsh);
        assert!(Cli::try_parse_from(["macprov", "completions", "tcsh"]).is_err());
    }

    #[test]
    fn install_requires_package() {
        assert!(Cli::try_parse_from(["macprov", "install", "/tmp/pkg.dmg"]).is_err());
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["macprov", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }
}
