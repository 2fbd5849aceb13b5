use clap::{Args, Parser, Subcommand, ValueEnum};

use drivekit_core::VendorId;

/// Uniform command-line access to the supported vendor APIs.
#[derive(Debug, Parser)]
#[command(name = "drivekit", version, about = "Vendor API driver toolkit")]
pub struct Cli {
    /// Vendor to talk to.
    #[arg(long, value_enum, global = true, default_value = "stripe")]
    pub vendor: VendorArg,

    /// Pretty-print the JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show what the vendor driver supports.
    Capabilities,
    /// List the object types the driver can read.
    Objects,
    /// Show the field schema for one object type.
    Fields(FieldsArgs),
    /// Run a query and print the matching records.
    Read(ReadArgs),
    /// Create a record.
    Create(WriteArgs),
    /// Update a record by id.
    Update(UpdateArgs),
    /// Delete a record by id.
    Delete(DeleteArgs),
    /// Show the local rate budget for the vendor.
    RateLimit,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// Object type to describe.
    pub object: String,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Vendor query: an object name for REST drivers, a search domain for
    /// query-language drivers.
    pub query: String,

    /// Maximum number of records to return.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Number of records to skip.
    #[arg(long)]
    pub offset: Option<usize>,

    /// Read every page of the result set.
    #[arg(long, conflicts_with_all = ["limit", "offset"])]
    pub all: bool,

    /// Page size used with --all.
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Object type to create.
    pub object: String,

    /// Record body as a JSON object.
    #[arg(long)]
    pub data: String,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Object type to update.
    pub object: String,

    /// Record identifier.
    pub id: String,

    /// Changed fields as a JSON object.
    #[arg(long)]
    pub data: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Object type to delete from.
    pub object: String,

    /// Record identifier.
    pub id: String,
}

/// Vendor selector mirroring `VendorId`, kept separate so clap derives
/// stay out of the core crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VendorArg {
    Amplitude,
    Apify,
    Fidoo,
    Mpohoda,
    Odoo,
    Posthog,
    Stripe,
}

impl From<VendorArg> for VendorId {
    fn from(value: VendorArg) -> Self {
        match value {
            VendorArg::Amplitude => Self::Amplitude,
            VendorArg::Apify => Self::Apify,
            VendorArg::Fidoo => Self::Fidoo,
            VendorArg::Mpohoda => Self::Mpohoda,
            VendorArg::Odoo => Self::Odoo,
            VendorArg::Posthog => Self::Posthog,
            VendorArg::Stripe => Self::Stripe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_a_batched_read() {
        let cli = Cli::parse_from([
            "drivekit",
            "--vendor",
            "apify",
            "read",
            "actors",
            "--all",
            "--batch-size",
            "50",
        ]);

        assert_eq!(cli.vendor, VendorArg::Apify);
        let Command::Read(args) = cli.command else {
            panic!("expected read command");
        };
        assert!(args.all);
        assert_eq!(args.batch_size, 50);
        assert_eq!(args.query, "actors");
    }

    #[test]
    fn parses_an_update_with_data() {
        let cli = Cli::parse_from([
            "drivekit",
            "--vendor",
            "posthog",
            "update",
            "feature_flags",
            "ff_1",
            "--data",
            "{\"active\": true}",
        ]);

        let Command::Update(args) = cli.command else {
            panic!("expected update command");
        };
        assert_eq!(args.object, "feature_flags");
        assert_eq!(args.id, "ff_1");
    }
}
