//! Clap derive structures for the `linkward` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use linkward_core::{ActionId, ActionStatus, PortRef};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// linkward -- VLAN control plane for switch-attached nodes
#[derive(Debug, Parser)]
#[command(
    name = "linkward",
    version,
    about = "Attach networks to node interfaces by reconfiguring switch ports",
    long_about = "Manage networks, nodes and switch ports, and run the worker that\n\
        applies queued port changes to the switches.\n\n\
        Connect and detach requests are validated immediately and queued;\n\
        `linkward serve` (or `--wait` on the request) executes them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file
    #[arg(long, short = 'c', env = "LINKWARD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LINKWARD_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Log Enums ───────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the action workers until interrupted
    Serve,

    /// Manage networks and their VLAN ids
    #[command(alias = "net", alias = "n")]
    Network(NetworkArgs),

    /// Manage nodes, their NICs, and NIC attachments
    Node(NodeArgs),

    /// Manage switch ports
    #[command(alias = "p")]
    Port(PortArgs),

    /// Inspect and withdraw queued port changes
    #[command(alias = "a")]
    Action(ActionArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Network ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// List networks
    #[command(alias = "ls")]
    List,

    /// Show one network
    Show { name: String },

    /// Create a network; the VLAN id comes from the pool unless --id is given
    Create {
        name: String,

        /// Owning project (always granted access)
        #[arg(long)]
        owner: Option<String>,

        /// Additional project granted access (repeatable)
        #[arg(long = "access")]
        access: Vec<String>,

        /// Administrator-chosen VLAN id
        #[arg(long)]
        id: Option<u16>,
    },

    /// Delete a network and release its VLAN id
    #[command(alias = "rm")]
    Delete { name: String },

    /// Allow a project to attach its nodes to a network
    GrantAccess { network: String, project: String },

    /// Withdraw a project's access to a network
    RevokeAccess { network: String, project: String },

    /// List the NICs a network is attached to
    ListAttachments {
        network: String,

        /// Only nodes belonging to this project
        #[arg(long)]
        project: Option<String>,
    },
}

// ── Node ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodeCommand {
    /// List nodes
    #[command(alias = "ls")]
    List,

    /// Show one node with its NICs and attachments
    Show { name: String },

    /// Register a node
    Register {
        name: String,

        /// Project the node belongs to
        #[arg(long)]
        project: Option<String>,
    },

    /// Delete a node whose NICs are all unwired
    #[command(alias = "rm")]
    Delete { name: String },

    /// Register a NIC on a node
    RegisterNic {
        node: String,
        nic: String,

        /// Hardware address (aa:bb:cc:dd:ee:ff)
        #[arg(long)]
        mac: String,
    },

    /// Remove an unwired NIC
    RemoveNic { node: String, nic: String },

    /// Queue attaching a network to a NIC
    Connect {
        node: String,
        nic: String,
        network: String,

        /// Channel to carry the network on: vlan/native or vlan/<id>
        /// [default: vlan/native]
        #[arg(long)]
        channel: Option<String>,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Queue clearing a channel on a NIC
    Detach {
        node: String,
        nic: String,

        /// Channel to clear [default: vlan/native]
        #[arg(long)]
        channel: Option<String>,

        #[command(flatten)]
        wait: WaitArgs,
    },
}

// ── Port ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PortArgs {
    #[command(subcommand)]
    pub command: PortCommand,
}

#[derive(Debug, Subcommand)]
pub enum PortCommand {
    /// List registered ports
    #[command(alias = "ls")]
    List,

    /// Register a port as <switch>/<label>
    Register { port: PortRef },

    /// Remove an unwired port
    #[command(alias = "rm")]
    Remove { port: PortRef },

    /// Record that a node's NIC is cabled to a port
    Wire {
        port: PortRef,
        node: String,
        nic: String,
    },

    /// Forget the NIC cabled to a port
    Unwire { port: PortRef },

    /// Queue stripping every VLAN from a port and shutting it down
    Revert {
        port: PortRef,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Read the live VLAN assignments of ports from their switches
    Networks {
        #[arg(required = true)]
        ports: Vec<PortRef>,
    },
}

// ── Action ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ActionArgs {
    #[command(subcommand)]
    pub command: ActionCommand,
}

#[derive(Debug, Subcommand)]
pub enum ActionCommand {
    /// List actions in creation order
    #[command(alias = "ls")]
    List {
        /// Only actions with this status (PENDING, DONE, ERROR)
        #[arg(long)]
        status: Option<ActionStatus>,

        /// Only actions on this port
        #[arg(long)]
        port: Option<PortRef>,
    },

    /// Show an action's status and diagnostic
    Status { id: ActionId },

    /// Show the full action record
    Show { id: ActionId },

    /// Withdraw an action no worker has picked up
    Cancel { id: ActionId },

    /// Execute pending actions in this process until none is runnable
    Run,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration (secrets masked)
    Show,
}

// ── Shared ───────────────────────────────────────────────────────────

/// Run the workers in-process until the queued action resolves.
#[derive(Debug, Args)]
pub struct WaitArgs {
    /// Seconds to wait for the action to finish (runs workers in-process)
    #[arg(long, value_name = "SECS", num_args = 0..=1, default_missing_value = "120")]
    pub wait: Option<u64>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
