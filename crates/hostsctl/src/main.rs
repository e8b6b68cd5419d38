// # hostsctl - hosts file manager
//
// Thin integration layer over hostsctl-core. All parsing, locking, backup
// and persistence logic lives in the core; this binary only:
//
// 1. Reads configuration from environment variables and flags
// 2. Installs the tracing subscriber
// 3. Builds the tokio runtime
// 4. Dispatches one subcommand
//
// ## Configuration
//
// - `HOSTSCTL_HOSTS_FILE`: Hosts file to manage (default `/etc/hosts`)
// - `HOSTSCTL_LOCK_TIMEOUT_SECS`: Lock wait for mutating commands (default 5)
// - `HOSTSCTL_BACKUP_DIR`: Directory for backups (default: next to the file)
// - `HOSTSCTL_PROFILES_DIR`: Profile directory (default `~/.config/hostsctl/profiles`)
// - `HOSTSCTL_LOG_LEVEL`: trace, debug, info, warn, error (default warn)
//
// `--hosts-file` and `--strict` override the environment.
//
// ## Example
//
// ```bash
// sudo hostsctl add 10.0.0.5 api.local --comment "staging api"
// hostsctl --hosts-file ./hosts verify
// hostsctl search '^192\.168\.' --regex --ip
// hostsctl profile save dev --description "local services"
// ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hostsctl_core::{
    ApplyMode, BackupInfo, Entry, EntryId, Error, FileProfileStore, HostsConfig, HostsFile,
    HostsStore, ParseMode, ProfileDiff, ProfileStore, SearchOptions, SearchResult, diff_entries,
    with_lock,
};
use serde::Serialize;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the different outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostsctlExitCode {
    /// Command completed
    Success = 0,
    /// Configuration or usage error
    ConfigError = 1,
    /// The command failed at runtime
    RuntimeError = 2,
    /// `verify` found problems
    VerifyIssues = 3,
}

impl From<HostsctlExitCode> for ExitCode {
    fn from(code: HostsctlExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "hostsctl", version, about = "Manage hosts file entries safely")]
struct Cli {
    /// Hosts file to operate on
    #[arg(long, global = true, value_name = "PATH")]
    hosts_file: Option<PathBuf>,

    /// Fail on malformed lines instead of skipping them
    #[arg(long, global = true)]
    strict: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List entries
    List {
        /// Include disabled entries
        #[arg(long)]
        all: bool,
    },
    /// Add an entry
    Add {
        /// IPv4 or IPv6 address
        ip: String,
        /// One or more hostnames
        #[arg(required = true)]
        names: Vec<String>,
        /// Trailing comment
        #[arg(long)]
        comment: Option<String>,
    },
    /// Remove entries
    Remove(Selector),
    /// Re-enable commented-out entries
    Enable(Selector),
    /// Comment out entries
    Disable(Selector),
    /// Copy the hosts file to a backup
    Backup {
        /// Backup destination (default: timestamped name)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// List existing backups
    Backups,
    /// Replace the hosts file with a backup
    Restore {
        /// Backup file to restore
        file: PathBuf,
    },
    /// Check for malformed lines, invalid entries and duplicate hostnames
    ///
    /// Always parses strictly; the first malformed line is an error.
    Verify,
    /// Find entries by IP, hostname or comment
    Search(SearchArgs),
    /// Manage saved profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
}

/// Which entries a command applies to
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Selector {
    /// Entry id
    #[arg(long)]
    id: Option<EntryId>,
    /// Every entry containing this hostname
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Substring to look for, or a regular expression with --regex
    pattern: String,
    /// Treat the pattern as a regular expression
    #[arg(long)]
    regex: bool,
    /// Case-insensitive matching
    #[arg(short = 'i', long, alias = "case-insensitive")]
    ignore_case: bool,
    /// Search IP addresses
    #[arg(long)]
    ip: bool,
    /// Search hostnames
    #[arg(long)]
    names: bool,
    /// Search comments
    #[arg(long)]
    comments: bool,
    /// Include disabled entries
    #[arg(long)]
    include_disabled: bool,
}

impl From<SearchArgs> for SearchOptions {
    fn from(args: SearchArgs) -> Self {
        Self {
            pattern: args.pattern,
            regex: args.regex,
            ignore_case: args.ignore_case,
            in_ip: args.ip,
            in_names: args.names,
            in_comments: args.comments,
            include_disabled: args.include_disabled,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Save the current entries as a profile
    Save {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Write a profile into the hosts file
    Apply {
        name: String,
        /// Append to the current entries instead of replacing them
        #[arg(long)]
        merge: bool,
    },
    /// List saved profiles
    List,
    /// Show a profile's entries
    Show { name: String },
    /// Delete a profile
    Delete { name: String },
    /// Compare a profile with the hosts file
    Diff { name: String },
}

/// Settings read from the environment
struct Config {
    hosts: HostsConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut hosts = HostsConfig::default();

        if let Ok(path) = env::var("HOSTSCTL_HOSTS_FILE") {
            hosts.hosts_path = PathBuf::from(path);
        }
        if let Ok(secs) = env::var("HOSTSCTL_LOCK_TIMEOUT_SECS") {
            hosts.lock_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("HOSTSCTL_LOCK_TIMEOUT_SECS is not a number: {secs}"))?;
        }
        if let Ok(dir) = env::var("HOSTSCTL_BACKUP_DIR") {
            hosts.backup_dir = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = env::var("HOSTSCTL_PROFILES_DIR") {
            hosts.profiles_dir = PathBuf::from(dir);
        }

        Ok(Self {
            hosts,
            log_level: env::var("HOSTSCTL_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        })
    }

    /// Apply command-line overrides
    fn apply_flags(&mut self, cli: &Cli) {
        if let Some(path) = &cli.hosts_file {
            self.hosts.hosts_path = path.clone();
        }
        if cli.strict {
            self.hosts.parse_mode = ParseMode::Strict;
        }
        if cli.verbose {
            self.log_level = "debug".to_string();
        }
    }

    fn validate(&self) -> Result<()> {
        self.hosts.validate()?;
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => anyhow::bail!(
                "HOSTSCTL_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                HostsctlExitCode::ConfigError.into()
            } else {
                HostsctlExitCode::Success.into()
            };
        }
    };

    let mut config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return HostsctlExitCode::ConfigError.into();
        }
    };
    config.apply_flags(&cli);

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {e:#}");
        return HostsctlExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return HostsctlExitCode::ConfigError.into();
    }

    debug!(file = %config.hosts.hosts_path.display(), "configuration loaded");

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HostsctlExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(cli, &config.hosts).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {e:#}");
                HostsctlExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Dispatch one command
async fn run(cli: Cli, config: &HostsConfig) -> Result<HostsctlExitCode> {
    let store = HostsStore::from_config(config);
    let json = cli.json;

    match cli.command {
        Command::List { all } => {
            let hosts = store.load().await?;
            let entries: Vec<&Entry> = hosts.entries.iter().filter(|e| all || !e.disabled).collect();
            if json {
                print_json(&entries)?;
            } else {
                print_entries(&entries);
            }
        }
        Command::Add { ip, names, comment } => {
            let mut entry = Entry::new(ip, names);
            if let Some(comment) = comment {
                entry = entry.with_comment(comment);
            }
            entry.validate()?;

            let id = store.update(|hosts| Ok(hosts.add_entry(entry))).await?;
            report(json, &serde_json::json!({ "added": id }), || {
                println!("Added entry {id}");
            })?;
        }
        Command::Remove(selector) => {
            let ids = store
                .update(|hosts| apply_to_selected(hosts, &selector, HostsFile::remove_entry))
                .await?;
            report(json, &serde_json::json!({ "removed": ids }), || {
                println!("Removed {} entr{}", ids.len(), plural(ids.len()));
            })?;
        }
        Command::Enable(selector) => {
            let ids = store
                .update(|hosts| apply_to_selected(hosts, &selector, HostsFile::enable_entry))
                .await?;
            report(json, &serde_json::json!({ "enabled": ids }), || {
                println!("Enabled {} entr{}", ids.len(), plural(ids.len()));
            })?;
        }
        Command::Disable(selector) => {
            let ids = store
                .update(|hosts| apply_to_selected(hosts, &selector, HostsFile::disable_entry))
                .await?;
            report(json, &serde_json::json!({ "disabled": ids }), || {
                println!("Disabled {} entr{}", ids.len(), plural(ids.len()));
            })?;
        }
        Command::Backup { output } => {
            let info = store.backup(output.as_deref()).await?;
            report(json, &info, || println!("Backup created: {}", info.path.display()))?;
        }
        Command::Backups => {
            let backups = store.list_backups().await?;
            report(json, &backups, || print_backups(&backups))?;
        }
        Command::Restore { file } => {
            with_lock(store.path(), config.lock_timeout(), || store.restore(&file)).await?;
            report(json, &serde_json::json!({ "restored": file }), || {
                println!("Restored {} from {}", store.path().display(), file.display());
            })?;
        }
        Command::Verify => {
            let issues = store.verify().await?;
            report(json, &serde_json::json!({ "issues": issues }), || {
                if issues.is_empty() {
                    println!("No issues found");
                }
                for issue in &issues {
                    println!("{issue}");
                }
            })?;
            if !issues.is_empty() {
                return Ok(HostsctlExitCode::VerifyIssues);
            }
        }
        Command::Search(args) => {
            let options = SearchOptions::from(args);
            let results = store.load().await?.search(&options)?;
            report(json, &results, || print_search_results(&results, &options.pattern))?;
        }
        Command::Profile(command) => {
            let profiles = FileProfileStore::new(&config.profiles_dir);
            run_profile(command, &store, &profiles, config, json).await?;
        }
    }

    Ok(HostsctlExitCode::Success)
}

async fn run_profile(
    command: ProfileCommand,
    store: &HostsStore,
    profiles: &FileProfileStore,
    config: &HostsConfig,
    json: bool,
) -> Result<()> {
    match command {
        ProfileCommand::Save { name, description } => {
            let mut profile = store.snapshot(name, description).await?;
            profiles.save_profile(&mut profile).await?;
            report(json, &profile, || {
                println!(
                    "Saved profile '{}' ({} entries)",
                    profile.name,
                    profile.entries.len()
                );
            })?;
        }
        ProfileCommand::Apply { name, merge } => {
            let profile = profiles.load_profile(&name).await?;
            let mode = if merge { ApplyMode::Merge } else { ApplyMode::Replace };
            let hosts = with_lock(store.path(), config.lock_timeout(), || {
                store.apply_profile(&profile, mode)
            })
            .await?;
            report(json, &hosts.entries, || {
                println!(
                    "Applied profile '{}' ({} entries now in {})",
                    profile.name,
                    hosts.len(),
                    store.path().display()
                );
            })?;
        }
        ProfileCommand::List => {
            let listed = profiles.list_profiles().await?;
            report(json, &listed, || {
                if listed.is_empty() {
                    println!("No profiles saved");
                }
                for meta in &listed {
                    println!(
                        "{:<24} {:>4} entries  {}",
                        meta.name, meta.entry_count, meta.description
                    );
                }
            })?;
        }
        ProfileCommand::Show { name } => {
            let profile = profiles.load_profile(&name).await?;
            report(json, &profile, || {
                println!("Profile: {}", profile.name);
                if !profile.description.is_empty() {
                    println!("Description: {}", profile.description);
                }
                println!("Updated: {}", profile.updated_at.to_rfc3339());
                let entries: Vec<&Entry> = profile.entries.iter().collect();
                print_entries(&entries);
            })?;
        }
        ProfileCommand::Delete { name } => {
            profiles.delete_profile(&name).await?;
            report(json, &serde_json::json!({ "deleted": name }), || {
                println!("Deleted profile '{name}'");
            })?;
        }
        ProfileCommand::Diff { name } => {
            let profile = profiles.load_profile(&name).await?;
            let hosts = store.load().await?;
            let diff = diff_entries(&hosts.entries, &profile.entries);
            report(json, &diff, || print_diff(&diff, &profile.name))?;
        }
    }
    Ok(())
}

/// Resolve the selector to ids and apply `op` to each
fn apply_to_selected(
    hosts: &mut HostsFile,
    selector: &Selector,
    op: fn(&mut HostsFile, EntryId) -> bool,
) -> hostsctl_core::Result<Vec<EntryId>> {
    let ids = match (selector.id, &selector.name) {
        (Some(id), _) => {
            if hosts.find_by_id(id).is_none() {
                return Err(Error::not_found(format!("entry with ID {id} not found")));
            }
            vec![id]
        }
        (None, Some(name)) => {
            let ids = hosts.ids_by_name(name);
            if ids.is_empty() {
                return Err(Error::not_found(format!("no entries found for hostname '{name}'")));
            }
            ids
        }
        (None, None) => return Err(Error::config("either --id or --name is required")),
    };

    for &id in &ids {
        op(hosts, id);
    }
    Ok(ids)
}

fn report<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce()) -> Result<()> {
    if json {
        print_json(value)
    } else {
        text();
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "y" } else { "ies" }
}

fn print_entries(entries: &[&Entry]) {
    if entries.is_empty() {
        println!("No entries");
        return;
    }
    println!("{:<4} {:<8} {:<39} {:<40} COMMENT", "ID", "STATUS", "IP", "NAMES");
    for entry in entries {
        let status = if entry.disabled { "disabled" } else { "enabled" };
        println!(
            "{:<4} {:<8} {:<39} {:<40} {}",
            entry.id,
            status,
            entry.ip,
            entry.names.join(" "),
            entry.comment
        );
    }
}

fn print_search_results(results: &[SearchResult], pattern: &str) {
    if results.is_empty() {
        println!("No entries found matching pattern: {pattern}");
        return;
    }
    println!("Found {} entr{} matching pattern: {pattern}", results.len(), plural(results.len()));
    println!("{:<4} {:<8} {:<39} {:<40} MATCH", "ID", "STATUS", "IP", "NAMES");
    for result in results {
        let entry = &result.entry;
        let status = if entry.disabled { "disabled" } else { "enabled" };
        println!(
            "{:<4} {:<8} {:<39} {:<40} {}: {}",
            entry.id,
            status,
            entry.ip,
            entry.names.join(" "),
            result.match_type,
            result.match_text
        );
    }
}

fn print_backups(backups: &[BackupInfo]) {
    if backups.is_empty() {
        println!("No backups found");
        return;
    }
    for backup in backups {
        println!(
            "{}  {:>8} bytes  {}",
            backup.created_at.format("%Y-%m-%d %H:%M:%S"),
            backup.size_bytes,
            backup.path.display()
        );
    }
}

fn print_diff(diff: &ProfileDiff, profile_name: &str) {
    println!("Comparing hosts file with profile '{profile_name}':");
    for entry in &diff.added {
        println!("+ {entry}");
    }
    for entry in &diff.removed {
        println!("- {entry}");
    }
    for change in &diff.modified {
        println!("~ {}  =>  {}", change.old, change.new);
    }
    println!(
        "Summary: {} added, {} removed, {} modified, {} unchanged",
        diff.added.len(),
        diff.removed.len(),
        diff.modified.len(),
        diff.same.len()
    );
}
