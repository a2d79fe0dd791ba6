use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rand::SeedableRng;
use rand::rngs::StdRng;
use regionkeeper_core::{
    Command, CommandOutcome, ExemptionView, GlobalToggle, InjectionEngine, InjectionTuning,
    InstalledPacks, NotificationType, Pack, PlainRenderer, Region, RegionKeeper, RegionRegistry,
    RegionRegistryBuilder, SettingsPaths, SettingsStore, SimHandle, SimRecord, SimRoster,
    TuningCatalog, WorldsOp,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Parser)]
#[command(name = "regionkeeper")]
#[command(about = "Inspect and change RegionKeeper settings outside the game")]
#[command(version)]
struct Args {
    /// Game root holding the saves folder (discovered from the working directory if omitted)
    #[arg(long, global = true)]
    game_root: Option<PathBuf>,

    /// Installed pack codes, comma-separated (all packs if omitted)
    #[arg(long, global = true)]
    packs: Option<String>,

    /// Region roster JSON replacing the shipped one
    #[arg(long, global = true)]
    regions: Option<PathBuf>,

    /// Injection tuning JSON replacing the shipped one
    #[arg(long, global = true)]
    injection: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List the regions available with the installed packs
    Regions,
    /// Show the stored settings of one region
    Show { region: String },
    /// Toggle the soft filter for a region
    Soft {
        region: String,
        #[arg(value_enum)]
        state: Option<OnOff>,
    },
    /// Toggle whether a region receives tourists
    Tourists {
        region: String,
        #[arg(value_enum)]
        state: Option<OnOff>,
    },
    /// Allow or disallow Sims from another region in a region's worlds list
    Worlds {
        #[arg(value_enum)]
        op: WorldsArg,
        source: String,
        target: String,
    },
    /// Set the creation weight of one street
    StreetWeight {
        region: String,
        street: String,
        weight: f64,
    },
    /// Set the minimum score of the soft filter term
    SoftValue { value: f64 },
    /// Flip a global toggle
    Toggle {
        #[arg(value_enum)]
        toggle: ToggleArg,
        #[arg(value_enum)]
        state: Option<OnOff>,
    },
    /// Turn a notification kind on or off
    Notification {
        kind: NotificationType,
        #[arg(value_enum)]
        state: Option<OnOff>,
    },
    /// Restore default settings
    Reset {
        /// Copy the current file aside before resetting
        #[arg(long)]
        backup: bool,
    },
    /// Draw a creation street for a region
    Street {
        region: String,
        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run a per-Sim command against a JSON roster file
    Sim {
        /// Roster file, rewritten after a successful change
        #[arg(long)]
        roster: PathBuf,
        #[command(subcommand)]
        action: SimAction,
    },
    /// Run the injection pass over a tuning snapshot
    Inject {
        snapshot: PathBuf,
        /// Write the injected snapshot here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum SimAction {
    /// List every Sim in the roster
    List,
    /// Show one Sim's home region and exemptions
    Show { sim: u64 },
    /// Move a Sim to a region
    Assign { sim: u64, region: String },
    /// Clear a Sim's home region
    Unassign { sim: u64 },
    /// Let a Sim be picked in a region
    Allow { sim: u64, region: String },
    /// Stop a Sim from being picked in a region
    Disallow { sim: u64, region: String },
    /// Let a Sim be picked everywhere
    AllowAll { sim: u64 },
    /// Clear every exemption of a Sim
    DisallowAll { sim: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnOff {
    On,
    Off,
}

impl OnOff {
    const fn as_bool(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WorldsArg {
    Allow,
    Disallow,
}

impl From<WorldsArg> for WorldsOp {
    fn from(arg: WorldsArg) -> Self {
        match arg {
            WorldsArg::Allow => Self::Allow,
            WorldsArg::Disallow => Self::Disallow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToggleArg {
    Bidirectional,
    HighSchool,
    Gallery,
}

impl From<ToggleArg> for GlobalToggle {
    fn from(arg: ToggleArg) -> Self {
        match arg {
            ToggleArg::Bidirectional => Self::Bidirectional,
            ToggleArg::HighSchool => Self::HighSchool,
            ToggleArg::Gallery => Self::SaveAcrossGallery,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let packs = parse_packs(args.packs.as_deref());
    let registry = load_registry(args.regions.as_deref(), &packs)?;
    let paths = match &args.game_root {
        Some(root) => SettingsPaths::new(root),
        None => {
            let cwd = std::env::current_dir().context("reading working directory")?;
            SettingsPaths::discover(&cwd).context("locating the game root")?
        }
    };
    let settings = SettingsStore::open(paths, &registry).context("loading settings")?;
    let engine = load_injection(args.injection.as_deref())?;
    let mut keeper = RegionKeeper::from_parts(registry, settings, engine);

    let success = run(&args.command, &mut keeper, &packs)?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn run(cmd: &Cmd, keeper: &mut RegionKeeper, packs: &InstalledPacks) -> Result<bool> {
    let outcome = match cmd {
        Cmd::Regions => {
            print_regions(keeper);
            return Ok(true);
        }
        Cmd::Show { region } => return show_region(keeper, region),
        Cmd::Street { region, seed } => return draw_street(keeper, region, *seed),
        Cmd::Sim { roster, action } => return run_sim(keeper, roster, action),
        Cmd::Inject { snapshot, output } => {
            return inject(keeper, packs, snapshot, output.as_deref());
        }
        Cmd::Soft { region, state } => execute(
            keeper,
            &Command::ToggleSoft {
                region: region.clone(),
                value: state.map(OnOff::as_bool),
            },
        ),
        Cmd::Tourists { region, state } => execute(
            keeper,
            &Command::ToggleTourists {
                region: region.clone(),
                value: state.map(OnOff::as_bool),
            },
        ),
        Cmd::Worlds { op, source, target } => execute(
            keeper,
            &Command::AlterWorlds {
                source: source.clone(),
                target: target.clone(),
                op: (*op).into(),
            },
        ),
        Cmd::StreetWeight {
            region,
            street,
            weight,
        } => execute(
            keeper,
            &Command::SetStreetWeight {
                region: region.clone(),
                street: street.clone(),
                weight: *weight,
            },
        ),
        Cmd::SoftValue { value } => execute(keeper, &Command::SetSoftValue { value: *value }),
        Cmd::Toggle { toggle, state } => execute(
            keeper,
            &Command::Toggle {
                toggle: (*toggle).into(),
                value: state.map(OnOff::as_bool),
            },
        ),
        Cmd::Notification { kind, state } => execute(
            keeper,
            &Command::ToggleNotification {
                kind: *kind,
                value: state.map(OnOff::as_bool),
            },
        ),
        Cmd::Reset { backup } => execute(keeper, &Command::Reset { backup: *backup }),
    };
    report(&outcome);
    Ok(outcome.success)
}

fn execute(keeper: &mut RegionKeeper, command: &Command) -> CommandOutcome {
    keeper.commands(&PlainRenderer).execute(command, None)
}

fn report(outcome: &CommandOutcome) {
    if outcome.success {
        println!("{} {}", "✅".green(), outcome.message.green());
        if let Some(kind) = outcome.notification {
            println!("   {} {}", "🔔".yellow(), kind.name().bright_black());
        }
    } else {
        eprintln!("{} {}", "❌".red(), outcome.message.red());
    }
}

/// Pack codes from a comma-separated list; every known pack when absent.
fn parse_packs(raw: Option<&str>) -> InstalledPacks {
    match raw {
        Some(list) => InstalledPacks::from_codes(
            list.split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty()),
        ),
        None => InstalledPacks::all(),
    }
}

fn load_registry(path: Option<&Path>, packs: &InstalledPacks) -> Result<RegionRegistry> {
    let registry = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading region roster {}", path.display()))?;
            RegionRegistryBuilder::from_json(&raw)?.finalize(packs)?
        }
        None => RegionRegistry::with_defaults(packs)?,
    };
    log::info!("{} regions available", registry.available().len());
    Ok(registry)
}

fn load_injection(path: Option<&Path>) -> Result<InjectionEngine> {
    let Some(path) = path else {
        return Ok(InjectionEngine::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading injection tuning {}", path.display()))?;
    let tuning = InjectionTuning::from_json(&raw)
        .with_context(|| format!("parsing injection tuning {}", path.display()))?;
    Ok(InjectionEngine::new(tuning))
}

fn print_regions(keeper: &RegionKeeper) {
    println!("{}", "🗺  Regions".bright_cyan().bold());
    println!("{}", "=".repeat(40).cyan());
    let soft = keeper.settings().soft_regions();
    let pack_label = |region: &Region| {
        region
            .pack
            .0
            .iter()
            .map(Pack::code)
            .collect::<Vec<_>>()
            .join("+")
    };
    for region in keeper.registry().available() {
        let mut flags = Vec::new();
        if soft.contains(&region.name) {
            flags.push("soft");
        }
        if region.has_tourists {
            flags.push("tourists");
        }
        if region.is_multi_street() {
            flags.push("streets");
        }
        println!(
            "{:<22} {:<26} bit {:>2}  {} {}",
            region.name.bright_white(),
            region.pretty_name(),
            region.raw_bit_index,
            pack_label(region).bright_black(),
            flags.join(",").yellow()
        );
    }
}

fn show_region(keeper: &RegionKeeper, name: &str) -> Result<bool> {
    let Some(region) = keeper.registry().by_name(name) else {
        eprintln!("{} unknown region {}", "❌".red(), name.yellow());
        return Ok(false);
    };
    let settings = keeper.settings().get_region(region);
    println!("{}", region.pretty_name().bright_cyan().bold());
    println!("  soft:     {}", settings.soft);
    println!("  worlds:   {}", settings.worlds.join(", "));
    if let Some(tourists) = settings.tourists {
        println!("  tourists: {tourists}");
    }
    if let Some(weights) = keeper.settings().effective_street_weights(region) {
        println!("  streets:");
        for (street, weight) in weights {
            println!("    {street:<24} {weight:.2}");
        }
    }
    Ok(true)
}

fn draw_street(keeper: &RegionKeeper, region: &str, seed: Option<u64>) -> Result<bool> {
    let seed = seed.unwrap_or_else(clock_seed);
    log::debug!("street draw seed {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    match keeper.pick_street(region, &mut rng) {
        Ok(street) => {
            println!("{} {} ({})", "🏠".green(), street.name.green(), street.id);
            Ok(true)
        }
        Err(err) => {
            eprintln!("{} {}", "❌".red(), err.to_string().red());
            Ok(false)
        }
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos() as u64)
}

fn load_roster(path: &Path) -> Result<SimRoster> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading roster {}", path.display()))?;
    SimRoster::from_json(&raw).with_context(|| format!("parsing roster {}", path.display()))
}

fn save_roster(path: &Path, roster: &SimRoster) -> Result<()> {
    let json = serde_json::to_string_pretty(roster).context("serializing roster")?;
    fs::write(path, json).with_context(|| format!("writing roster {}", path.display()))
}

fn sim_command(action: &SimAction) -> Option<(u64, Command)> {
    let (sim, command) = match action {
        SimAction::List | SimAction::Show { .. } => return None,
        SimAction::Assign { sim, region } => (
            sim,
            Command::AssignRegion {
                region: region.clone(),
            },
        ),
        SimAction::Unassign { sim } => (sim, Command::UnassignRegion),
        SimAction::Allow { sim, region } => (
            sim,
            Command::Allow {
                region: region.clone(),
            },
        ),
        SimAction::Disallow { sim, region } => (
            sim,
            Command::Disallow {
                region: region.clone(),
            },
        ),
        SimAction::AllowAll { sim } => (sim, Command::AllowAll),
        SimAction::DisallowAll { sim } => (sim, Command::DisallowAll),
    };
    Some((*sim, command))
}

fn run_sim(keeper: &mut RegionKeeper, path: &Path, action: &SimAction) -> Result<bool> {
    let mut roster = load_roster(path)?;
    match action {
        SimAction::List => {
            for sim in roster.iter() {
                print_sim(keeper.registry(), sim);
            }
            return Ok(true);
        }
        SimAction::Show { sim } => {
            let Some(record) = roster.get(*sim) else {
                bail!("no Sim {sim} in {}", path.display());
            };
            print_sim(keeper.registry(), record);
            return Ok(true);
        }
        _ => {}
    }

    let Some((sim_id, command)) = sim_command(action) else {
        return Ok(true);
    };
    let Some(sim) = roster.get_mut(sim_id) else {
        bail!("no Sim {sim_id} in {}", path.display());
    };
    let outcome = keeper
        .commands(&PlainRenderer)
        .execute(&command, Some(sim as &mut dyn SimHandle));
    report(&outcome);
    if outcome.success {
        save_roster(path, &roster)?;
    }
    Ok(outcome.success)
}

fn print_sim(registry: &RegionRegistry, sim: &SimRecord) {
    let home = registry
        .by_id(sim.region_id)
        .map_or_else(|| "-".to_string(), |region| region.pretty_name());
    let bits = sim.exemption().map_or(0, |stat| stat.get_value());
    let view = ExemptionView::new(bits, registry);
    let allowed: Vec<&str> = view.allowed_regions().into_iter().collect();
    println!(
        "{:>6}  {:<24} {:<24} {}",
        sim.id,
        sim.full_name().bright_white(),
        home,
        allowed.join(",").yellow()
    );
}

fn inject(
    keeper: &mut RegionKeeper,
    packs: &InstalledPacks,
    snapshot: &Path,
    output: Option<&Path>,
) -> Result<bool> {
    let raw = fs::read_to_string(snapshot)
        .with_context(|| format!("reading snapshot {}", snapshot.display()))?;
    let mut catalog = TuningCatalog::from_json(&raw)
        .with_context(|| format!("parsing snapshot {}", snapshot.display()))?;

    let report = match keeper.inject(&mut catalog, packs) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{} injection aborted: {}", "❌".red(), err.to_string().red());
            return Ok(false);
        }
    };
    println!("{}", "💉 Injection".bright_cyan().bold());
    println!("{}", report.render());
    for skipped in &report.skipped {
        log::debug!("skipped {} {} in {}", skipped.kind, skipped.id, skipped.step);
    }
    for step in &report.failed_steps {
        eprintln!("{} step {} failed", "⚠️ ".yellow(), step.yellow());
    }

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&catalog.to_snapshot())
            .context("serializing injected snapshot")?;
        fs::write(output, json)
            .with_context(|| format!("writing snapshot {}", output.display()))?;
        println!("📄 {}", output.display());
    }
    Ok(true)
}
