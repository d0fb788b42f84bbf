//! oxr-probe: inspect OpenXR runtimes, filter extension wishlists, dump
//! controller binding tables and run a headless input loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

use oxr_common::helpers::extend_unique;
use oxr_common::AppConfig;
use oxr_openxr::OpenXrRuntime;
use oxr_provider::extensions::HEADLESS;
use oxr_provider::profiles::{profile_by_name, ProfileSet};
use oxr_provider::types::{
    ActionType, Hand, ReferenceSpace, RuntimeProperties, SessionState, SystemProperties,
    ViewConfiguration,
};
use oxr_provider::{
    Action, ActionSet, ActionStates, AppInfo, Component, DummyRuntime, GraphicsBinding, Input,
    Provider, Qualifier, SessionOptions, XrRuntime,
};

/// Polls between event drains while waiting for the runtime to get ready.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);
const READY_POLL_LIMIT: u32 = 500;

#[derive(Parser, Debug)]
#[command(name = "oxr-probe")]
#[command(about = "Inspect an OpenXR runtime through the provider layer")]
struct Args {
    /// Use the in-memory runtime instead of the system loader
    #[arg(long, global = true)]
    dummy: bool,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "OXR_CONFIG")]
    config: Option<PathBuf>,

    /// Application name reported to the runtime
    #[arg(long, global = true, env = "OXR_APP_NAME")]
    app_name: Option<String>,

    /// Extension wishlist, comma separated
    #[arg(long, global = true, env = "OXR_EXTENSIONS", value_delimiter = ',')]
    extensions: Vec<String>,

    /// API layer wishlist, comma separated
    #[arg(long, global = true, env = "OXR_API_LAYERS", value_delimiter = ',')]
    api_layers: Vec<String>,

    /// Reference space type (local, stage, view, local_floor)
    #[arg(long, global = true, env = "OXR_REFERENCE_SPACE")]
    reference_space: Option<String>,

    /// Print machine readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List extensions and API layers the runtime advertises
    Extensions,

    /// Print which of the given extensions the runtime supports, in order
    Filter {
        /// Extension names
        names: Vec<String>,
    },

    /// Initialize and print runtime and system properties
    Info,

    /// Print the binding table of a controller profile
    Bindings {
        /// Short name (index, touch, vive, wmr, simple, wrist, tracker) or profile path
        #[arg(short, long)]
        profile: String,
    },

    /// Run a headless session and print action state changes
    Headless {
        /// Number of frames to run
        #[arg(short, long, default_value_t = 90)]
        frames: u32,
    },

    /// Show version information
    Version,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    runtime: Option<&'a RuntimeProperties>,
    system: Option<&'a SystemProperties>,
    extensions: &'a [String],
    api_layers: &'a [String],
    vulkan_extension: Option<&'static str>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    oxr_common::init_tracing_with_default(&config.log_filter);

    match &args.command {
        Command::Extensions => {
            let provider = Provider::new(runtime(args.dummy)?);
            let extensions = provider.supported_extensions()?;
            let layers = provider.supported_api_layers()?;
            if args.json {
                let report = serde_json::json!({
                    "extensions": extensions,
                    "api_layers": layers,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Extensions ({}):", extensions.len());
                for name in &extensions {
                    println!("  {name}");
                }
                println!("API layers ({}):", layers.len());
                for name in &layers {
                    println!("  {name}");
                }
            }
        }
        Command::Filter { names } => {
            let provider = Provider::new(runtime(args.dummy)?);
            let mut wishlist = if names.is_empty() {
                config.extensions.clone()
            } else {
                names.clone()
            };
            provider.filter_requested(&mut wishlist)?;
            if args.json {
                println!("{}", serde_json::to_string(&wishlist)?);
            } else {
                for name in &wishlist {
                    println!("{name}");
                }
            }
        }
        Command::Info => {
            let mut provider = Provider::new(runtime(args.dummy)?);
            provider.init(&AppInfo::from(&config))?;
            let report = InfoReport {
                runtime: provider.runtime_properties(),
                system: provider.system_properties(),
                extensions: provider.enabled_extensions(),
                api_layers: provider.enabled_api_layers(),
                vulkan_extension: provider.vulkan_extension(),
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_info(&report);
            }
        }
        Command::Bindings { profile } => {
            let Some(profile) = profile_by_name(profile) else {
                bail!("unknown controller profile '{profile}'");
            };
            println!("{}", profile.path());
            for hand in Hand::ALL {
                for component in Component::ALL {
                    for qualifier in Qualifier::ALL {
                        if let Some(path) = profile.binding_path(hand, component, qualifier) {
                            println!("  {hand:?} {component:?} {qualifier:?} -> {path}");
                        }
                    }
                }
            }
        }
        Command::Headless { frames } => {
            let mut config = config.clone();
            extend_unique(&mut config.extensions, [HEADLESS.to_string()]);
            run_headless(runtime(args.dummy)?, &config, *frames)?;
        }
        Command::Version => {
            println!("oxr-probe {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Config file first, then command line and environment on top.
fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("unable to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(name) = &args.app_name {
        config.app_name = name.clone();
    }
    if !args.extensions.is_empty() {
        config.extensions = args.extensions.clone();
    }
    if !args.api_layers.is_empty() {
        config.api_layers = args.api_layers.clone();
    }
    if let Some(space) = &args.reference_space {
        config.reference_space = space.trim().to_ascii_lowercase();
    }
    config.validate()?;
    Ok(config)
}

fn runtime(dummy: bool) -> Result<Arc<dyn XrRuntime>> {
    if dummy {
        info!("using the in-memory runtime");
        return Ok(Arc::new(DummyRuntime::new()));
    }
    Ok(Arc::new(OpenXrRuntime::load()?))
}

fn print_info(report: &InfoReport<'_>) {
    if let Some(runtime) = report.runtime {
        println!(
            "Runtime:    {} {}",
            runtime.runtime_name, runtime.runtime_version
        );
    }
    if let Some(system) = report.system {
        println!(
            "System:     {} (vendor 0x{:x})",
            system.system_name, system.vendor_id
        );
        println!(
            "Tracking:   orientation={} position={}",
            system.orientation_tracking, system.position_tracking
        );
        println!(
            "Input:      hand_tracking={} eye_gaze={}",
            system.supports_hand_tracking, system.supports_eye_gaze
        );
    }
    println!(
        "Vulkan:     {}",
        report.vulkan_extension.unwrap_or("not enabled")
    );
    println!("Enabled extensions ({}):", report.extensions.len());
    for name in report.extensions {
        println!("  {name}");
    }
    if !report.api_layers.is_empty() {
        println!("Enabled API layers ({}):", report.api_layers.len());
        for name in report.api_layers {
            println!("  {name}");
        }
    }
}

/// Demo action set synced by the headless loop.
struct DemoActions {
    set: Arc<ActionSet>,
    actions: Vec<Arc<Action>>,
}

impl DemoActions {
    fn create(input: &mut Input) -> Result<Self> {
        let hands = [Hand::Left.user_path(), Hand::Right.user_path()];
        let set = input.create_action_set("demo", "Demo", 0)?;
        let specs = [
            ("select", "Select", ActionType::Boolean, Component::Trigger, Qualifier::Click),
            ("squeeze", "Squeeze", ActionType::Float, Component::Squeeze, Qualifier::Value),
            (
                "thumbstick",
                "Thumbstick",
                ActionType::Vector2f,
                Component::AxisControl,
                Qualifier::None,
            ),
            ("grip", "Grip pose", ActionType::Pose, Component::GripPose, Qualifier::None),
        ];

        let mut profiles = ProfileSet::common();
        let mut actions = Vec::with_capacity(specs.len());
        for (name, localized, action_type, component, qualifier) in specs {
            let action = input.create_action(&set, name, localized, action_type, &hands)?;
            for hand in Hand::ALL {
                if !input.add_binding(&mut profiles, &action, hand, component, qualifier)? {
                    warn!("no binding for {name} on any common controller");
                }
            }
            actions.push(action);
        }
        input.suggest_bindings(&profiles)?;
        input.attach_action_sets(&[set.as_ref()])?;
        input.add_action_set_for_sync(&set, None)?;
        Ok(Self { set, actions })
    }

    /// Prints every slot whose state changed during the last sync.
    fn print_changes(&self, frame: u32, pose_active: &mut [Vec<bool>]) {
        for (action, last_active) in self.actions.iter().zip(pose_active.iter_mut()) {
            let slot_name = |i: usize| {
                action
                    .subaction_names()
                    .get(i)
                    .map(String::as_str)
                    .unwrap_or("*")
                    .to_string()
            };
            match action.states() {
                ActionStates::Boolean(states) => {
                    for (i, s) in changed(&states, |s| s.changed_since_last_sync) {
                        println!("[{frame}] {} {} = {}", action.name(), slot_name(i), s.current_state);
                    }
                }
                ActionStates::Float(states) => {
                    for (i, s) in changed(&states, |s| s.changed_since_last_sync) {
                        println!(
                            "[{frame}] {} {} = {:.3}",
                            action.name(),
                            slot_name(i),
                            s.current_state
                        );
                    }
                }
                ActionStates::Vector2f(states) => {
                    for (i, s) in changed(&states, |s| s.changed_since_last_sync) {
                        println!(
                            "[{frame}] {} {} = ({:.3}, {:.3})",
                            action.name(),
                            slot_name(i),
                            s.current_state.x,
                            s.current_state.y
                        );
                    }
                }
                ActionStates::Pose(states) => {
                    last_active.resize(states.len(), false);
                    for (i, s) in states.iter().enumerate() {
                        if s.is_active != last_active[i] {
                            last_active[i] = s.is_active;
                            println!(
                                "[{frame}] {} {} active = {}",
                                action.name(),
                                slot_name(i),
                                s.is_active
                            );
                        }
                    }
                }
                ActionStates::Vibration => {}
            }
        }
    }
}

fn changed<T>(states: &[T], is_changed: impl Fn(&T) -> bool) -> impl Iterator<Item = (usize, &T)> {
    states.iter().enumerate().filter(move |&(_, s)| is_changed(s))
}

fn run_headless(runtime: Arc<dyn XrRuntime>, config: &AppConfig, frames: u32) -> Result<()> {
    let mut provider = Provider::new(runtime);
    let mut wishlist = config.extensions.clone();
    provider.filter_requested(&mut wishlist)?;
    if !wishlist.iter().any(|name| name == HEADLESS) {
        bail!("runtime does not support {HEADLESS}");
    }
    let mut app = AppInfo::from(config);
    app.extensions = wishlist;
    provider.init(&app)?;

    let options = SessionOptions {
        reference_space: ReferenceSpace::from_name(&config.reference_space)
            .unwrap_or(ReferenceSpace::Local),
        ..SessionOptions::default()
    };
    let view = ViewConfiguration::from_name(&config.view_configuration)
        .unwrap_or(ViewConfiguration::PrimaryStereo);
    let session = provider.create_session(&GraphicsBinding::Headless, options)?;
    let demo = DemoActions::create(session.input_mut())?;

    wait_for_state(&mut provider, SessionState::Ready)?;
    let session = provider.session_mut().context("session vanished")?;
    session.begin(view)?;

    let mut pose_active = vec![Vec::new(); demo.actions.len()];
    for frame in 0..frames {
        provider.poll_events()?;
        let session = provider.session_mut().context("session vanished")?;
        if matches!(session.state(), SessionState::Exiting | SessionState::LossPending) {
            warn!("runtime is shutting the session down after {frame} frames");
            break;
        }
        session.render_headless_frame()?;
        let synced = session.input_mut().sync_action_sets()?;
        if !synced.is_unqualified_success() {
            debug!("frame {frame}: input not refreshed ({synced})");
        }
        demo.print_changes(frame, &mut pose_active);
    }

    let stats = provider
        .session()
        .map(|session| session.input().last_sync_stats())
        .unwrap_or_default();
    info!(
        "last sync of {}: {} reads, peak {} in flight",
        demo.set.name(),
        stats.reads,
        stats.peak_in_flight
    );

    if let Some(session) = provider.session() {
        session.request_exit()?;
    }
    wait_for_state(&mut provider, SessionState::Stopping)?;
    provider
        .session_mut()
        .context("session vanished")?
        .end()?;
    provider.destroy();
    Ok(())
}

fn wait_for_state(provider: &mut Provider, wanted: SessionState) -> Result<()> {
    for _ in 0..READY_POLL_LIMIT {
        provider.poll_events()?;
        if provider.session().map(|s| s.state()) == Some(wanted) {
            return Ok(());
        }
        thread::sleep(READY_POLL_INTERVAL);
    }
    bail!("session did not reach {wanted:?}")
}
