//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `shellkit_core` linkage and print deterministic smoke output.
//! - Start file logging when a log directory is configured.
//! - Optionally load an extension `metadata.json`.
//! - Run one setup/teardown cycle of both registries against in-memory objects.

use clap::Parser;
use shellkit_core::{
    default_log_level, init_logging, load_metadata, logging_status, Injection, Method,
    MethodSlots, MethodTable, PatchRegistry, SignalBinding, SignalEmitter, SubscriptionRegistry,
    Value,
};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

/// shellkit smoke CLI.
#[derive(Parser)]
#[command(name = "shellkit")]
#[command(about = "Exercise the shellkit teardown registries")]
#[command(version)]
struct Cli {
    /// Extension metadata.json to load
    metadata: Option<PathBuf>,

    /// Directory for rolling log files; logging stays off when unset
    #[arg(long, env = "SHELLKIT_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Default)]
struct DemoObject {
    methods: MethodSlots<DemoObject>,
    next_handler: Cell<u32>,
    handlers: RefCell<Vec<u32>>,
}

impl SignalEmitter for DemoObject {
    type Callback = ();
    type Handler = u32;

    fn connect(&self, _signal: &str, _callback: ()) -> u32 {
        let id = self.next_handler.get() + 1;
        self.next_handler.set(id);
        self.handlers.borrow_mut().push(id);
        id
    }

    fn disconnect(&self, handler: u32) {
        self.handlers.borrow_mut().retain(|id| *id != handler);
    }
}

impl MethodTable for DemoObject {
    fn method(&self, name: &str) -> Option<Method<Self>> {
        self.methods.get(name)
    }

    fn set_method(&self, name: &str, method: Method<Self>) {
        self.methods.insert(name, method);
    }

    fn remove_method(&self, name: &str) {
        self.methods.remove(name);
    }
}

fn start_logging(log_dir: &Path) -> Result<(), String> {
    let log_dir = if log_dir.is_absolute() {
        log_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| format!("failed to resolve current directory: {err}"))?
            .join(log_dir)
    };
    init_logging(default_log_level(), &log_dir)
}

fn print_metadata(path: &Path) -> Result<(), String> {
    let metadata = load_metadata(path).map_err(|err| err.to_string())?;
    println!("metadata uuid={}", metadata.uuid);
    match metadata.resolve_gettext_domain(None) {
        Ok(domain) => println!("metadata gettext_domain={domain}"),
        Err(err) => println!("metadata gettext_domain=<none> ({err})"),
    }
    match metadata.resolve_settings_schema(None) {
        Ok(schema) => println!("metadata settings_schema={schema}"),
        Err(err) => println!("metadata settings_schema=<none> ({err})"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    println!("shellkit_core version={}", shellkit_core::core_version());

    if let Some(log_dir) = cli.log_dir.as_deref() {
        if let Err(err) = start_logging(log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }
    match logging_status() {
        Some((level, dir)) => println!("logging level={level} dir={}", dir.display()),
        None => println!("logging disabled"),
    }

    if let Some(path) = cli.metadata.as_deref() {
        if let Err(err) = print_metadata(path) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    let demo = Rc::new(DemoObject::default());
    let signals = SubscriptionRegistry::new();
    let patches = PatchRegistry::new();

    signals.push(vec![SignalBinding::new(&demo, "changed", ())]);
    signals.push_with_label("demo", vec![SignalBinding::new(&demo, "destroy", ())]);
    patches.push_with_label(
        "demo",
        vec![Injection::new(
            &demo,
            "render",
            Method::new(|_, _| Some(Value::from(1))),
        )],
    );
    println!(
        "demo handlers={} render={}",
        demo.handlers.borrow().len(),
        demo.call("render", &[]).unwrap_or(Value::Null)
    );

    signals.disconnect();
    patches.destroy();
    println!(
        "demo handlers={} render_present={}",
        demo.handlers.borrow().len(),
        demo.method("render").is_some()
    );

    ExitCode::SUCCESS
}
