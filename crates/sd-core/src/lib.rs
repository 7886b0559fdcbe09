//! Core domain entities, registry, and dispatch rules for sysdeck.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by registry, dispatch, and handler execution.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested action name is not registered.
    #[error("action not found: {0}")]
    NotFound(String),
    /// An action with the same name is already registered.
    #[error("action already registered: {0}")]
    DuplicateName(String),
    /// The action failed construction-time validation.
    #[error("invalid action {name}: {reason}")]
    InvalidAction { name: String, reason: String },
    /// No handler matches the current OS and there is no fallback.
    #[error("{action} is not supported on {os}")]
    UnsupportedOs { action: String, os: OsId },
    /// The handler ran and failed.
    #[error("{action} failed: {cause}")]
    HandlerFailed { action: String, cause: String },
    /// An install was attempted with no usable package manager.
    #[error("no supported package manager found to install {program}")]
    NoPackageManager { program: String },
    /// The installer ran but the program is still not detectable.
    #[error("{program} was installed but is still not detectable")]
    InstallVerificationFailed { program: String },
    /// A tool the UI cannot work without is missing.
    #[error("required dependency missing: {0}")]
    MandatoryDependencyMissing(String),
    /// An external process failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// The picker process misbehaved.
    #[error("picker error: {0}")]
    Picker(String),
    /// An IO error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Text shown to the user when the error reaches the session loop.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => "Invalid selection".into(),
            Self::UnsupportedOs {
                action,
                os: OsId::Unsupported,
            } => format!(
                "{action} is not available: this operating system is not supported (sysdeck runs on macOS and Linux)"
            ),
            Self::UnsupportedOs { action, os } => {
                format!("{action} is not available on {os}")
            }
            Self::NoPackageManager { program } => format!(
                "No supported package manager found. Please install {program} manually."
            ),
            Self::InstallVerificationFailed { program } => format!(
                "The installer finished, but {program} still cannot be found on PATH."
            ),
            other => other.to_string(),
        }
    }

    /// Whether the error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MandatoryDependencyMissing(_))
    }
}

/// Failures of a single external process invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable is not on PATH.
    #[error("{program} is not installed")]
    Missing { program: String },
    /// The process could not be started.
    #[error("{program} could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The process exited with a code outside the accepted set.
    #[error("{program} exited with {}", describe_code(.code))]
    Exit { program: String, code: Option<i32> },
    /// The process wrote output that is not valid UTF-8.
    #[error("{program} produced unreadable output")]
    Output { program: String },
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |code| format!("status {code}"))
}

/// Operating system the process runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OsId {
    /// Apple macOS.
    MacOs,
    /// Any Linux distribution.
    Linux,
    /// Everything else.
    Unsupported,
}

impl OsId {
    /// Identify the OS this binary was built for.
    pub fn current() -> Self {
        Self::from_target(std::env::consts::OS)
    }

    /// Map a Rust target OS string to an identifier.
    pub fn from_target(os: &str) -> Self {
        match os {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Unsupported,
        }
    }

    /// Short lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for OsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an action shows up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Main menu entries.
    Menu,
    /// Programs offered by the install menu.
    Installable,
}

/// A black-box external process: program, arguments, and accepted exit codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalTool {
    program: String,
    args: Vec<String>,
    expected_codes: Vec<i32>,
}

impl ExternalTool {
    /// Create an invocation that expects exit code 0.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            expected_codes: vec![0],
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Replace the set of exit codes treated as success.
    #[must_use]
    pub fn expect_codes(mut self, codes: &[i32]) -> Self {
        self.expected_codes = codes.to_vec();
        self
    }

    /// Run the same invocation through `sudo` when `elevate` is set.
    #[must_use]
    pub fn elevated(self, elevate: bool) -> Self {
        if !elevate {
            return self;
        }
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".into(),
            args,
            expected_codes: self.expected_codes,
        }
    }

    /// Executable name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the executable.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Whether an exit code counts as success.
    pub fn accepts(&self, code: Option<i32>) -> bool {
        code.is_some_and(|code| self.expected_codes.contains(&code))
    }

    /// Shell-like rendering used in logs and previews.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push_str(&format!("'{arg}'"));
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Spawns external processes on behalf of handlers.
pub trait CommandRunner {
    /// Whether the executable can be found on PATH.
    fn is_available(&self, program: &str) -> bool;
    /// Run with captured stdout and return it.
    fn capture(&self, tool: &ExternalTool) -> Result<String, ToolError>;
    /// Run attached to the terminal, blocking until exit.
    fn run(&self, tool: &ExternalTool) -> Result<(), ToolError>;
}

/// Side-effect-free check of whether a program is installed.
pub trait Probe {
    fn is_installed(&self, program: &str) -> bool;
}

/// Source of the preview text shown next to picker rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewKind {
    /// Describe a registered action.
    Action,
    /// Describe an installed package.
    Package,
    /// Describe a font file.
    Font,
}

impl PreviewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Package => "package",
            Self::Font => "font",
        }
    }
}

/// A single picker invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickRequest {
    /// Prompt text shown before the query.
    pub prompt: String,
    /// Rows in display order.
    pub items: Vec<String>,
    /// Preview for the highlighted row, if any.
    pub preview: Option<PreviewKind>,
}

impl PickRequest {
    pub fn new(prompt: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            items,
            preview: None,
        }
    }

    #[must_use]
    pub fn with_preview(mut self, kind: PreviewKind) -> Self {
        self.preview = Some(kind);
        self
    }
}

/// What the user did in a picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickerResult {
    /// The chosen row, when confirmed.
    pub selected: Option<String>,
    /// True when the user escaped or there was nothing to pick.
    pub cancelled: bool,
}

impl PickerResult {
    pub fn selected(label: impl Into<String>) -> Self {
        Self {
            selected: Some(label.into()),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            selected: None,
            cancelled: true,
        }
    }
}

/// Interactive filterable list.
pub trait Picker {
    fn pick(&self, request: &PickRequest) -> CoreResult<PickerResult>;
}

/// Free-text input from the user.
pub trait Prompt {
    /// Ask a question; `None` when the user entered nothing.
    fn read_line(&self, question: &str) -> CoreResult<Option<String>>;
}

/// Everything a handler may touch while it runs.
pub struct HandlerContext<'a> {
    /// OS identified at startup.
    pub os: OsId,
    /// Process spawner.
    pub runner: &'a dyn CommandRunner,
    /// Installed-program probe.
    pub probe: &'a dyn Probe,
    /// Picker for self-interactive actions.
    pub picker: &'a dyn Picker,
    /// Line input for actions that need an argument.
    pub prompt: &'a dyn Prompt,
    /// Registry, for actions that dispatch other actions.
    pub registry: &'a ActionRegistry,
    /// Prefix package-manager invocations with `sudo`.
    pub elevate: bool,
    /// Where handlers write their report.
    pub out: &'a mut dyn Write,
}

/// Result of a successful handler run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The action ran to completion.
    Completed,
    /// A program was installed and verified.
    Installed { program: String },
    /// The program was already present; nothing ran.
    AlreadyInstalled { program: String },
    /// The user backed out of an interactive action.
    Cancelled,
}

impl Outcome {
    /// Status line for the user, if the outcome warrants one.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Completed | Self::Cancelled => None,
            Self::Installed { program } => Some(format!("{program} installed successfully.")),
            Self::AlreadyInstalled { program } => Some(format!("{program} is already installed.")),
        }
    }
}

/// An executable unit owned by an action.
pub trait Handler {
    fn run(&self, ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome>;
}

impl<F> Handler for F
where
    F: Fn(&mut HandlerContext<'_>) -> CoreResult<Outcome>,
{
    fn run(&self, ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
        self(ctx)
    }
}

/// Homebrew package flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageVariant {
    /// Command-line formula.
    Formula,
    /// Application or font cask.
    Cask,
}

/// How to install one program on each platform.
pub struct InstallSpec {
    program: String,
    mac_package: String,
    linux_package: String,
    variant: PackageVariant,
    linux_fallback: Option<Box<dyn Handler>>,
}

impl InstallSpec {
    /// Spec whose package names default to the program name.
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            mac_package: program.clone(),
            linux_package: program.clone(),
            program,
            variant: PackageVariant::Formula,
            linux_fallback: None,
        }
    }

    #[must_use]
    pub fn mac_package(mut self, package: impl Into<String>) -> Self {
        self.mac_package = package.into();
        self
    }

    #[must_use]
    pub fn linux_package(mut self, package: impl Into<String>) -> Self {
        self.linux_package = package.into();
        self
    }

    /// Install through `brew install --cask` on macOS.
    #[must_use]
    pub fn cask(mut self) -> Self {
        self.variant = PackageVariant::Cask;
        self
    }

    /// Handler used on Linux when no package manager is available.
    #[must_use]
    pub fn linux_fallback(mut self, handler: impl Handler + 'static) -> Self {
        self.linux_fallback = Some(Box::new(handler));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn mac(&self) -> &str {
        &self.mac_package
    }

    pub fn linux(&self) -> &str {
        &self.linux_package
    }

    pub fn variant(&self) -> PackageVariant {
        self.variant
    }

    pub fn has_linux_fallback(&self) -> bool {
        self.linux_fallback.is_some()
    }
}

impl fmt::Debug for InstallSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallSpec")
            .field("program", &self.program)
            .field("mac_package", &self.mac_package)
            .field("linux_package", &self.linux_package)
            .field("variant", &self.variant)
            .field("linux_fallback", &self.linux_fallback.is_some())
            .finish()
    }
}

impl PartialEq for InstallSpec {
    fn eq(&self, other: &Self) -> bool {
        self.program == other.program
            && self.mac_package == other.mac_package
            && self.linux_package == other.linux_package
            && self.variant == other.variant
            && self.linux_fallback.is_some() == other.linux_fallback.is_some()
    }
}

/// Native package managers sysdeck knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageManager {
    Brew,
    Apt,
    Dnf,
    Pacman,
    Yum,
}

/// Linux install candidates, highest priority first.
pub const LINUX_INSTALLERS: [PackageManager; 3] =
    [PackageManager::Apt, PackageManager::Dnf, PackageManager::Pacman];

impl PackageManager {
    /// Executable probed on PATH.
    pub fn binary(self) -> &'static str {
        match self {
            Self::Brew => "brew",
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Yum => "yum",
        }
    }

    /// Label used in logs and previews.
    pub fn name(self) -> &'static str {
        match self {
            Self::Brew => "homebrew",
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Yum => "yum",
        }
    }

    /// Whether invocations need root.
    pub fn needs_root(self) -> bool {
        !matches!(self, Self::Brew)
    }

    /// Install invocation for a package.
    pub fn install(self, package: &str, variant: PackageVariant) -> ExternalTool {
        let tool = ExternalTool::new(self.binary());
        match self {
            Self::Brew => match variant {
                PackageVariant::Formula => tool.args(["install", package]),
                PackageVariant::Cask => tool.args(["install", "--cask", package]),
            },
            Self::Apt | Self::Dnf | Self::Yum => tool.args(["install", "-y", package]),
            Self::Pacman => tool.args(["-S", "--noconfirm", package]),
        }
    }

    /// Invocations that refresh metadata and upgrade everything, in order.
    pub fn upgrade(self) -> Vec<ExternalTool> {
        let tool = ExternalTool::new(self.binary());
        match self {
            Self::Brew => vec![tool.clone().arg("update"), tool.arg("upgrade")],
            Self::Apt => vec![tool.clone().arg("update"), tool.args(["upgrade", "-y"])],
            Self::Dnf | Self::Yum => vec![tool.args(["upgrade", "-y"])],
            Self::Pacman => vec![tool.args(["-Syu", "--noconfirm"])],
        }
    }

    /// First manager in `order` whose binary is on PATH.
    pub fn first_available(
        runner: &dyn CommandRunner,
        order: &[PackageManager],
    ) -> Option<PackageManager> {
        order
            .iter()
            .copied()
            .find(|manager| runner.is_available(manager.binary()))
    }
}

/// Registry name of the action that installs `program`.
pub fn install_action_name(program: &str) -> String {
    format!("install_{program}")
}

/// Install a program, verifying the result with a second probe.
pub fn install_program(spec: &InstallSpec, ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    let program = spec.program();
    if ctx.probe.is_installed(program) {
        debug!(program, "already installed");
        return Ok(Outcome::AlreadyInstalled {
            program: program.to_string(),
        });
    }

    match ctx.os {
        OsId::MacOs => {
            let tool = PackageManager::Brew.install(spec.mac(), spec.variant());
            writeln!(ctx.out, "Installing {program} with homebrew...")?;
            info!(command = %tool.command_line(), "installing");
            ctx.runner.run(&tool)?;
        }
        OsId::Linux => match PackageManager::first_available(ctx.runner, &LINUX_INSTALLERS) {
            Some(manager) => {
                let tool = manager
                    .install(spec.linux(), PackageVariant::Formula)
                    .elevated(ctx.elevate && manager.needs_root());
                writeln!(ctx.out, "Installing {program} with {}...", manager.name())?;
                info!(command = %tool.command_line(), "installing");
                ctx.runner.run(&tool)?;
            }
            None => match &spec.linux_fallback {
                Some(fallback) => {
                    writeln!(ctx.out, "No package manager found, using fallback installer for {program}...")?;
                    info!(program, "running fallback installer");
                    fallback.run(ctx)?;
                }
                None => {
                    return Err(CoreError::NoPackageManager {
                        program: program.to_string(),
                    })
                }
            },
        },
        OsId::Unsupported => {
            return Err(CoreError::UnsupportedOs {
                action: format!("installing {program}"),
                os: ctx.os,
            })
        }
    }

    if ctx.probe.is_installed(program) {
        Ok(Outcome::Installed {
            program: program.to_string(),
        })
    } else {
        warn!(program, "installer succeeded but program is not detectable");
        Err(CoreError::InstallVerificationFailed {
            program: program.to_string(),
        })
    }
}

/// Handler wrapping [`install_program`] for one spec.
struct InstallHandler {
    spec: std::rc::Rc<InstallSpec>,
}

impl Handler for InstallHandler {
    fn run(&self, ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
        install_program(&self.spec, ctx)
    }
}

/// Candidates tried in order until one succeeds.
pub struct Chain {
    steps: Vec<Box<dyn Handler>>,
}

impl Chain {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    #[must_use]
    pub fn then(mut self, step: impl Handler + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for Chain {
    fn run(&self, ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
        let mut last_error = None;
        for (index, step) in self.steps.iter().enumerate() {
            match step.run(ctx) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    debug!(step = index, error = %err, "chain step failed, trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::InvalidAction {
            name: "chain".into(),
            reason: "no steps to run".into(),
        }))
    }
}

/// Runs one external tool and writes its output.
pub struct ToolHandler {
    tool: ExternalTool,
    attached: bool,
    format: Option<fn(&str) -> String>,
}

impl ToolHandler {
    /// Capture stdout and print it.
    pub fn new(tool: ExternalTool) -> Self {
        Self {
            tool,
            attached: false,
            format: None,
        }
    }

    /// Let the process own the terminal instead of capturing it.
    #[must_use]
    pub fn attached(mut self) -> Self {
        self.attached = true;
        self
    }

    /// Post-process captured stdout before printing.
    #[must_use]
    pub fn format(mut self, format: fn(&str) -> String) -> Self {
        self.format = Some(format);
        self
    }
}

impl Handler for ToolHandler {
    fn run(&self, ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
        let program = self.tool.program();
        if !ctx.runner.is_available(program) {
            return Err(ToolError::Missing {
                program: program.to_string(),
            }
            .into());
        }
        if self.attached {
            ctx.runner.run(&self.tool)?;
            return Ok(Outcome::Completed);
        }
        let output = ctx.runner.capture(&self.tool)?;
        let output = match self.format {
            Some(format) => format(&output),
            None => output,
        };
        write!(ctx.out, "{output}")?;
        if !output.ends_with('\n') {
            writeln!(ctx.out)?;
        }
        Ok(Outcome::Completed)
    }
}

/// A named, dispatchable unit with per-OS handlers.
pub struct Action {
    name: String,
    category: Category,
    description: String,
    interactive: bool,
    handlers: BTreeMap<OsId, Box<dyn Handler>>,
    fallback: Option<Box<dyn Handler>>,
    install: Option<std::rc::Rc<InstallSpec>>,
}

impl Action {
    /// A main-menu action with no handlers yet.
    pub fn menu(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: Category::Menu,
            description: description.into(),
            interactive: false,
            handlers: BTreeMap::new(),
            fallback: None,
            install: None,
        }
    }

    /// An `install_<program>` action driven by [`install_program`].
    pub fn installable(spec: InstallSpec, description: impl Into<String>) -> Self {
        let spec = std::rc::Rc::new(spec);
        let mut handlers: BTreeMap<OsId, Box<dyn Handler>> = BTreeMap::new();
        for os in [OsId::MacOs, OsId::Linux] {
            handlers.insert(
                os,
                Box::new(InstallHandler {
                    spec: std::rc::Rc::clone(&spec),
                }),
            );
        }
        Self {
            name: install_action_name(spec.program()),
            category: Category::Installable,
            description: description.into(),
            interactive: false,
            handlers,
            fallback: None,
            install: Some(spec),
        }
    }

    /// Attach the handler for one OS.
    #[must_use]
    pub fn on(mut self, os: OsId, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(os, Box::new(handler));
        self
    }

    /// Handler used when no OS-specific one matches.
    #[must_use]
    pub fn fallback(mut self, handler: impl Handler + 'static) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Mark the action as owning its own picker UI.
    #[must_use]
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn install_spec(&self) -> Option<&InstallSpec> {
        self.install.as_deref()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// OSes with a dedicated handler.
    pub fn platforms(&self) -> Vec<OsId> {
        self.handlers.keys().copied().collect()
    }

    /// Whether the action can run on `os`.
    pub fn supports(&self, os: OsId) -> bool {
        self.handlers.contains_key(&os) || self.fallback.is_some()
    }

    fn handler_for(&self, os: OsId) -> Option<&(dyn Handler + 'static)> {
        self.handlers
            .get(&os)
            .map(|handler| &**handler)
            .or(self.fallback.as_deref())
    }

    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidAction {
                name: self.name.clone(),
                reason: "name cannot be empty".into(),
            });
        }
        for os in [OsId::MacOs, OsId::Linux] {
            if !self.supports(os) {
                return Err(CoreError::InvalidAction {
                    name: self.name.clone(),
                    reason: format!("no handler for {os} and no fallback"),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("interactive", &self.interactive)
            .field("platforms", &self.platforms())
            .field("fallback", &self.fallback.is_some())
            .field("install", &self.install)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.category == other.category
            && self.description == other.description
            && self.interactive == other.interactive
            && self.platforms() == other.platforms()
            && self.fallback.is_some() == other.fallback.is_some()
            && self.install == other.install
    }
}

/// Statically declared catalog of actions.
#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action, rejecting duplicates and actions missing a platform.
    pub fn register(&mut self, action: Action) -> CoreResult<()> {
        action.validate()?;
        if self.actions.contains_key(action.name()) {
            return Err(CoreError::DuplicateName(action.name().to_string()));
        }
        debug!(name = action.name(), category = ?action.category(), "registered action");
        self.actions.insert(action.name().to_string(), action);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> CoreResult<&Action> {
        self.actions
            .get(name)
            .ok_or_else(|| CoreError::NotFound(name.to_string()))
    }

    /// Names in one category, sorted lexicographically.
    pub fn list_by_category(&self, category: Category) -> Vec<&str> {
        self.actions
            .values()
            .filter(|action| action.category() == category)
            .map(Action::name)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Resolves action names to handlers and runs them.
pub struct Dispatcher<'r> {
    registry: &'r ActionRegistry,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r ActionRegistry) -> Self {
        Self { registry }
    }

    /// Pick the handler: exact OS, then fallback.
    pub fn resolve(&self, name: &str, os: OsId) -> CoreResult<&'r (dyn Handler + 'static)> {
        let action = self.registry.lookup(name)?;
        action.handler_for(os).ok_or_else(|| CoreError::UnsupportedOs {
            action: name.to_string(),
            os,
        })
    }

    /// Run an action for `ctx.os`, folding handler errors into `HandlerFailed`.
    pub fn execute(&self, name: &str, ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
        let handler = self.resolve(name, ctx.os)?;
        info!(action = name, os = %ctx.os, "dispatching");
        handler.run(ctx).map_err(|err| match err {
            CoreError::HandlerFailed { .. }
            | CoreError::NoPackageManager { .. }
            | CoreError::InstallVerificationFailed { .. }
            | CoreError::UnsupportedOs { .. }
            | CoreError::NotFound(_)
            | CoreError::MandatoryDependencyMissing(_) => err,
            other => CoreError::HandlerFailed {
                action: name.to_string(),
                cause: other.to_string(),
            },
        })
    }
}
