//! Interactive session for sysdeck: fzf picker, previews, console, and the menu loop.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, info, warn};

use sd_actions::{detect_manager, font_details, package_info_tool};
use sd_config::Settings;
use sd_core::{
    install_action_name, ActionRegistry, Category, CommandRunner, CoreError, CoreResult, Dispatcher, HandlerContext,
    OsId, Outcome, PackageManager, PackageVariant, PickRequest, Picker, PickerResult,
    PreviewKind, Probe, Prompt, LINUX_INSTALLERS,
};
use sd_utils::{truncate_lines, PathProbe, SystemRunner};

/// Main-menu row that ends the session.
pub const EXIT_LABEL: &str = "Exit";

const PREVIEW_MAX_LINES: usize = 200;

/// Runs fzf as a child process, one invocation per pick.
///
/// Empty input is reported as a cancel without spawning; callers decide what
/// to tell the user.
#[derive(Debug, Clone)]
pub struct FzfPicker {
    program: String,
    preview_exe: Option<PathBuf>,
    color: bool,
}

impl FzfPicker {
    pub fn new(program: impl Into<String>, preview_exe: Option<PathBuf>, color: bool) -> Self {
        Self {
            program: program.into(),
            preview_exe,
            color,
        }
    }

    /// Command-line arguments for `request`.
    pub fn args(&self, request: &PickRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--prompt".into(),
            format!("{} > ", request.prompt),
            "--height".into(),
            "80%".into(),
            "--layout".into(),
            "reverse".into(),
            "--border".into(),
            "--no-multi".into(),
        ];
        if self.color {
            args.push("--ansi".into());
        } else {
            args.push("--no-color".into());
        }
        if let (Some(kind), Some(exe)) = (request.preview, &self.preview_exe) {
            args.push("--preview".into());
            args.push(format!(
                "{} preview --kind {} {{}}",
                shell_quote(&exe.display().to_string()),
                kind.as_str()
            ));
            args.push("--preview-window".into());
            args.push("right:60%:wrap".into());
        }
        args
    }
}

impl Picker for FzfPicker {
    fn pick(&self, request: &PickRequest) -> CoreResult<PickerResult> {
        if request.items.is_empty() {
            debug!(prompt = %request.prompt, "nothing to pick from");
            return Ok(PickerResult::cancelled());
        }

        debug!(prompt = %request.prompt, items = request.items.len(), "opening picker");
        let mut child = Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| CoreError::Picker(format!("{} could not be started: {err}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = request.items.join("\n");
            if let Err(err) = stdin.write_all(input.as_bytes()) {
                if err.kind() != io::ErrorKind::BrokenPipe {
                    return Err(err.into());
                }
            }
        }

        let output = child.wait_with_output()?;
        interpret_exit(&self.program, output.status.code(), &output.stdout)
    }
}

/// Map a picker exit status and stdout to a [`PickerResult`].
pub fn interpret_exit(program: &str, code: Option<i32>, stdout: &[u8]) -> CoreResult<PickerResult> {
    match code {
        Some(0) => {
            let text = String::from_utf8_lossy(stdout);
            match text.lines().next().map(str::trim_end) {
                Some(line) if !line.is_empty() => Ok(PickerResult::selected(line)),
                _ => Ok(PickerResult::cancelled()),
            }
        }
        // 1: no match, 130: escape or ctrl-c inside fzf.
        Some(1 | 130) => Ok(PickerResult::cancelled()),
        Some(code) => Err(CoreError::Picker(format!("{program} exited with status {code}"))),
        None => Err(CoreError::Picker(format!("{program} was terminated by a signal"))),
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Builds preview text for picker rows. Never fails.
pub struct PreviewRenderer<'a> {
    registry: &'a ActionRegistry,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn Probe,
    os: OsId,
}

impl<'a> PreviewRenderer<'a> {
    pub fn new(
        registry: &'a ActionRegistry,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn Probe,
        os: OsId,
    ) -> Self {
        Self {
            registry,
            runner,
            probe,
            os,
        }
    }

    pub fn render(&self, kind: PreviewKind, label: &str) -> String {
        match kind {
            PreviewKind::Action => self.render_action(label),
            PreviewKind::Package => self.render_package(label),
            PreviewKind::Font => font_details(Path::new(label), self.runner),
        }
    }

    fn render_action(&self, label: &str) -> String {
        if label == EXIT_LABEL {
            return "# Exit\n\nLeave sysdeck.".into();
        }
        let Ok(action) = self.registry.lookup(label) else {
            return format!("# {label}\n\nNo description available.");
        };

        let platforms = if action.has_fallback() {
            "all".to_string()
        } else {
            let names: Vec<&str> = action.platforms().into_iter().map(OsId::as_str).collect();
            names.join(", ")
        };
        let mut lines = vec![
            format!("# {}", action.name()),
            String::new(),
            action.description().to_string(),
            String::new(),
            format!("platforms: {platforms}"),
            format!(
                "available here: {}",
                if action.supports(self.os) { "yes" } else { "no" }
            ),
        ];

        if let Some(spec) = action.install_spec() {
            let package = match (self.os, spec.variant()) {
                (OsId::MacOs, PackageVariant::Cask) => format!("{} (cask)", spec.mac()),
                (OsId::MacOs, PackageVariant::Formula) => spec.mac().to_string(),
                _ => spec.linux().to_string(),
            };
            let status = if self.probe.is_installed(spec.program()) {
                "installed"
            } else {
                "not installed"
            };
            lines.push(format!("program: {}", spec.program()));
            lines.push(format!("package: {package}"));
            lines.push(format!("status: {status}"));
            lines.push(format!(
                "installer: {}",
                self.installer_name(spec.has_linux_fallback())
            ));
        }
        lines.join("\n")
    }

    fn installer_name(&self, has_fallback: bool) -> String {
        match self.os {
            OsId::MacOs if self.runner.is_available(PackageManager::Brew.binary()) => {
                PackageManager::Brew.name().into()
            }
            OsId::MacOs => format!("{} (not found)", PackageManager::Brew.name()),
            OsId::Linux => match PackageManager::first_available(self.runner, &LINUX_INSTALLERS) {
                Some(manager) => manager.name().into(),
                None if has_fallback => "install script".into(),
                None => "none found".into(),
            },
            OsId::Unsupported => "unsupported".into(),
        }
    }

    fn render_package(&self, label: &str) -> String {
        let Some(manager) = detect_manager(self.runner, self.os) else {
            return format!("{label}\n\nNo package manager found.");
        };
        match self.runner.capture(&package_info_tool(manager, label)) {
            Ok(text) => truncate_lines(&text, PREVIEW_MAX_LINES),
            Err(err) => format!("{label}\n\nNo details available: {err}"),
        }
    }
}

/// Syntax highlighter used for preview text, falling back to plain output.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    program: Option<String>,
    color: bool,
}

impl Formatter {
    /// Pick the first candidate that is on PATH.
    pub fn resolve(candidates: &[String], runner: &dyn CommandRunner, color: bool) -> Self {
        let program = candidates
            .iter()
            .find(|candidate| runner.is_available(candidate))
            .cloned();
        Self { program, color }
    }

    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    pub fn format(&self, text: &str) -> String {
        let Some(program) = &self.program else {
            return text.to_string();
        };
        match pipe_through(program, text, self.color) {
            Ok(formatted) => formatted,
            Err(err) => {
                debug!(program = %program, error = %err, "formatter failed, using plain text");
                text.to_string()
            }
        }
    }
}

fn pipe_through(program: &str, text: &str, color: bool) -> io::Result<String> {
    let mut child = Command::new(program)
        .args([
            "--language",
            "yaml",
            "--style",
            "plain",
            "--paging",
            "never",
            "--color",
            if color { "always" } else { "never" },
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let stdin = child.stdin.take();
    // The formatter streams; feed it from a second thread while stdout drains.
    let output = std::thread::scope(|scope| {
        let writer = scope.spawn(move || -> io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(text.as_bytes())?;
            }
            Ok(())
        });
        let output = child.wait_with_output();
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("formatter input thread panicked")));
        written.and(output)
    })?;
    if !output.status.success() {
        return Err(io::Error::other(format!("{program} exited with {}", output.status)));
    }
    String::from_utf8(output.stdout).map_err(io::Error::other)
}

/// User-facing messages and key-press interactions.
pub trait Console {
    fn message(&self, text: &str);
    fn error(&self, text: &str);
    /// Ask a yes/no question; anything but `y` means no.
    fn confirm(&self, question: &str) -> CoreResult<bool>;
    fn wait_for_key(&self) -> CoreResult<()>;
}

/// Console on the controlling terminal.
#[derive(Debug, Clone, Copy)]
pub struct TerminalConsole {
    color: bool,
}

impl TerminalConsole {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl Console for TerminalConsole {
    fn message(&self, text: &str) {
        if self.color {
            println!("{}", text.green());
        } else {
            println!("{text}");
        }
    }

    fn error(&self, text: &str) {
        if self.color {
            eprintln!("{}", text.red());
        } else {
            eprintln!("{text}");
        }
    }

    fn confirm(&self, question: &str) -> CoreResult<bool> {
        print!("{question} [y/N] ");
        io::stdout().flush()?;
        let code = read_key()?;
        let answer = matches!(code, KeyCode::Char('y' | 'Y'));
        println!("{}", if answer { "y" } else { "n" });
        Ok(answer)
    }

    fn wait_for_key(&self) -> CoreResult<()> {
        print!("\nPress any key to return to the menu...");
        io::stdout().flush()?;
        read_key()?;
        println!();
        Ok(())
    }
}

impl Prompt for TerminalConsole {
    fn read_line(&self, question: &str) -> CoreResult<Option<String>> {
        print!("{question}: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            warn!(error = %err, "failed to restore terminal");
        }
    }
}

/// Block for one key press. Ctrl-C surfaces as [`io::ErrorKind::Interrupted`].
fn read_key() -> io::Result<KeyCode> {
    let _raw = RawMode::enable()?;
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
            }
            return Ok(key.code);
        }
    }
}

/// A tool the session cannot start without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name shown to the user.
    pub label: String,
    /// Executables that satisfy the dependency.
    pub candidates: Vec<String>,
    /// Registered action that installs it, if there is one.
    pub install_action: Option<String>,
}

impl Dependency {
    fn satisfied(&self, runner: &dyn CommandRunner) -> bool {
        self.candidates
            .iter()
            .any(|candidate| runner.is_available(candidate))
    }
}

/// The picker and formatter configured in `settings`, each paired with the
/// registered action that installs it.
///
/// An empty formatter list turns formatting off, so only the picker is required.
pub fn mandatory_dependencies(settings: &Settings, registry: &ActionRegistry) -> Vec<Dependency> {
    let installer = |program: &str| -> Option<String> {
        let name = install_action_name(program);
        registry.lookup(&name).is_ok().then_some(name)
    };

    let mut dependencies = vec![Dependency {
        label: settings.picker.clone(),
        candidates: vec![settings.picker.clone()],
        install_action: installer(&settings.picker),
    }];
    if let Some(first) = settings.formatter.first() {
        dependencies.push(Dependency {
            label: first.clone(),
            candidates: settings.formatter.clone(),
            install_action: settings
                .formatter
                .iter()
                .find_map(|candidate| installer(candidate.as_str())),
        });
    }
    dependencies
}

/// Where the session loop is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    MainMenu,
    /// Running the named action.
    Executing(String),
    /// Output is on screen; waiting for a key.
    AwaitingConfirmation,
    Exit,
}

pub struct Session<'a, C, W> {
    registry: &'a ActionRegistry,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn Probe,
    picker: &'a dyn Picker,
    console: &'a C,
    out: W,
    os: OsId,
    elevate: bool,
    state: SessionState,
}

impl<'a, C, W> Session<'a, C, W>
where
    C: Console + Prompt,
    W: Write,
{
    pub fn new(
        registry: &'a ActionRegistry,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn Probe,
        picker: &'a dyn Picker,
        console: &'a C,
        out: W,
        os: OsId,
    ) -> Self {
        Self {
            registry,
            runner,
            probe,
            picker,
            console,
            out,
            os,
            elevate: false,
            state: SessionState::MainMenu,
        }
    }

    /// Run Linux package-manager installs through sudo.
    #[must_use]
    pub fn elevate(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn dispatch(&mut self, name: &str) -> CoreResult<Outcome> {
        let mut ctx = HandlerContext {
            os: self.os,
            runner: self.runner,
            probe: self.probe,
            picker: self.picker,
            prompt: self.console,
            registry: self.registry,
            elevate: self.elevate,
            out: &mut self.out,
        };
        let result = Dispatcher::new(self.registry).execute(name, &mut ctx);
        if let Err(err) = self.out.flush() {
            debug!(error = %err, "flush failed");
        }
        result
    }

    /// Offer to install each missing dependency; fail if any stays missing.
    pub fn ensure_dependencies(&mut self, dependencies: &[Dependency]) -> CoreResult<()> {
        for dependency in dependencies {
            if dependency.satisfied(self.runner) {
                continue;
            }
            let Some(install_action) = dependency.install_action.as_deref() else {
                self.console.error(&format!(
                    "{} is required but was not found. Please install it manually.",
                    dependency.label
                ));
                return Err(CoreError::MandatoryDependencyMissing(dependency.label.clone()));
            };
            let question = format!(
                "{} is required but was not found. Install it now?",
                dependency.label
            );
            if !self.console.confirm(&question)? {
                return Err(CoreError::MandatoryDependencyMissing(dependency.label.clone()));
            }
            match self.dispatch(install_action) {
                Ok(outcome) => {
                    if let Some(message) = outcome.message() {
                        self.console.message(&message);
                    }
                }
                Err(err) => self.console.error(&err.user_message()),
            }
            if !dependency.satisfied(self.runner) {
                return Err(CoreError::MandatoryDependencyMissing(dependency.label.clone()));
            }
        }
        Ok(())
    }

    /// Advance the state machine by one transition.
    pub fn step(&mut self) -> CoreResult<()> {
        let next = match self.state.clone() {
            SessionState::MainMenu => self.main_menu()?,
            SessionState::Executing(name) => self.execute(&name),
            SessionState::AwaitingConfirmation => {
                self.console.wait_for_key()?;
                SessionState::MainMenu
            }
            SessionState::Exit => SessionState::Exit,
        };
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
        Ok(())
    }

    /// Step until the user exits.
    pub fn run(&mut self) -> CoreResult<()> {
        while self.state != SessionState::Exit {
            self.step()?;
        }
        Ok(())
    }

    fn main_menu(&mut self) -> CoreResult<SessionState> {
        let mut items: Vec<String> = self
            .registry
            .list_by_category(Category::Menu)
            .into_iter()
            .map(str::to_string)
            .collect();
        items.push(EXIT_LABEL.into());

        let request = PickRequest::new("sysdeck", items).with_preview(PreviewKind::Action);
        let result = self.picker.pick(&request)?;
        Ok(match result.selected {
            _ if result.cancelled => SessionState::MainMenu,
            Some(label) if label == EXIT_LABEL => SessionState::Exit,
            Some(label) => SessionState::Executing(label),
            None => SessionState::MainMenu,
        })
    }

    fn execute(&mut self, name: &str) -> SessionState {
        let result = self.dispatch(name);
        let backed_out = matches!(result, Ok(Outcome::Cancelled));
        match result {
            Ok(outcome) => {
                if let Some(message) = outcome.message() {
                    self.console.message(&message);
                }
            }
            Err(err) => {
                warn!(action = name, error = %err, "action failed");
                self.console.error(&err.user_message());
            }
        }

        let drives_own_ui = self
            .registry
            .lookup(name)
            .is_ok_and(|action| action.category() == Category::Menu && action.is_interactive());
        if drives_own_ui && backed_out {
            SessionState::MainMenu
        } else {
            SessionState::AwaitingConfirmation
        }
    }
}

/// Check dependencies and run the interactive loop on the real terminal.
pub fn run(
    settings: &Settings,
    registry: &ActionRegistry,
    os: OsId,
    elevate: bool,
    color: bool,
) -> Result<()> {
    let runner = SystemRunner::new();
    let probe = PathProbe;
    let preview_exe = std::env::current_exe().ok();
    let picker = FzfPicker::new(settings.picker.clone(), preview_exe, color);
    let console = TerminalConsole::new(color);

    info!(os = %os, actions = registry.len(), "starting session");
    let mut session = Session::new(
        registry,
        &runner,
        &probe,
        &picker,
        &console,
        io::stdout(),
        os,
    )
    .elevate(elevate);

    session
        .ensure_dependencies(&mandatory_dependencies(settings, registry))
        .context("dependency check failed")?;
    session.run().context("session ended unexpectedly")?;
    Ok(())
}

/// Render and highlight one preview, as invoked by the picker.
pub fn render_preview(
    settings: &Settings,
    registry: &ActionRegistry,
    os: OsId,
    kind: PreviewKind,
    label: &str,
    color: bool,
) -> String {
    let runner = SystemRunner::new();
    let probe = PathProbe;
    let text = PreviewRenderer::new(registry, &runner, &probe, os).render(kind, label);
    Formatter::resolve(&settings.formatter, &runner, color).format(&text)
}
