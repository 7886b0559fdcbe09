//! Built-in action catalog for sysdeck.
//!
//! Every menu entry and installable program is declared here and handed to
//! the registry by [`default_registry`]. Handlers only talk to the system
//! through the collaborators in [`HandlerContext`].

use std::path::{Path, PathBuf};

use sd_core::{
    Action, ActionRegistry, Category, Chain, CommandRunner, CoreError, CoreResult, Dispatcher,
    ExternalTool, Handler, HandlerContext, InstallSpec, OsId, Outcome, PackageManager, PickRequest,
    PreviewKind, ToolError, ToolHandler,
};
use sd_utils::{human_size, non_empty_lines, read_text, UtilsError};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const BROWSE_PROGRAMS: &str = "Browse installed programs";
pub const BROWSE_FONTS: &str = "Browse installed fonts";
pub const DNS_CONFIGURATION: &str = "DNS configuration";
pub const DNS_LOOKUP: &str = "DNS lookup";
pub const INSTALL_PROGRAMS: &str = "Install programs";
pub const NETWORK_INTERFACES: &str = "Network interfaces";
pub const OPEN_PORTS: &str = "Open ports";
pub const REFRESH_FONT_CACHE: &str = "Refresh font cache";
pub const ROUTING_TABLE: &str = "Routing table";
pub const UPDATE_PACKAGES: &str = "Update packages";

/// Linux managers consulted for listing and upgrades.
pub const LINUX_MANAGERS: [PackageManager; 4] = [
    PackageManager::Apt,
    PackageManager::Dnf,
    PackageManager::Pacman,
    PackageManager::Yum,
];

const FONT_EXTENSIONS: [&str; 9] = [
    "ttf", "otf", "ttc", "otc", "woff", "woff2", "pfb", "pcf", "dfont",
];

const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Build the registry with every built-in action.
pub fn default_registry() -> CoreResult<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    for action in menu_actions().into_iter().chain(installables()) {
        registry.register(action)?;
    }
    info!(actions = registry.len(), "registry built");
    Ok(registry)
}

fn menu_actions() -> Vec<Action> {
    vec![
        Action::menu(
            BROWSE_PROGRAMS,
            "Pick from the packages installed by the native package manager and show their details.",
        )
        .on(OsId::MacOs, browse_programs)
        .on(OsId::Linux, browse_programs)
        .interactive(),
        Action::menu(
            BROWSE_FONTS,
            "Pick from the font files in the system and user font directories.",
        )
        .on(OsId::MacOs, browse_fonts)
        .on(OsId::Linux, browse_fonts)
        .interactive(),
        Action::menu(DNS_CONFIGURATION, "Show the resolvers and search domains in use.")
            .on(OsId::MacOs, ToolHandler::new(ExternalTool::new("scutil").arg("--dns")))
            .on(
                OsId::Linux,
                Chain::new()
                    .then(ToolHandler::new(ExternalTool::new("resolvectl").arg("status")))
                    .then(show_resolv_conf),
            ),
        Action::menu(DNS_LOOKUP, "Resolve a host name with nslookup.")
            .on(OsId::MacOs, dns_lookup)
            .on(OsId::Linux, dns_lookup),
        Action::menu(
            INSTALL_PROGRAMS,
            "Choose a developer tool to install with the native package manager.",
        )
        .on(OsId::MacOs, install_programs)
        .on(OsId::Linux, install_programs)
        .interactive(),
        Action::menu(NETWORK_INTERFACES, "List network interfaces and their addresses.")
            .on(OsId::MacOs, ToolHandler::new(ExternalTool::new("ifconfig")))
            .on(
                OsId::Linux,
                Chain::new()
                    .then(ToolHandler::new(
                        ExternalTool::new("ip").args(["-brief", "address"]),
                    ))
                    .then(ToolHandler::new(ExternalTool::new("ifconfig"))),
            ),
        Action::menu(OPEN_PORTS, "List sockets listening for connections.")
            .on(OsId::MacOs, lsof_listening())
            .on(
                OsId::Linux,
                Chain::new()
                    .then(ToolHandler::new(ExternalTool::new("ss").arg("-tulpn")))
                    .then(lsof_listening()),
            ),
        Action::menu(REFRESH_FONT_CACHE, "Rebuild the font cache so new fonts show up.")
            .on(
                OsId::MacOs,
                ToolHandler::new(ExternalTool::new("atsutil").args(["databases", "-remove"]))
                    .attached(),
            )
            .on(
                OsId::Linux,
                ToolHandler::new(ExternalTool::new("fc-cache").args(["-f", "-v"])).attached(),
            ),
        Action::menu(ROUTING_TABLE, "Show the kernel routing table.")
            .on(OsId::MacOs, ToolHandler::new(ExternalTool::new("netstat").arg("-rn")))
            .on(
                OsId::Linux,
                Chain::new()
                    .then(ToolHandler::new(ExternalTool::new("ip").arg("route")))
                    .then(ToolHandler::new(ExternalTool::new("netstat").arg("-rn"))),
            ),
        Action::menu(UPDATE_PACKAGES, "Refresh package metadata and upgrade everything.")
            .on(OsId::MacOs, update_packages)
            .on(OsId::Linux, update_packages),
    ]
}

fn installables() -> Vec<Action> {
    vec![
        Action::installable(
            InstallSpec::new("fzf"),
            "Command-line fuzzy finder. sysdeck menus run on it.",
        ),
        Action::installable(
            InstallSpec::new("sk").linux_package("skim"),
            "Fuzzy finder written in Rust (skim). Usable as the sysdeck picker.",
        ),
        Action::installable(
            InstallSpec::new("bat"),
            "cat clone with syntax highlighting. Formats sysdeck previews.",
        ),
        Action::installable(InstallSpec::new("htop"), "Interactive process viewer."),
        Action::installable(InstallSpec::new("git"), "Distributed version control."),
        Action::installable(InstallSpec::new("jq"), "Command-line JSON processor."),
        Action::installable(
            InstallSpec::new("rg")
                .mac_package("ripgrep")
                .linux_package("ripgrep"),
            "Recursive regex search (ripgrep).",
        ),
        Action::installable(
            InstallSpec::new("fd").linux_package("fd-find"),
            "Fast alternative to find.",
        ),
        Action::installable(InstallSpec::new("tmux"), "Terminal multiplexer."),
        Action::installable(
            InstallSpec::new("nvim")
                .mac_package("neovim")
                .linux_package("neovim"),
            "Neovim text editor.",
        ),
        Action::installable(InstallSpec::new("curl"), "URL transfer tool."),
        Action::installable(
            InstallSpec::new("starship").linux_fallback(starship_script),
            "Cross-shell prompt.",
        ),
        Action::installable(
            InstallSpec::new("code")
                .mac_package("visual-studio-code")
                .cask()
                .linux_package("code"),
            "Visual Studio Code editor.",
        ),
    ]
}

fn lsof_listening() -> ToolHandler {
    ToolHandler::new(
        ExternalTool::new("lsof")
            .args(["-i", "-P", "-n"])
            .expect_codes(&[0, 1]),
    )
    .format(listening_only)
}

/// Keep the lsof header and the sockets in LISTEN state.
pub fn listening_only(output: &str) -> String {
    let mut lines = output.lines();
    let mut kept = Vec::new();
    if let Some(header) = lines.next() {
        kept.push(header);
    }
    kept.extend(lines.filter(|line| line.contains("LISTEN")));
    let mut text = kept.join("\n");
    text.push('\n');
    text
}

/// The package manager that owns installed software on `os`.
pub fn detect_manager(runner: &dyn CommandRunner, os: OsId) -> Option<PackageManager> {
    match os {
        OsId::MacOs => runner
            .is_available(PackageManager::Brew.binary())
            .then_some(PackageManager::Brew),
        OsId::Linux => PackageManager::first_available(runner, &LINUX_MANAGERS),
        OsId::Unsupported => None,
    }
}

fn list_tools(manager: PackageManager) -> Vec<ExternalTool> {
    match manager {
        PackageManager::Brew => vec![
            ExternalTool::new("brew").args(["list", "--formula", "-1"]),
            ExternalTool::new("brew").args(["list", "--cask", "-1"]),
        ],
        PackageManager::Apt => {
            vec![ExternalTool::new("dpkg-query").args(["-W", "-f=${binary:Package}\n"])]
        }
        PackageManager::Pacman => vec![ExternalTool::new("pacman").arg("-Qq")],
        PackageManager::Dnf | PackageManager::Yum => {
            vec![ExternalTool::new("rpm").args(["-qa", "--qf", "%{NAME}\n"])]
        }
    }
}

/// Invocation that describes one installed package.
pub fn package_info_tool(manager: PackageManager, package: &str) -> ExternalTool {
    match manager {
        PackageManager::Brew => ExternalTool::new("brew").args(["info", package]),
        PackageManager::Apt => ExternalTool::new("apt-cache").args(["show", package]),
        PackageManager::Pacman => ExternalTool::new("pacman").args(["-Qi", package]),
        PackageManager::Dnf | PackageManager::Yum => {
            ExternalTool::new("rpm").args(["-qi", package])
        }
    }
}

/// Sorted names of installed packages.
pub fn installed_packages(
    runner: &dyn CommandRunner,
    manager: PackageManager,
) -> CoreResult<Vec<String>> {
    let mut packages = Vec::new();
    let mut last_error = None;
    let mut listed = false;

    for tool in list_tools(manager) {
        match runner.capture(&tool) {
            Ok(output) => {
                listed = true;
                packages.extend(non_empty_lines(&output).map(str::to_string));
            }
            Err(err) => {
                debug!(command = %tool.command_line(), error = %err, "package listing failed");
                last_error = Some(err);
            }
        }
    }

    if let (false, Some(err)) = (listed, last_error) {
        return Err(err.into());
    }
    packages.sort();
    packages.dedup();
    Ok(packages)
}

fn no_package_manager() -> CoreError {
    ToolError::Missing {
        program: "a supported package manager".into(),
    }
    .into()
}

fn browse_programs(ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    let manager = detect_manager(ctx.runner, ctx.os).ok_or_else(no_package_manager)?;
    let packages = installed_packages(ctx.runner, manager)?;
    if packages.is_empty() {
        writeln!(ctx.out, "No installed packages found.")?;
        return Ok(Outcome::Completed);
    }
    let request = PickRequest::new(format!("{} packages", manager.name()), packages)
        .with_preview(PreviewKind::Package);

    let Some(package) = ctx.picker.pick(&request)?.selected else {
        return Ok(Outcome::Cancelled);
    };
    let details = ctx.runner.capture(&package_info_tool(manager, &package))?;
    write!(ctx.out, "{details}")?;
    Ok(Outcome::Completed)
}

/// System and user font directories for `os`.
pub fn font_dirs(os: OsId) -> Vec<PathBuf> {
    let mut roots = match os {
        OsId::MacOs => vec![
            PathBuf::from("/System/Library/Fonts"),
            PathBuf::from("/Library/Fonts"),
        ],
        OsId::Linux => vec![
            PathBuf::from("/usr/share/fonts"),
            PathBuf::from("/usr/local/share/fonts"),
        ],
        OsId::Unsupported => Vec::new(),
    };
    if let Some(user) = dirs::font_dir() {
        roots.push(user);
    }
    if os == OsId::Linux {
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join(".fonts"));
        }
    }
    roots
}

/// Whether the path has a known font file extension.
pub fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FONT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Every font file below the given directories, sorted.
pub fn installed_fonts(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut fonts: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| dir.exists())
        .flat_map(|dir| {
            WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(Result::ok)
        })
        .filter(|entry| entry.file_type().is_file() && is_font_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    fonts.sort();
    fonts.dedup();
    fonts
}

/// Human-readable description of a font file. Never fails.
pub fn font_details(path: &Path, runner: &dyn CommandRunner) -> String {
    let mut lines = vec![format!("file: {}", path.display())];
    match std::fs::metadata(path) {
        Ok(metadata) => lines.push(format!("size: {}", human_size(metadata.len()))),
        Err(err) => lines.push(format!("size: unknown ({err})")),
    }
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        lines.push(format!("format: {}", ext.to_ascii_uppercase()));
    }

    if runner.is_available("fc-scan") {
        let tool = ExternalTool::new("fc-scan")
            .args(["--format", "family: %{family}\\nstyle: %{style}\\n"])
            .arg(path.display().to_string());
        match runner.capture(&tool) {
            Ok(output) => lines.extend(non_empty_lines(&output).map(str::to_string)),
            Err(err) => debug!(error = %err, "fc-scan failed"),
        }
    }
    lines.join("\n")
}

fn browse_fonts(ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    let dirs = font_dirs(ctx.os);
    let fonts = installed_fonts(&dirs);
    if fonts.is_empty() {
        writeln!(ctx.out, "No fonts found.")?;
        return Ok(Outcome::Completed);
    }

    let labels = fonts
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    let request = PickRequest::new("fonts", labels).with_preview(PreviewKind::Font);
    let Some(font) = ctx.picker.pick(&request)?.selected else {
        return Ok(Outcome::Cancelled);
    };
    writeln!(ctx.out, "{}", font_details(Path::new(&font), ctx.runner))?;
    Ok(Outcome::Completed)
}

fn show_resolv_conf(ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    let contents = read_text(Path::new(RESOLV_CONF), 64 * 1024).map_err(|err| match err {
        UtilsError::Io(err) => CoreError::Io(err),
        other => CoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            other.to_string(),
        )),
    })?;
    writeln!(ctx.out, "{RESOLV_CONF}:")?;
    for line in non_empty_lines(&contents).filter(|line| !line.starts_with('#')) {
        writeln!(ctx.out, "  {line}")?;
    }
    Ok(Outcome::Completed)
}

fn dns_lookup(ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    let Some(host) = ctx.prompt.read_line("Host name to look up")? else {
        return Ok(Outcome::Cancelled);
    };
    let host = host.trim();
    if host.is_empty() || host.starts_with('-') || host.contains(char::is_whitespace) {
        writeln!(ctx.out, "Invalid host name: {host:?}")?;
        return Ok(Outcome::Completed);
    }
    let lookup = ToolHandler::new(ExternalTool::new("nslookup").arg(host));
    lookup.run(ctx)
}

fn install_programs(ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    let registry = ctx.registry;
    let names = registry
        .list_by_category(Category::Installable)
        .into_iter()
        .map(str::to_string)
        .collect();
    let request = PickRequest::new("install", names).with_preview(PreviewKind::Action);

    let Some(name) = ctx.picker.pick(&request)?.selected else {
        return Ok(Outcome::Cancelled);
    };
    Dispatcher::new(registry).execute(&name, ctx)
}

fn update_packages(ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    let manager = detect_manager(ctx.runner, ctx.os).ok_or_else(no_package_manager)?;
    let elevate = ctx.elevate && manager.needs_root();
    for tool in manager.upgrade() {
        let tool = tool.elevated(elevate);
        writeln!(ctx.out, "$ {}", tool.command_line())?;
        ctx.runner.run(&tool)?;
    }
    writeln!(ctx.out, "Packages updated with {}.", manager.name())?;
    Ok(Outcome::Completed)
}

fn starship_script(ctx: &mut HandlerContext<'_>) -> CoreResult<Outcome> {
    if !ctx.runner.is_available("curl") {
        return Err(ToolError::Missing {
            program: "curl".into(),
        }
        .into());
    }
    let script = ExternalTool::new("sh").args([
        "-c",
        "curl -sS https://starship.rs/install.sh | sh -s -- -y",
    ]);
    ctx.runner.run(&script)?;
    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::{install_action_name, Picker, PickerResult, Probe, Prompt};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeRunner {
        available: Vec<&'static str>,
        outputs: HashMap<String, String>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        fn new(available: &[&'static str]) -> Self {
            Self {
                available: available.to_vec(),
                ..Self::default()
            }
        }

        fn output(mut self, command: &str, output: &str) -> Self {
            self.outputs.insert(command.to_string(), output.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn is_available(&self, program: &str) -> bool {
            self.available.contains(&program)
        }

        fn capture(&self, tool: &ExternalTool) -> Result<String, ToolError> {
            let line = tool.command_line();
            self.calls.borrow_mut().push(line.clone());
            self.outputs.get(&line).cloned().ok_or(ToolError::Exit {
                program: tool.program().to_string(),
                code: Some(1),
            })
        }

        fn run(&self, tool: &ExternalTool) -> Result<(), ToolError> {
            self.calls.borrow_mut().push(tool.command_line());
            Ok(())
        }
    }

    struct Scripted {
        pick: Option<&'static str>,
        line: Option<&'static str>,
        requests: RefCell<Vec<PickRequest>>,
    }

    impl Scripted {
        fn picking(pick: Option<&'static str>) -> Self {
            Self {
                pick,
                line: None,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Picker for Scripted {
        fn pick(&self, request: &PickRequest) -> CoreResult<PickerResult> {
            self.requests.borrow_mut().push(request.clone());
            Ok(match self.pick {
                Some(label) => PickerResult::selected(label),
                None => PickerResult::cancelled(),
            })
        }
    }

    impl Prompt for Scripted {
        fn read_line(&self, _question: &str) -> CoreResult<Option<String>> {
            Ok(self.line.map(str::to_string))
        }
    }

    struct Installed(bool);

    impl Probe for Installed {
        fn is_installed(&self, _program: &str) -> bool {
            self.0
        }
    }

    fn run_action(
        name: &str,
        os: OsId,
        runner: &FakeRunner,
        ui: &Scripted,
        probe: &dyn Probe,
    ) -> (CoreResult<Outcome>, String) {
        let registry = default_registry().expect("registry");
        let mut out = Vec::new();
        let mut ctx = HandlerContext {
            os,
            runner,
            probe,
            picker: ui,
            prompt: ui,
            registry: &registry,
            elevate: false,
            out: &mut out,
        };
        let result = Dispatcher::new(&registry).execute(name, &mut ctx);
        (result, String::from_utf8_lossy(&out).into_owned())
    }

    #[test]
    fn default_registry_covers_both_platforms() {
        let registry = default_registry().expect("registry");
        for action in registry.iter() {
            assert!(action.supports(OsId::MacOs), "{} lacks macOS", action.name());
            assert!(action.supports(OsId::Linux), "{} lacks Linux", action.name());
        }
        for program in ["fzf", "sk", "bat"] {
            assert!(registry.lookup(&install_action_name(program)).is_ok());
        }
    }

    #[test]
    fn main_menu_listing() {
        let registry = default_registry().expect("registry");
        let menu = registry.list_by_category(Category::Menu).join("\n");
        insta::assert_snapshot!(menu, @r"
        Browse installed fonts
        Browse installed programs
        DNS configuration
        DNS lookup
        Install programs
        Network interfaces
        Open ports
        Refresh font cache
        Routing table
        Update packages
        ");
    }

    #[test]
    fn brew_listing_merges_formulae_and_casks() {
        let runner = FakeRunner::new(&["brew"])
            .output("brew list --formula -1", "jq\nbat\n")
            .output("brew list --cask -1", "visual-studio-code\njq\n");
        let packages = installed_packages(&runner, PackageManager::Brew).unwrap();
        assert_eq!(packages, vec!["bat", "jq", "visual-studio-code"]);
    }

    #[test]
    fn listing_fails_only_when_every_source_fails() {
        let runner = FakeRunner::new(&["brew"]).output("brew list --formula -1", "jq\n");
        assert_eq!(installed_packages(&runner, PackageManager::Brew).unwrap(), vec!["jq"]);

        let runner = FakeRunner::new(&["pacman"]);
        assert!(installed_packages(&runner, PackageManager::Pacman).is_err());
    }

    #[test]
    fn linux_manager_priority() {
        let runner = FakeRunner::new(&["yum", "pacman"]);
        assert_eq!(detect_manager(&runner, OsId::Linux), Some(PackageManager::Pacman));
        assert_eq!(detect_manager(&runner, OsId::MacOs), None);
        assert_eq!(detect_manager(&runner, OsId::Unsupported), None);
    }

    #[test]
    fn browse_programs_shows_selected_package() {
        let runner = FakeRunner::new(&["apt-get"])
            .output("dpkg-query -W -f=${binary:Package}\n", "htop\njq\n")
            .output("apt-cache show jq", "Package: jq\n");
        let ui = Scripted::picking(Some("jq"));

        let (result, out) = run_action(BROWSE_PROGRAMS, OsId::Linux, &runner, &ui, &Installed(true));
        assert_eq!(result.unwrap(), Outcome::Completed);
        assert_eq!(out, "Package: jq\n");

        let requests = ui.requests.borrow();
        assert_eq!(requests[0].items, vec!["htop", "jq"]);
        assert_eq!(requests[0].preview, Some(PreviewKind::Package));
    }

    #[test]
    fn browse_programs_reports_empty_listing() {
        let runner = FakeRunner::new(&["pacman"]).output("pacman -Qq", "\n");
        let ui = Scripted::picking(Some("git"));
        let (result, out) = run_action(BROWSE_PROGRAMS, OsId::Linux, &runner, &ui, &Installed(true));
        assert_eq!(result.unwrap(), Outcome::Completed);
        assert_eq!(out, "No installed packages found.\n");
        assert!(ui.requests.borrow().is_empty());
    }

    #[test]
    fn browse_programs_cancel_is_quiet() {
        let runner = FakeRunner::new(&["pacman"]).output("pacman -Qq", "git\n");
        let ui = Scripted::picking(None);
        let (result, out) = run_action(BROWSE_PROGRAMS, OsId::Linux, &runner, &ui, &Installed(true));
        assert_eq!(result.unwrap(), Outcome::Cancelled);
        assert!(out.is_empty());
    }

    #[test]
    fn install_menu_dispatches_choice() {
        let runner = FakeRunner::new(&["brew"]);
        let ui = Scripted::picking(Some("install_jq"));
        let (result, _) = run_action(INSTALL_PROGRAMS, OsId::MacOs, &runner, &ui, &Installed(true));
        assert_eq!(result.unwrap(), Outcome::AlreadyInstalled { program: "jq".into() });
        assert!(runner.calls().is_empty());
        assert!(ui.requests.borrow()[0].items.contains(&"install_fzf".to_string()));
    }

    #[test]
    fn install_menu_reports_missing_package_manager() {
        let runner = FakeRunner::new(&[]);
        let ui = Scripted::picking(Some("install_htop"));
        let (result, _) = run_action(INSTALL_PROGRAMS, OsId::Linux, &runner, &ui, &Installed(false));
        assert!(matches!(result, Err(CoreError::NoPackageManager { .. })));
    }

    #[test]
    fn update_packages_runs_apt_in_order() {
        let runner = FakeRunner::new(&["apt-get", "dnf"]);
        let ui = Scripted::picking(None);
        let (result, out) = run_action(UPDATE_PACKAGES, OsId::Linux, &runner, &ui, &Installed(true));
        assert!(result.is_ok());
        assert_eq!(runner.calls(), vec!["apt-get update", "apt-get upgrade -y"]);
        assert!(out.ends_with("Packages updated with apt.\n"));
    }

    #[test]
    fn dns_lookup_without_host_is_cancelled() {
        let runner = FakeRunner::new(&["nslookup"]);
        let ui = Scripted::picking(None);
        let (result, _) = run_action(DNS_LOOKUP, OsId::MacOs, &runner, &ui, &Installed(true));
        assert_eq!(result.unwrap(), Outcome::Cancelled);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn dns_lookup_runs_nslookup() {
        let runner = FakeRunner::new(&["nslookup"])
            .output("nslookup example.com", "Address: 93.184.215.14\n");
        let ui = Scripted {
            line: Some("example.com"),
            ..Scripted::picking(None)
        };
        let (result, out) = run_action(DNS_LOOKUP, OsId::Linux, &runner, &ui, &Installed(true));
        assert!(result.is_ok());
        assert_eq!(out, "Address: 93.184.215.14\n");
    }

    #[test]
    fn open_ports_falls_back_to_lsof() {
        let runner = FakeRunner::new(&["lsof"]).output(
            "lsof -i -P -n",
            "COMMAND PID USER\nsshd 1 root TCP *:22 (LISTEN)\nchrome 2 me TCP 1.2.3.4:5->6.7.8.9:443 (ESTABLISHED)\n",
        );
        let ui = Scripted::picking(None);
        let (result, out) = run_action(OPEN_PORTS, OsId::Linux, &runner, &ui, &Installed(true));
        assert!(result.is_ok());
        assert_eq!(out, "COMMAND PID USER\nsshd 1 root TCP *:22 (LISTEN)\n");
    }

    #[test]
    fn fonts_are_found_recursively() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let nested = temp.path().join("truetype/dejavu");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("DejaVuSans.ttf"), b"font").unwrap();
        std::fs::write(temp.path().join("Inter.OTF"), b"font").unwrap();
        std::fs::write(temp.path().join("README"), b"text").unwrap();

        let fonts = installed_fonts(&[temp.path().to_path_buf(), temp.path().join("missing")]);
        assert_eq!(fonts.len(), 2);
        assert!(fonts.iter().all(|font| is_font_file(font)));
    }

    #[test]
    fn font_details_degrade_without_fc_scan() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let font = temp.path().join("Inter.ttf");
        std::fs::write(&font, vec![0_u8; 2048]).unwrap();

        let details = font_details(&font, &FakeRunner::new(&[]));
        assert!(details.contains("size: 2.0 KiB"));
        assert!(details.ends_with("format: TTF"));

        let details = font_details(&temp.path().join("gone.otf"), &FakeRunner::new(&[]));
        assert!(details.contains("size: unknown"));
    }
}
