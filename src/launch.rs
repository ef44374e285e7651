use crate::config::{IconEntry, LaunchOption};
use crate::system;
use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How long a freshly spawned program is watched for an immediate
/// "no handler" failure before it is assumed to be running.
pub const LAUNCH_GRACE_PERIOD: Duration = Duration::from_millis(1500);

/// Lower-cased stderr fragments meaning the OS found nothing to open the target with.
const MISSING_HANDLER_MARKERS: [&str; 6] = [
    "no application is associated",
    "no default application",
    "no application knows how to open",
    "no method available for opening",
    "there is no application installed",
    "couldn't find a suitable application",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchChoice {
    Executable,
    Website,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched(LaunchChoice),
    /// The entry asks every time; the caller shows the choice and calls
    /// [`launch_choice`].
    NeedsChoice,
    Failed,
}

/// Side-effecting half of a launch. Each method reports whether the target
/// was started.
pub trait LaunchBackend {
    fn run_executable(&mut self, entry: &IconEntry) -> bool;
    fn open_website(&mut self, url: &str) -> bool;
}

fn try_executable(entry: &IconEntry, backend: &mut dyn LaunchBackend) -> bool {
    if entry.executable_path.trim().is_empty() {
        return false;
    }
    backend.run_executable(entry)
}

fn try_website(entry: &IconEntry, backend: &mut dyn LaunchBackend) -> bool {
    match normalize_url(&entry.website_link) {
        Some(url) => backend.open_website(&url),
        None => false,
    }
}

fn attempt(entry: &IconEntry, choice: LaunchChoice, backend: &mut dyn LaunchBackend) -> bool {
    match choice {
        LaunchChoice::Executable => try_executable(entry, backend),
        LaunchChoice::Website => try_website(entry, backend),
    }
}

fn first_of(
    entry: &IconEntry,
    order: &[LaunchChoice],
    backend: &mut dyn LaunchBackend,
) -> LaunchOutcome {
    for choice in order {
        if attempt(entry, *choice, backend) {
            return LaunchOutcome::Launched(*choice);
        }
    }
    LaunchOutcome::Failed
}

pub fn launch(entry: &IconEntry, backend: &mut dyn LaunchBackend) -> LaunchOutcome {
    use LaunchChoice::{Executable, Website};

    let outcome = match entry.launch_option {
        LaunchOption::FirstFound => first_of(entry, &[Executable, Website], backend),
        LaunchOption::WebsiteFirst => first_of(entry, &[Website, Executable], backend),
        LaunchOption::AskEachTime => return LaunchOutcome::NeedsChoice,
        LaunchOption::ExecutableOnly => first_of(entry, &[Executable], backend),
        LaunchOption::WebsiteOnly => first_of(entry, &[Website], backend),
    };
    log_outcome(entry, outcome);
    outcome
}

/// Runs exactly the action picked from the ask-each-time prompt.
pub fn launch_choice(
    entry: &IconEntry,
    choice: LaunchChoice,
    backend: &mut dyn LaunchBackend,
) -> LaunchOutcome {
    let outcome = first_of(entry, &[choice], backend);
    log_outcome(entry, outcome);
    outcome
}

fn log_outcome(entry: &IconEntry, outcome: LaunchOutcome) {
    match outcome {
        LaunchOutcome::Launched(choice) => info!("launched {:?} via {choice:?}", entry.name),
        LaunchOutcome::Failed => warn!("no successful launch for {:?}", entry.name),
        LaunchOutcome::NeedsChoice => {}
    }
}

/// Trims `raw` and prefixes `https://` when it carries no scheme.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") || trimmed.starts_with("mailto:") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{trimmed}"))
    }
}

/// Splits a command line on whitespace, keeping double-quoted runs together.
pub fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The process ended inside the grace window.
    Exited,
    /// Still running when the window closed; left to run on its own.
    Detached,
    /// stderr reported that no default application exists for the target.
    MissingHandler(String),
    SpawnFailed,
}

impl ProbeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Exited | ProbeResult::Detached)
    }
}

fn is_missing_handler(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    MISSING_HANDLER_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Spawns `command` and watches its stderr for up to `grace`.
pub fn probe_process(mut command: Command, grace: Duration) -> ProbeResult {
    command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!("failed to spawn {:?}: {err}", command.get_program());
            return ProbeResult::SpawnFailed;
        }
    };

    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    if let Some(stderr) = child.stderr.take() {
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });
    }

    let deadline = Instant::now() + grace;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match line_rx.recv_timeout(remaining) {
            Ok(line) => {
                debug!("launch stderr: {line}");
                if is_missing_handler(&line) {
                    return ProbeResult::MissingHandler(line);
                }
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                // stderr closed; give the exit status the rest of the window
                while Instant::now() < deadline {
                    if let Ok(Some(_)) = child.try_wait() {
                        return ProbeResult::Exited;
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                break;
            }
        }
    }

    match child.try_wait() {
        Ok(Some(_)) => ProbeResult::Exited,
        _ => ProbeResult::Detached,
    }
}

/// Launches through the operating system.
pub struct SystemLauncher {
    pub grace: Duration,
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self {
            grace: LAUNCH_GRACE_PERIOD,
        }
    }
}

impl LaunchBackend for SystemLauncher {
    fn run_executable(&mut self, entry: &IconEntry) -> bool {
        let path = Path::new(entry.executable_path.trim());
        let args = entry.command_args.trim();
        let args = (!args.is_empty()).then_some(args);

        if system::is_shortcut(path) {
            if !system::shell_open_with(path, args, None) {
                debug!("shell reported failure for shortcut {}", path.display());
            }
            return true;
        }
        if !path.exists() {
            warn!("executable not found: {}", path.display());
            return false;
        }
        if !system::is_directly_executable(path) {
            return system::shell_open_with(path, args, None);
        }

        let mut command = Command::new(path);
        if let Some(args) = args {
            command.args(split_args(args));
        }
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        match probe_process(command, self.grace) {
            ProbeResult::MissingHandler(line) => {
                warn!("{} has no handler: {line}", path.display());
                false
            }
            result => result.is_success(),
        }
    }

    fn open_website(&mut self, url: &str) -> bool {
        system::open_url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellCoord;
    use LaunchChoice::{Executable as Exe, Website as Site};

    struct FakeBackend {
        exe_ok: bool,
        site_ok: bool,
        calls: Vec<LaunchChoice>,
        urls: Vec<String>,
    }

    impl FakeBackend {
        fn new(exe_ok: bool, site_ok: bool) -> Self {
            Self {
                exe_ok,
                site_ok,
                calls: Vec::new(),
                urls: Vec::new(),
            }
        }
    }

    impl LaunchBackend for FakeBackend {
        fn run_executable(&mut self, _entry: &IconEntry) -> bool {
            self.calls.push(Exe);
            self.exe_ok
        }

        fn open_website(&mut self, url: &str) -> bool {
            self.calls.push(Site);
            self.urls.push(url.to_string());
            self.site_ok
        }
    }

    fn entry(option: LaunchOption) -> IconEntry {
        let mut entry = IconEntry::new(CellCoord::new(0, 0));
        entry.name = "Both".into();
        entry.executable_path = "/opt/tool/tool".into();
        entry.website_link = "example.com".into();
        entry.launch_option = option;
        entry
    }

    #[test]
    fn policy_table() {
        use LaunchOption::*;
        use LaunchOutcome::{Failed, Launched, NeedsChoice};

        let table: [(LaunchOption, bool, bool, LaunchOutcome, &[LaunchChoice]); 20] = [
            (FirstFound, true, true, Launched(Exe), &[Exe]),
            (FirstFound, true, false, Launched(Exe), &[Exe]),
            (FirstFound, false, true, Launched(Site), &[Exe, Site]),
            (FirstFound, false, false, Failed, &[Exe, Site]),
            (WebsiteFirst, true, true, Launched(Site), &[Site]),
            (WebsiteFirst, true, false, Launched(Exe), &[Site, Exe]),
            (WebsiteFirst, false, true, Launched(Site), &[Site]),
            (WebsiteFirst, false, false, Failed, &[Site, Exe]),
            (AskEachTime, true, true, NeedsChoice, &[]),
            (AskEachTime, true, false, NeedsChoice, &[]),
            (AskEachTime, false, true, NeedsChoice, &[]),
            (AskEachTime, false, false, NeedsChoice, &[]),
            (ExecutableOnly, true, true, Launched(Exe), &[Exe]),
            (ExecutableOnly, true, false, Launched(Exe), &[Exe]),
            (ExecutableOnly, false, true, Failed, &[Exe]),
            (ExecutableOnly, false, false, Failed, &[Exe]),
            (WebsiteOnly, true, true, Launched(Site), &[Site]),
            (WebsiteOnly, true, false, Failed, &[Site]),
            (WebsiteOnly, false, true, Launched(Site), &[Site]),
            (WebsiteOnly, false, false, Failed, &[Site]),
        ];

        for (option, exe_ok, site_ok, expected, calls) in table {
            let mut backend = FakeBackend::new(exe_ok, site_ok);
            let outcome = launch(&entry(option), &mut backend);
            assert_eq!(outcome, expected, "{option:?} exe={exe_ok} site={site_ok}");
            assert_eq!(backend.calls, calls, "{option:?} exe={exe_ok} site={site_ok}");
        }
    }

    #[test]
    fn ask_each_time_runs_only_the_choice() {
        let entry = entry(LaunchOption::AskEachTime);
        let mut backend = FakeBackend::new(false, true);
        assert_eq!(launch_choice(&entry, Exe, &mut backend), LaunchOutcome::Failed);
        assert_eq!(backend.calls, vec![Exe]);

        let mut backend = FakeBackend::new(false, true);
        assert_eq!(
            launch_choice(&entry, Site, &mut backend),
            LaunchOutcome::Launched(Site)
        );
        assert_eq!(backend.urls, vec!["https://example.com".to_string()]);
    }

    #[test]
    fn empty_targets_never_reach_the_backend() {
        let mut blank = entry(LaunchOption::FirstFound);
        blank.executable_path = "  ".into();
        blank.website_link = String::new();
        let mut backend = FakeBackend::new(true, true);
        assert_eq!(launch(&blank, &mut backend), LaunchOutcome::Failed);
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn urls_gain_a_scheme() {
        assert_eq!(normalize_url("  "), None);
        assert_eq!(normalize_url("example.com/a").as_deref(), Some("https://example.com/a"));
        assert_eq!(normalize_url(" http://x.org ").as_deref(), Some("http://x.org"));
        assert_eq!(normalize_url("mailto:me@x.org").as_deref(), Some("mailto:me@x.org"));
    }

    #[test]
    fn args_respect_quotes() {
        assert_eq!(split_args(""), Vec::<String>::new());
        assert_eq!(split_args("  -a   -b "), vec!["-a", "-b"]);
        assert_eq!(
            split_args(r#"--path "C:\Program Files\x" -v"#),
            vec!["--path", r"C:\Program Files\x", "-v"]
        );
        assert_eq!(split_args(r#"--name """#), vec!["--name", ""]);
    }

    #[test]
    fn missing_handler_markers_are_case_insensitive() {
        assert!(is_missing_handler(
            "ERROR: No application is associated with the specified file"
        ));
        assert!(is_missing_handler("xdg-open: no method available for opening 'x.foo'"));
        assert!(!is_missing_handler("warning: deprecated flag"));
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[cfg(unix)]
    #[test]
    fn probe_reports_missing_handler() {
        let result = probe_process(
            sh("echo 'no application knows how to open this file' >&2; sleep 5"),
            Duration::from_secs(3),
        );
        assert!(matches!(result, ProbeResult::MissingHandler(_)));
    }

    #[cfg(unix)]
    #[test]
    fn probe_quiet_process_is_detached_after_grace() {
        let started = Instant::now();
        let result = probe_process(sh("sleep 5"), Duration::from_millis(200));
        assert_eq!(result, ProbeResult::Detached);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn probe_fast_exit_is_success() {
        let result = probe_process(sh("echo harmless >&2; exit 0"), Duration::from_secs(2));
        assert_eq!(result, ProbeResult::Exited);
        assert!(result.is_success());
    }

    #[test]
    fn probe_spawn_failure() {
        let result = probe_process(
            Command::new("/definitely/not/a/real/program"),
            Duration::from_millis(100),
        );
        assert_eq!(result, ProbeResult::SpawnFailed);
    }
}
