//! Dispatcher state machine tests against recording fakes of the session,
//! device and prompt collaborators.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use smartbuild::dispatcher::Dispatcher;
use smartbuild::ui::Prompt;
use smartbuild_core::command::SdkCommand;
use smartbuild_core::devices::{DeviceEnumerator, SerialDevice};
use smartbuild_core::settings::{Settings, WORKSPACE_FILE};
use smartbuild_shell::{CommandSink, SessionError, SessionProvider};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Emitted {
    Line(String),
    Bytes(Vec<u8>),
}

fn line(text: impl Into<String>) -> Emitted {
    Emitted::Line(text.into())
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<Emitted>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<Emitted> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[async_trait]
impl CommandSink for RecordingSink {
    async fn send_line(&self, line: &str) -> Result<(), SessionError> {
        self.events
            .lock()
            .unwrap()
            .push(Emitted::Line(line.to_string()));
        Ok(())
    }

    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), SessionError> {
        self.events
            .lock()
            .unwrap()
            .push(Emitted::Bytes(bytes.to_vec()));
        Ok(())
    }
}

struct FakeSessions {
    sink: Arc<RecordingSink>,
    fresh_next: AtomicBool,
}

impl FakeSessions {
    fn new(sink: Arc<RecordingSink>) -> Self {
        Self {
            sink,
            fresh_next: AtomicBool::new(true),
        }
    }

    /// Simulate the shell process going away: the next acquire is fresh.
    fn kill(&self) {
        self.fresh_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionProvider for FakeSessions {
    async fn acquire(&self) -> Result<(Arc<dyn CommandSink>, bool), SessionError> {
        let fresh = self.fresh_next.swap(false, Ordering::SeqCst);
        Ok((self.sink.clone(), fresh))
    }
}

struct FakeDevices {
    devices: Vec<SerialDevice>,
    queries: AtomicUsize,
}

impl FakeDevices {
    fn new(paths: &[&str]) -> Self {
        Self {
            devices: paths
                .iter()
                .map(|p| SerialDevice {
                    path: PathBuf::from(p),
                    label: None,
                })
                .collect(),
            queries: AtomicUsize::new(0),
        }
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceEnumerator for FakeDevices {
    async fn list(&self) -> Vec<SerialDevice> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.devices.clone()
    }
}

#[derive(Default)]
struct FakePrompt {
    selections: Mutex<VecDeque<Option<usize>>>,
    inputs: Mutex<VecDeque<Option<String>>>,
}

impl FakePrompt {
    fn push_selection(&self, selection: Option<usize>) {
        self.selections.lock().unwrap().push_back(selection);
    }

    fn push_input(&self, input: Option<&str>) {
        self.inputs
            .lock()
            .unwrap()
            .push_back(input.map(str::to_string));
    }
}

#[async_trait]
impl Prompt for FakePrompt {
    async fn select(&self, _prompt: &str, _items: &[String]) -> Option<usize> {
        self.selections
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(None)
    }

    async fn input(&self, _prompt: &str) -> Option<String> {
        self.inputs.lock().unwrap().pop_front().unwrap_or(None)
    }
}

struct Harness {
    workspace: tempfile::TempDir,
    sdk: tempfile::TempDir,
    sink: Arc<RecordingSink>,
    sessions: Arc<FakeSessions>,
    devices: Arc<FakeDevices>,
    prompt: Arc<FakePrompt>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new(device_paths: &[&str], cached_port: Option<&str>, sdk_cached: bool) -> Self {
        let workspace = tempfile::tempdir().unwrap();
        let sdk = tempfile::tempdir().unwrap();

        let mut settings = Settings::from_paths(
            workspace.path().join(WORKSPACE_FILE),
            workspace.path().join("global.yaml"),
        )
        .unwrap();
        if sdk_cached {
            settings.workspace.sdk_root = Some(sdk.path().to_path_buf());
        }
        settings.workspace.serial_port = cached_port.map(str::to_string);

        let sink = Arc::new(RecordingSink::default());
        let sessions = Arc::new(FakeSessions::new(sink.clone()));
        let devices = Arc::new(FakeDevices::new(device_paths));
        let prompt = Arc::new(FakePrompt::default());
        let dispatcher = Dispatcher::new(
            workspace.path().to_path_buf(),
            settings,
            sessions.clone(),
            devices.clone(),
            prompt.clone(),
        );

        Self {
            workspace,
            sdk,
            sink,
            sessions,
            devices,
            prompt,
            dispatcher,
        }
    }

    fn cd_sdk(&self) -> Emitted {
        line(format!("cd {}", self.sdk.path().display()))
    }

    fn cd_workspace(&self) -> Emitted {
        line(format!("cd {}", self.workspace.path().display()))
    }

    /// Run the activation command and a clean so the session sits activated
    /// with the workspace as its committed directory.
    async fn settle(&mut self) {
        self.dispatcher.dispatch(SdkCommand::Env).await.unwrap();
        self.dispatcher.dispatch(SdkCommand::Clean).await.unwrap();
        self.sink.take();
    }

    fn populate_boards(&self) {
        for (board, content) in [("t2", "CONFIG_T2=y\n"), ("t5", "CONFIG_T5=y\n")] {
            let dir = self.sdk.path().join("boards").join(board).join("config");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(format!("{board}.config")), content).unwrap();
        }
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_session_build_activates_once() {
    let mut h = Harness::new(&[], None, true);

    h.dispatcher.dispatch(SdkCommand::Build).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![h.cd_sdk(), line(". ./export.sh"), line("tos.py build")]
    );
    // The include-path descriptor side effect fired once.
    assert!(
        h.workspace
            .path()
            .join(".vscode/c_cpp_properties.json")
            .exists()
    );

    // Steady state: no setup step, only a directory change and the command.
    h.dispatcher.dispatch(SdkCommand::Clean).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![h.cd_workspace(), line("tos.py clean")]
    );
}

#[tokio::test(start_paused = true)]
async fn session_teardown_resets_activation_and_directory() {
    let mut h = Harness::new(&[], None, true);
    h.settle().await;

    h.sessions.kill();
    h.dispatcher.dispatch(SdkCommand::Build).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![h.cd_sdk(), line(". ./export.sh"), line("tos.py build")]
    );
}

#[tokio::test(start_paused = true)]
async fn unchanged_directory_is_not_re_emitted() {
    let mut h = Harness::new(&[], None, true);
    h.settle().await;

    h.dispatcher.dispatch(SdkCommand::Build).await.unwrap();
    assert_eq!(h.sink.take(), vec![line("tos.py build")]);

    h.dispatcher.dispatch(SdkCommand::Clean).await.unwrap();
    assert_eq!(h.sink.take(), vec![line("tos.py clean")]);
}

#[tokio::test(start_paused = true)]
async fn steady_flash_with_cached_port_sends_one_line() {
    let mut h = Harness::new(&["/dev/ttyACM0"], Some("/dev/ttyUSB7"), true);
    h.settle().await;

    h.dispatcher.dispatch(SdkCommand::Flash).await.unwrap();
    assert_eq!(h.sink.take(), vec![line("tos.py flash --port /dev/ttyUSB7")]);
    // Cached resolution performs no device query.
    assert_eq!(h.devices.queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn running_monitor_is_interrupted_before_the_next_command() {
    let mut h = Harness::new(&[], Some("/dev/ttyUSB7"), true);
    h.settle().await;

    h.dispatcher.dispatch(SdkCommand::Monitor).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![line("tos.py monitor --port /dev/ttyUSB7")]
    );

    h.dispatcher.dispatch(SdkCommand::Clean).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![
            Emitted::Bytes(vec![0x03]),
            Emitted::Bytes(b"\r".to_vec()),
            line("tos.py clean"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn monitor_is_stopped_even_for_another_monitor() {
    let mut h = Harness::new(&[], Some("/dev/ttyUSB7"), true);
    h.settle().await;

    h.dispatcher.dispatch(SdkCommand::Monitor).await.unwrap();
    h.sink.take();

    h.dispatcher.dispatch(SdkCommand::Monitor).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![
            Emitted::Bytes(vec![0x03]),
            Emitted::Bytes(b"\r".to_vec()),
            line("tos.py monitor --port /dev/ttyUSB7"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn first_monitor_of_a_fresh_session_is_tracked() {
    let mut h = Harness::new(&[], Some("/dev/ttyUSB7"), true);

    // Activation path runs the monitor without the port option.
    h.dispatcher.dispatch(SdkCommand::Monitor).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![h.cd_sdk(), line(". ./export.sh"), line("tos.py monitor")]
    );

    h.dispatcher.dispatch(SdkCommand::Clean).await.unwrap();
    assert_eq!(
        h.sink.take(),
        vec![
            h.cd_workspace(),
            Emitted::Bytes(vec![0x03]),
            Emitted::Bytes(b"\r".to_vec()),
            line("tos.py clean"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn forced_port_selection_requeries_and_overwrites_the_cache() {
    let mut h = Harness::new(&["/dev/ttyACM0", "/dev/ttyUSB0"], Some("/dev/ttyUSB7"), true);

    h.prompt.push_selection(Some(1));
    h.dispatcher.dispatch(SdkCommand::SelectPort).await.unwrap();

    assert_eq!(h.devices.queries(), 1);
    assert_eq!(
        h.dispatcher.settings().workspace.serial_port.as_deref(),
        Some("/dev/ttyUSB0")
    );
    // Port selection never touches the session.
    assert_eq!(h.sink.take(), vec![]);

    // The confirmed choice was persisted for the next process.
    let yaml =
        std::fs::read_to_string(h.workspace.path().join(WORKSPACE_FILE)).unwrap();
    assert!(yaml.contains("/dev/ttyUSB0"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_port_selection_leaves_the_cache_alone() {
    let mut h = Harness::new(&["/dev/ttyACM0"], Some("/dev/ttyUSB7"), true);

    h.prompt.push_selection(None);
    h.dispatcher.dispatch(SdkCommand::SelectPort).await.unwrap();

    assert_eq!(
        h.dispatcher.settings().workspace.serial_port.as_deref(),
        Some("/dev/ttyUSB7")
    );
}

#[tokio::test(start_paused = true)]
async fn flash_without_devices_sends_nothing() {
    let mut h = Harness::new(&[], None, true);
    h.settle().await;

    h.dispatcher.dispatch(SdkCommand::Flash).await.unwrap();
    assert_eq!(h.sink.take(), vec![]);
}

#[tokio::test(start_paused = true)]
async fn flash_with_dismissed_port_pick_sends_nothing() {
    let mut h = Harness::new(&["/dev/ttyACM0"], None, true);
    h.settle().await;

    h.prompt.push_selection(None);
    h.dispatcher.dispatch(SdkCommand::Flash).await.unwrap();
    assert_eq!(h.sink.take(), vec![]);
}

#[tokio::test(start_paused = true)]
async fn board_select_on_a_fresh_session_runs_the_sdk_chooser() {
    let mut h = Harness::new(&[], None, true);
    h.populate_boards();

    h.dispatcher
        .dispatch(SdkCommand::ConfigChoice)
        .await
        .unwrap();
    assert_eq!(
        h.sink.take(),
        vec![
            h.cd_sdk(),
            line(". ./export.sh"),
            line("tos.py config choice"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn identical_board_config_changes_nothing() {
    let mut h = Harness::new(&[], None, true);
    h.populate_boards();
    std::fs::write(h.workspace.path().join("app_default.config"), "CONFIG_T2=y\n").unwrap();
    std::fs::create_dir_all(h.workspace.path().join(".build")).unwrap();
    h.settle().await;

    h.prompt.push_selection(Some(0));
    h.dispatcher
        .dispatch(SdkCommand::ConfigChoice)
        .await
        .unwrap();

    assert_eq!(h.sink.take(), vec![]);
    assert!(h.workspace.path().join(".build").exists());
    assert_eq!(h.dispatcher.settings().workspace.board, None);
}

#[tokio::test(start_paused = true)]
async fn changed_board_config_applies_and_cleans_once() {
    let mut h = Harness::new(&[], None, true);
    h.populate_boards();
    std::fs::write(h.workspace.path().join("app_default.config"), "CONFIG_OLD=y\n").unwrap();
    std::fs::create_dir_all(h.workspace.path().join(".build/objs")).unwrap();
    h.settle().await;

    h.prompt.push_selection(Some(1));
    h.dispatcher
        .dispatch(SdkCommand::ConfigChoice)
        .await
        .unwrap();

    // Exactly one automatic clean, already in the right directory.
    assert_eq!(h.sink.take(), vec![line("tos.py clean")]);
    assert_eq!(
        std::fs::read_to_string(h.workspace.path().join("app_default.config")).unwrap(),
        "CONFIG_T5=y\n"
    );
    assert!(!h.workspace.path().join(".build").exists());
    assert_eq!(
        h.dispatcher.settings().workspace.board.as_deref(),
        Some("t5")
    );
}

#[tokio::test(start_paused = true)]
async fn dismissed_board_pick_changes_nothing() {
    let mut h = Harness::new(&[], None, true);
    h.populate_boards();
    std::fs::write(h.workspace.path().join("app_default.config"), "CONFIG_OLD=y\n").unwrap();
    h.settle().await;

    h.prompt.push_selection(None);
    h.dispatcher
        .dispatch(SdkCommand::ConfigChoice)
        .await
        .unwrap();

    assert_eq!(h.sink.take(), vec![]);
    assert_eq!(
        std::fs::read_to_string(h.workspace.path().join("app_default.config")).unwrap(),
        "CONFIG_OLD=y\n"
    );
}

#[tokio::test(start_paused = true)]
async fn missing_sdk_path_prompts_and_saves_on_success() {
    let mut h = Harness::new(&[], None, false);
    let sdk_path = h.sdk.path().to_path_buf();

    h.prompt.push_input(Some(&sdk_path.display().to_string()));
    h.dispatcher.dispatch(SdkCommand::Build).await.unwrap();

    assert_eq!(
        h.sink.take(),
        vec![h.cd_sdk(), line(". ./export.sh"), line("tos.py build")]
    );
    assert_eq!(
        h.dispatcher.settings().workspace.sdk_root.as_deref(),
        Some(sdk_path.as_path())
    );
}

#[tokio::test(start_paused = true)]
async fn dismissed_sdk_prompt_aborts_without_side_effects() {
    let mut h = Harness::new(&[], None, false);

    h.prompt.push_input(None);
    h.dispatcher.dispatch(SdkCommand::Build).await.unwrap();

    assert_eq!(h.sink.take(), vec![]);
    assert_eq!(h.dispatcher.settings().workspace.sdk_root, None);
    assert!(!h.workspace.path().join(WORKSPACE_FILE).exists());
}

#[tokio::test(start_paused = true)]
async fn nonexistent_sdk_path_aborts_without_saving() {
    let mut h = Harness::new(&[], None, false);

    h.prompt.push_input(Some("/definitely/not/here"));
    h.dispatcher.dispatch(SdkCommand::Build).await.unwrap();

    assert_eq!(h.sink.take(), vec![]);
    assert_eq!(h.dispatcher.settings().workspace.sdk_root, None);
}
