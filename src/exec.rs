//! Execution channel driver: runs one command or script on remote clients.
//!
//! A run is strictly linear: validate the parameters, open a channel, submit
//! one JSON frame, then read frames until the first terminal [`Job`] arrives.
//! The channel is closed on every exit path once it has been opened.
//!
//! Deadline: `--timeout` when the operator gave one, otherwise the job's own
//! `timeout_sec` plus [`DEADLINE_GRACE`]. It covers name lookup, opening the
//! channel and the exchange; closing happens after it.

use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ParameterBag;
use crate::error::{Error, Result};
use crate::models::{Job, WsScriptCommand};
use crate::output::Renderer;
use crate::search::{Search, CLIENT_NAME};

pub const COMMAND: &str = "command";
pub const SCRIPT: &str = "script";
pub const CLIENT_IDS: &str = "cids";
pub const GROUP_IDS: &str = "gids";
pub const INTERPRETER: &str = "interpreter";
pub const CWD: &str = "cwd";
pub const IS_SUDO: &str = "is_sudo";
pub const EXECUTE_CONCURRENTLY: &str = "execute_concurrently";
pub const ABORT_ON_ERROR: &str = "abort_on_error";
pub const TIMEOUT_SEC: &str = "timeout_sec";

pub const DEFAULT_TIMEOUT_SEC: u64 = 30;
pub const DEADLINE_GRACE: Duration = Duration::from_secs(10);

/// A duplex, frame-oriented connection to the server.
#[async_trait]
pub trait Channel: Send {
    async fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Next frame, or `None` once the peer has closed the connection.
    async fn read(&mut self) -> Result<Option<Vec<u8>>>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait ChannelOpener: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Channel>>;
}

/// Interpreter implied by a script's file extension.
pub fn interpreter_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("ps1") => "powershell",
        Some("bat" | "cmd") => "cmd",
        _ => "",
    }
}

enum Frame {
    Job(Box<Job>),
    /// Server-side rejection, e.g. `{"error": "invalid client id"}`.
    Rejected(String),
    Other,
}

fn parse_frame(raw: &[u8]) -> Frame {
    let Ok(value) = serde_json::from_slice::<Value>(raw) else {
        return Frame::Other;
    };
    // Finished jobs carry an `error` field too; only id-less frames are rejections
    if value.get("jid").is_none() {
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            if !message.is_empty() {
                return Frame::Rejected(message.to_string());
            }
        }
    }
    match serde_json::from_value::<Job>(value) {
        Ok(job) if !job.jid.is_empty() || !job.status.is_empty() => Frame::Job(Box::new(job)),
        _ => Frame::Other,
    }
}

/// Submit `request` on a channel from `opener` and wait for its terminal job.
pub async fn run_job(
    opener: &dyn ChannelOpener,
    request: &WsScriptCommand,
    deadline: Duration,
) -> Result<Job> {
    let payload = serde_json::to_vec(request)?;
    let mut slot = None;
    let outcome = bounded(deadline, open_and_exchange(opener, &payload, &mut slot)).await;
    close_opened(slot).await;
    outcome
}

async fn bounded<T>(deadline: Duration, work: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(deadline, work)
        .await
        .unwrap_or_else(|_| Err(Error::Timeout(deadline)))
}

/// Leaves the opened channel in `slot` so it can be closed after a timeout.
async fn open_and_exchange(
    opener: &dyn ChannelOpener,
    payload: &[u8],
    slot: &mut Option<Box<dyn Channel>>,
) -> Result<Job> {
    let opened = opener.open().await?;
    let channel = slot.insert(opened);
    exchange(channel.as_mut(), payload).await
}

async fn close_opened(slot: Option<Box<dyn Channel>>) {
    if let Some(mut channel) = slot {
        if let Err(e) = channel.close().await {
            debug!("ignoring close failure: {e}");
        }
    }
}

async fn exchange(channel: &mut dyn Channel, payload: &[u8]) -> Result<Job> {
    channel.write(payload).await?;
    debug!("sent {}", String::from_utf8_lossy(payload));

    loop {
        let Some(raw) = channel.read().await? else {
            return Err(Error::IncompleteExecution);
        };
        match parse_frame(&raw) {
            Frame::Job(job) if job.is_terminal() => return Ok(*job),
            Frame::Job(job) => debug!("job {} is {}", job.jid, job.status),
            Frame::Rejected(message) => return Err(Error::Remote(message)),
            Frame::Other => debug!("discarding frame {}", String::from_utf8_lossy(&raw)),
        }
    }
}

/// Runs `command` and `script` invocations and renders the resulting job.
pub struct ExecController<W> {
    search: Search,
    commands: Arc<dyn ChannelOpener>,
    scripts: Arc<dyn ChannelOpener>,
    renderer: Renderer,
    out: W,
    deadline: Option<Duration>,
}

impl<W: Write> ExecController<W> {
    pub fn new(
        search: Search,
        commands: Arc<dyn ChannelOpener>,
        scripts: Arc<dyn ChannelOpener>,
        renderer: Renderer,
        out: W,
    ) -> Self {
        Self {
            search,
            commands,
            scripts,
            renderer,
            out,
            deadline: None,
        }
    }

    /// Client-side deadline overriding `timeout_sec + grace`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub async fn run_command(&mut self, params: &ParameterBag) -> Result<Job> {
        if !params.read_string(SCRIPT, "").is_empty() {
            return Err(Error::InvalidInput(
                "either a command or a script can be executed, not both".to_string(),
            ));
        }
        let command = params.read_string(COMMAND, "");
        if command.is_empty() {
            return Err(Error::InvalidInput("required option command is empty".into()));
        }

        let (mut request, name) = base_request(params)?;
        request.command = command;
        request.interpreter = params.read_string(INTERPRETER, "");

        let opener = Arc::clone(&self.commands);
        self.execute(opener.as_ref(), request, &name).await
    }

    pub async fn run_script(&mut self, params: &ParameterBag) -> Result<Job> {
        if !params.read_string(COMMAND, "").is_empty() {
            return Err(Error::InvalidInput(
                "either a command or a script can be executed, not both".to_string(),
            ));
        }
        let path = params.read_string(SCRIPT, "");
        if path.is_empty() {
            return Err(Error::InvalidInput("required option script is empty".into()));
        }
        if !Path::new(&path).exists() {
            return Err(Error::InvalidInput(format!(
                "script file doesn't exist: {path}"
            )));
        }
        let content = tokio::fs::read(&path).await?;

        let (mut request, name) = base_request(params)?;
        request.script = STANDARD.encode(content);
        request.interpreter = params.read_string(INTERPRETER, interpreter_for(&path));

        let opener = Arc::clone(&self.scripts);
        self.execute(opener.as_ref(), request, &name).await
    }

    /// Resolves `name` into the target list when no ids were given, then
    /// runs the job. Lookup, open and exchange share one deadline.
    async fn execute(
        &mut self,
        opener: &dyn ChannelOpener,
        mut request: WsScriptCommand,
        name: &str,
    ) -> Result<Job> {
        let deadline = self.deadline.unwrap_or_else(|| {
            Duration::from_secs(request.timeout_sec).saturating_add(DEADLINE_GRACE)
        });
        let search = &self.search;
        let mut slot = None;
        let outcome = bounded(deadline, async {
            if !name.is_empty() {
                request.client_ids.push(search.find_one(name).await?.id);
            }
            let payload = serde_json::to_vec(&request)?;
            open_and_exchange(opener, &payload, &mut slot).await
        })
        .await;
        close_opened(slot).await;

        let job = outcome?;
        info!("job {} finished with status {}", job.jid, job.status);
        self.renderer.render(&mut self.out, &job)?;
        Ok(job)
    }
}

/// Targets and execution flags shared by commands and scripts. Returns the
/// client name still to be resolved when neither ids nor groups were given.
fn base_request(params: &ParameterBag) -> Result<(WsScriptCommand, String)> {
    let timeout_sec = params.read_u64(TIMEOUT_SEC, DEFAULT_TIMEOUT_SEC)?;
    let client_ids = params.read_list(CLIENT_IDS);
    let group_ids = params.read_list(GROUP_IDS);

    let mut name = String::new();
    if client_ids.is_empty() && group_ids.is_empty() {
        name = params.read_string(CLIENT_NAME, "");
        if name.is_empty() {
            return Err(Error::MissingIdentity);
        }
    }

    let request = WsScriptCommand {
        client_ids,
        group_ids,
        cwd: params.read_string(CWD, ""),
        is_sudo: params.read_bool(IS_SUDO, false),
        execute_concurrently: params.read_bool(EXECUTE_CONCURRENTLY, false),
        abort_on_error: params.read_bool(ABORT_ON_ERROR, false),
        timeout_sec,
        ..WsScriptCommand::default()
    };
    Ok((request, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Client;
    use crate::output::Format;
    use crate::search::ClientProvider;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        written: Vec<Vec<u8>>,
        closed: bool,
        opened: usize,
    }

    enum Step {
        Frame(serde_json::Value),
        Raw(&'static str),
        Eof,
        Hang,
        Fail,
    }

    struct MockChannel {
        steps: VecDeque<Step>,
        fail_write: bool,
        log: Arc<Mutex<Log>>,
    }

    #[async_trait]
    impl Channel for MockChannel {
        async fn write(&mut self, frame: &[u8]) -> Result<()> {
            if self.fail_write {
                return Err(Error::Protocol("broken pipe".into()));
            }
            self.log.lock().unwrap().written.push(frame.to_vec());
            Ok(())
        }

        async fn read(&mut self) -> Result<Option<Vec<u8>>> {
            match self.steps.pop_front() {
                Some(Step::Frame(v)) => Ok(Some(serde_json::to_vec(&v).unwrap())),
                Some(Step::Raw(s)) => Ok(Some(s.as_bytes().to_vec())),
                Some(Step::Hang) => std::future::pending().await,
                Some(Step::Fail) => Err(Error::Protocol("connection reset".into())),
                Some(Step::Eof) | None => Ok(None),
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.log.lock().unwrap().closed = true;
            Ok(())
        }
    }

    struct MockOpener {
        channel: Mutex<Option<MockChannel>>,
        log: Arc<Mutex<Log>>,
    }

    impl MockOpener {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Self::build(steps, false)
        }

        fn build(steps: Vec<Step>, fail_write: bool) -> Arc<Self> {
            let log = Arc::new(Mutex::new(Log::default()));
            Arc::new(Self {
                channel: Mutex::new(Some(MockChannel {
                    steps: steps.into(),
                    fail_write,
                    log: log.clone(),
                })),
                log,
            })
        }

        fn written(&self) -> Vec<serde_json::Value> {
            self.log
                .lock()
                .unwrap()
                .written
                .iter()
                .map(|w| serde_json::from_slice(w).unwrap())
                .collect()
        }

        fn closed(&self) -> bool {
            self.log.lock().unwrap().closed
        }

        fn opened(&self) -> usize {
            self.log.lock().unwrap().opened
        }
    }

    #[async_trait]
    impl ChannelOpener for MockOpener {
        async fn open(&self) -> Result<Box<dyn Channel>> {
            self.log.lock().unwrap().opened += 1;
            match self.channel.lock().unwrap().take() {
                Some(channel) => Ok(Box::new(channel)),
                None => Err(Error::Protocol("already opened".into())),
            }
        }
    }

    struct StalledOpener;

    #[async_trait]
    impl ChannelOpener for StalledOpener {
        async fn open(&self) -> Result<Box<dyn Channel>> {
            std::future::pending().await
        }
    }

    struct StalledInventory;

    #[async_trait]
    impl ClientProvider for StalledInventory {
        async fn clients(&self) -> Result<Vec<Client>> {
            std::future::pending().await
        }
    }

    struct Clients(Vec<Client>);

    #[async_trait]
    impl ClientProvider for Clients {
        async fn clients(&self) -> Result<Vec<Client>> {
            Ok(self.0.clone())
        }
    }

    fn finished_job() -> serde_json::Value {
        serde_json::json!({
            "jid": "934",
            "status": "successful",
            "client_id": "2222",
            "command": "pwd",
            "created_by": "admin",
            "timeout_sec": 30,
            "result": {"stdout": "some out", "stderr": "some err"}
        })
    }

    fn controller(opener: &Arc<MockOpener>) -> ExecController<Vec<u8>> {
        let search = Search::new(Arc::new(Clients(vec![Client {
            id: "cl-77".into(),
            name: "db server".into(),
            ..Client::default()
        }])));
        ExecController::new(
            search,
            opener.clone(),
            opener.clone(),
            Renderer::new(Format::Json),
            Vec::new(),
        )
    }

    fn script_file(name: &str, content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        (dir, path.display().to_string())
    }

    #[test]
    fn interpreters_by_extension() {
        assert_eq!(interpreter_for("run.ps1"), "powershell");
        assert_eq!(interpreter_for("RUN.PS1"), "powershell");
        assert_eq!(interpreter_for("job.bat"), "cmd");
        assert_eq!(interpreter_for("job.Cmd"), "cmd");
        assert_eq!(interpreter_for("job.txt"), "");
        assert_eq!(interpreter_for("job"), "");
    }

    #[tokio::test]
    async fn command_is_submitted_and_rendered() {
        let opener = MockOpener::new(vec![Step::Frame(finished_job())]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([
            (CLIENT_IDS, "2222,2223"),
            (COMMAND, "pwd"),
            (CWD, "/home"),
            (IS_SUDO, "1"),
        ]);

        let job = ctl.run_command(&params).await.unwrap();
        assert_eq!(job.jid, "934");

        let written = opener.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0]["client_ids"], serde_json::json!(["2222", "2223"]));
        assert_eq!(written[0]["command"], "pwd");
        assert_eq!(written[0]["cwd"], "/home");
        assert_eq!(written[0]["is_sudo"], true);
        assert_eq!(written[0]["timeout_sec"], DEFAULT_TIMEOUT_SEC);
        assert!(opener.closed());

        let rendered: serde_json::Value = serde_json::from_slice(&ctl.into_output()).unwrap();
        assert_eq!(rendered["result"]["stdout"], "some out");
    }

    #[tokio::test]
    async fn script_is_base64_encoded_with_interpreter() {
        let (_dir, path) = script_file("some_powershell_script.ps1", "cwd");
        let opener = MockOpener::new(vec![Step::Frame(finished_job())]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([
            (CLIENT_IDS, "2222"),
            (SCRIPT, path.as_str()),
            (CWD, "/home"),
        ]);

        ctl.run_script(&params).await.unwrap();

        let written = &opener.written()[0];
        assert_eq!(written["script"], "Y3dk");
        assert_eq!(written["interpreter"], "powershell");
        assert!(written.get("command").is_none());
        let decoded = STANDARD
            .decode(written["script"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, b"cwd");
    }

    #[tokio::test]
    async fn explicit_interpreter_wins() {
        let (_dir, path) = script_file("some_cmd_script.bat", "dir");
        let opener = MockOpener::new(vec![Step::Frame(finished_job())]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([
            (CLIENT_IDS, "2224"),
            (SCRIPT, path.as_str()),
            (INTERPRETER, "powershell"),
        ]);

        ctl.run_script(&params).await.unwrap();
        assert_eq!(opener.written()[0]["interpreter"], "powershell");
    }

    #[tokio::test]
    async fn unknown_extension_has_no_interpreter() {
        let (_dir, path) = script_file("some_cmd_script.txt", "ls");
        let opener = MockOpener::new(vec![Step::Frame(finished_job())]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_IDS, "2226"), (SCRIPT, path.as_str())]);

        ctl.run_script(&params).await.unwrap();
        assert!(opener.written()[0].get("interpreter").is_none());
    }

    #[tokio::test]
    async fn invalid_input_never_opens_a_channel() {
        let opener = MockOpener::new(vec![]);
        let mut ctl = controller(&opener);

        let err = ctl
            .run_command(&ParameterBag::from_values([(CLIENT_IDS, "1")]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "required option command is empty");

        let err = ctl
            .run_script(&ParameterBag::from_values([(CLIENT_IDS, "1")]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "required option script is empty");

        let err = ctl
            .run_script(&ParameterBag::from_values([
                (CLIENT_IDS, "1"),
                (SCRIPT, "some_unknown_script.sh"),
            ]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "script file doesn't exist: some_unknown_script.sh"
        );

        let err = ctl
            .run_command(&ParameterBag::from_values([
                (CLIENT_IDS, "1"),
                (COMMAND, "ls"),
                (SCRIPT, "x.sh"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = ctl
            .run_command(&ParameterBag::from_values([(COMMAND, "ls")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingIdentity));

        assert_eq!(opener.opened(), 0);
    }

    #[tokio::test]
    async fn name_resolves_to_client_id() {
        let opener = MockOpener::new(vec![Step::Frame(finished_job())]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_NAME, "DB"), (COMMAND, "uptime")]);

        ctl.run_command(&params).await.unwrap();
        assert_eq!(opener.written()[0]["client_ids"], serde_json::json!(["cl-77"]));
    }

    #[tokio::test]
    async fn progress_frames_are_skipped() {
        let mut running = finished_job();
        running["status"] = "running".into();
        let opener = MockOpener::new(vec![
            Step::Raw("not json"),
            Step::Frame(serde_json::json!({"ping": 1})),
            Step::Frame(running),
            Step::Frame(finished_job()),
        ]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "pwd")]);

        let job = ctl.run_command(&params).await.unwrap();
        assert_eq!(job.status, "successful");
        assert!(opener.closed());
    }

    #[tokio::test]
    async fn early_close_is_incomplete() {
        let mut running = finished_job();
        running["status"] = "in_progress".into();
        let opener = MockOpener::new(vec![Step::Frame(running), Step::Eof]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "pwd")]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert!(matches!(err, Error::IncompleteExecution));
        assert!(opener.closed());
        assert!(ctl.into_output().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses() {
        let opener = MockOpener::new(vec![Step::Hang]);
        let mut ctl = controller(&opener).with_deadline(Some(Duration::from_secs(5)));
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "sleep 60")]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
        assert!(opener.closed());
    }

    #[tokio::test(start_paused = true)]
    async fn default_deadline_follows_job_timeout() {
        let opener = MockOpener::new(vec![Step::Hang]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([
            (CLIENT_IDS, "1"),
            (COMMAND, "sleep 60"),
            (TIMEOUT_SEC, "3"),
        ]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(13)));
    }

    #[tokio::test]
    async fn write_failure_still_closes() {
        let opener = MockOpener::build(vec![Step::Frame(finished_job())], true);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "pwd")]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(opener.closed());
    }

    #[tokio::test]
    async fn failed_job_is_not_a_rejection() {
        let mut failed = finished_job();
        failed["status"] = "failed".into();
        failed["error"] = "exit status 1".into();
        let opener = MockOpener::new(vec![Step::Frame(failed)]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "false")]);

        let job = ctl.run_command(&params).await.unwrap();
        assert_eq!(job.status, "failed");
        assert_eq!(job.error, "exit status 1");
    }

    #[tokio::test]
    async fn server_rejection() {
        let opener = MockOpener::new(vec![Step::Frame(
            serde_json::json!({"error": "client 1 is not active"}),
        )]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "pwd")]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "server rejected the command: client 1 is not active"
        );
        assert!(opener.closed());
    }

    #[tokio::test]
    async fn read_failure_still_closes() {
        let opener = MockOpener::new(vec![Step::Fail]);
        let mut ctl = controller(&opener);
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "pwd")]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert_eq!(err.to_string(), "protocol error: connection reset");
        assert!(opener.closed());
        assert!(ctl.into_output().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_open_hits_the_deadline() {
        let mut ctl = ExecController::new(
            Search::new(Arc::new(Clients(vec![]))),
            Arc::new(StalledOpener),
            Arc::new(StalledOpener),
            Renderer::new(Format::Json),
            Vec::new(),
        )
        .with_deadline(Some(Duration::from_secs(5)));
        let params = ParameterBag::from_values([(CLIENT_IDS, "1"), (COMMAND, "pwd")]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
        assert!(ctl.into_output().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_name_lookup_hits_the_deadline() {
        let opener = MockOpener::new(vec![Step::Frame(finished_job())]);
        let mut ctl = ExecController::new(
            Search::new(Arc::new(StalledInventory)),
            opener.clone(),
            opener.clone(),
            Renderer::new(Format::Json),
            Vec::new(),
        )
        .with_deadline(Some(Duration::from_secs(5)));
        let params = ParameterBag::from_values([(CLIENT_NAME, "db"), (COMMAND, "pwd")]);

        let err = ctl.run_command(&params).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(opener.opened(), 0);
        assert!(!opener.closed());
    }

    #[tokio::test]
    async fn huge_job_timeout_does_not_overflow_the_deadline() {
        let opener = MockOpener::new(vec![Step::Frame(finished_job())]);
        let mut ctl = controller(&opener);
        let max = u64::MAX.to_string();
        let params = ParameterBag::from_values([
            (CLIENT_IDS, "1"),
            (COMMAND, "pwd"),
            (TIMEOUT_SEC, max.as_str()),
        ]);

        let job = ctl.run_command(&params).await.unwrap();
        assert_eq!(job.jid, "934");
        assert_eq!(opener.written()[0]["timeout_sec"], u64::MAX);
    }
}
