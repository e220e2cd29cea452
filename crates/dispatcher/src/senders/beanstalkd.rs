//! BeanstalkdSender - job queue producer speaking the beanstalkd text protocol

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use contracts::{parse_duration, ContractError, Destination, EventSender, IncomingEvent};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{error, info, instrument};

const MAX_TUBE_NAME_LEN: usize = 199;

/// Configuration for BeanstalkdSender
#[derive(Debug, Clone)]
pub struct BeanstalkdSenderConfig {
    /// Bound on connecting and on each protocol exchange
    pub io_timeout: Duration,
    /// Job priority when `control.priority` is absent
    pub default_priority: u32,
    /// Time-to-run when `control.ttr` is absent
    pub default_ttr: Duration,
}

impl Default for BeanstalkdSenderConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(5),
            default_priority: 65536,
            default_ttr: Duration::from_secs(60),
        }
    }
}

/// Routing read from the event's control metadata
#[derive(Debug, Clone, PartialEq, Eq)]
struct JobRequest {
    host: String,
    tube: String,
    priority: u32,
    delay: Duration,
    ttr: Duration,
}

/// Enqueues the event payload as a beanstalkd job.
///
/// Host, tube and scheduling hints come from `control`:
/// `beanstalkd_host`, `queue_name`, `priority`, `delay`, `ttr`.
pub struct BeanstalkdSender {
    name: String,
    config: BeanstalkdSenderConfig,
}

impl BeanstalkdSender {
    pub fn new(name: impl Into<String>, config: BeanstalkdSenderConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn job_request(&self, event: &IncomingEvent) -> Result<JobRequest, ContractError> {
        if event.control.is_empty() {
            return Err(ContractError::unretryable("Event control is empty"));
        }

        let host = control_str(event, "beanstalkd_host")
            .ok_or_else(|| ContractError::unretryable("beanstalkd_host is empty"))?;
        if !is_valid_host(host) {
            return Err(ContractError::unretryable("beanstalkd_host is invalid"));
        }

        let tube = control_str(event, "queue_name")
            .ok_or_else(|| ContractError::unretryable("queue_name for beanstalkd sender is empty"))?;
        if !is_valid_tube_name(tube) {
            return Err(ContractError::unretryable(
                "queue_name for beanstalkd sender is invalid",
            ));
        }

        let priority = match event.control.get("priority") {
            None | Some(Value::Null) => self.config.default_priority,
            Some(value) => value
                .as_u64()
                .and_then(|p| u32::try_from(p).ok())
                .ok_or_else(|| ContractError::unretryable("priority is invalid"))?,
        };

        Ok(JobRequest {
            host: host.to_string(),
            tube: tube.to_string(),
            priority,
            delay: control_duration(event, "delay")?.unwrap_or(Duration::ZERO),
            ttr: control_duration(event, "ttr")?.unwrap_or(self.config.default_ttr),
        })
    }

    async fn put(&self, job: &JobRequest, body: &[u8]) -> Result<u64, ContractError> {
        let stream = self
            .within_timeout(TcpStream::connect(&job.host))
            .await?
            .map_err(|e| self.transport(format!("create connection failed: {e}")))?;
        let mut conn = BufReader::new(stream);

        self.command(&mut conn, format!("use {}\r\n", job.tube).as_bytes())
            .await?
            .strip_prefix("USING ")
            .ok_or_else(|| self.transport("unexpected reply to use"))?;

        let mut put = format!(
            "put {} {} {} {}\r\n",
            job.priority,
            job.delay.as_secs(),
            job.ttr.as_secs().max(1),
            body.len()
        )
        .into_bytes();
        put.extend_from_slice(body);
        put.extend_from_slice(b"\r\n");

        let reply = self.command(&mut conn, &put).await?;
        reply
            .strip_prefix("INSERTED ")
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| self.transport(format!("put job failed: {reply}")))
    }

    async fn command(
        &self,
        conn: &mut BufReader<TcpStream>,
        request: &[u8],
    ) -> Result<String, ContractError> {
        self.within_timeout(conn.get_mut().write_all(request))
            .await?
            .map_err(|e| self.transport(format!("write failed: {e}")))?;

        let mut line = String::new();
        self.within_timeout(conn.read_line(&mut line))
            .await?
            .map_err(|e| self.transport(format!("read failed: {e}")))?;
        Ok(line.trim_end().to_string())
    }

    async fn within_timeout<F: std::future::Future>(&self, fut: F) -> Result<F::Output, ContractError> {
        tokio::time::timeout(self.config.io_timeout, fut)
            .await
            .map_err(|_| self.transport("timed out"))
    }

    fn transport(&self, message: impl Into<String>) -> ContractError {
        ContractError::transport(&self.name, message)
    }
}

#[async_trait]
impl EventSender for BeanstalkdSender {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "beanstalkd_sender_send",
        skip(self, event, destination),
        fields(sender = %self.name, destination = %destination.name())
    )]
    async fn send_event(
        &self,
        event: &IncomingEvent,
        destination: &Destination,
    ) -> Result<(), ContractError> {
        let job = self.job_request(event).inspect_err(|e| {
            error!(event = %event.trace_info(), error = %e, "Invalid beanstalkd job metadata");
        })?;
        let body = serde_json::to_vec(&event.payload)?;

        let id = self.put(&job, &body).await?;
        info!(
            id,
            tube = %job.tube,
            pri = job.priority,
            delay_s = job.delay.as_secs(),
            ttr_s = job.ttr.as_secs(),
            "Enqueue job"
        );
        Ok(())
    }
}

fn control_str<'a>(event: &'a IncomingEvent, key: &str) -> Option<&'a str> {
    event
        .control
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Integer seconds or a unit-suffixed string
fn control_duration(event: &IncomingEvent, key: &str) -> Result<Option<Duration>, ContractError> {
    match event.control.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| ContractError::unretryable(format!("{key} is invalid"))),
        Some(Value::String(s)) => parse_duration(s)
            .map(Some)
            .map_err(|e| ContractError::unretryable(format!("{key} is invalid: {e}"))),
        Some(_) => Err(ContractError::unretryable(format!("{key} is invalid"))),
    }
}

/// `host:port`, where host is an IP or a bare hostname (no URL scheme)
fn is_valid_host(addr: &str) -> bool {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return false;
    };
    if host.is_empty() || port.parse::<u16>().is_err() {
        return false;
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    !(host.starts_with("http://") || host.starts_with("https://"))
}

fn is_valid_tube_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_TUBE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "\\-+/;.$_()".contains(c))
}
