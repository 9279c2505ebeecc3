use crate::client::SabError::*;
use crate::entities::{
    AddOptions, CompleteAction, HistoryQuery, Ids, ParamValue, Params, Payload, PostProcessing,
    PriorityToken, SortDirection, SortField, SpeedLimit, SwitchTarget, UnwrapRule,
};
use crate::utils::{join_identifiers, normalize_params, priority_from_token};
use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

const API_PATH: &str = "/sabnzbd/api";
const JSON_CONTENT_TYPE: &str = "application/json";
const RESERVED_KEYS: [&str; 3] = ["mode", "apikey", "output"];

/// Request timeout used unless another one is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Custom error types for the [`Sabnzbd`] client
#[derive(Error, Debug)]
pub enum SabError {
    #[error("Network request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Response was not in the expected JSON format (content-type: {content_type})")]
    InvalidFormat { content_type: String },

    #[error("JSON deserialization error: {0}")]
    InvalidResponse(String),

    #[error("Invalid input parameter: {0}")]
    InvalidInput(String),

    #[error("URL parsing error: {0}")]
    UrlParse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SabError {
    /// Returns true if the request did not complete within the configured timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Network(error) if error.is_timeout())
    }
}

/// SABnzbd API client
#[derive(Clone)]
pub struct Sabnzbd {
    url: Url,
    api_key: String,
    client: Client,
}

impl Sabnzbd {
    /// Creates a new `Sabnzbd` client for the given URL, API key and timeout.
    ///
    /// The `/sabnzbd/api` path is appended to the URL unless it already ends with it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - URL or API key is empty
    /// - URL doesn't start with "http://" or "https://" or can't be parsed
    /// - The HTTP client can't be created
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(url: String, api_key: String, timeout_ms: u64) -> Result<Self> {
        if url.is_empty() {
            return Err(Configuration("URL cannot be empty".into()).into());
        }

        if api_key.is_empty() {
            return Err(Configuration("API key cannot be empty".into()).into());
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(
                Configuration(format!("URL must start with http:// or https://, got: {url}")).into(),
            );
        }

        let url = Url::parse(&normalize_url(&url)).map_err(|error| UrlParse(error.to_string()))?;

        let client = Self::create_client(timeout_ms)?;

        Ok(Self {
            url,
            api_key,
            client,
        })
    }

    /// Creates a configured HTTP client
    fn create_client(timeout: u64) -> Result<Client> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout))
            .build()
            .map_err(Network)
            .context("Failed to create HTTP client")?;
        Ok(client)
    }

    /// Creates a new `Sabnzbd` client with a builder pattern
    #[must_use]
    pub fn builder() -> SabnzbdBuilder {
        SabnzbdBuilder::default()
    }

    /// API endpoint all commands are sent to
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends a single command and returns the decoded JSON body as-is.
    ///
    /// `params` are merged over `mode`, `apikey` and `output=json`; unset
    /// parameters are left out of the request.
    ///
    /// A response without a content type is decoded as JSON when possible and
    /// otherwise returned as a JSON string holding the raw body text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Command is empty
    /// - Network request fails or times out
    /// - Response declares a content type other than JSON
    /// - Response declares JSON but the body is not valid JSON
    pub async fn execute(&self, command: &str, params: Params) -> Result<Value> {
        if command.is_empty() {
            return Err(InvalidInput("Command cannot be empty".into()).into());
        }

        let query = build_query(command, &self.api_key, &params);
        debug!(
            "Sending command '{}' to {} with parameters: {}",
            command,
            self.url,
            describe_query(&query)
        );

        let response = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .query(&query)
            .send()
            .await
            .map_err(Network)
            .with_context(|| format!("Failed to send command '{command}'"))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        debug!(
            "Command '{}' answered with status: {}, content type: {:?}",
            command,
            response.status(),
            content_type
        );

        if let Some(content_type) = content_type.as_ref().filter(|value| !is_json(value)) {
            return Err(InvalidFormat {
                content_type: content_type.clone(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .map_err(Network)
            .with_context(|| format!("Failed to read response of command '{command}'"))?;

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Ok(value),
            Err(_) if content_type.is_none() => {
                Ok(Value::String(String::from_utf8_lossy(&body).into_owned()))
            }
            Err(error) => Err(InvalidResponse(error.to_string()).into()),
        }
    }

    /// Sends a command and applies the operation's unwrap rule to the result
    async fn command(&self, command: &str, params: Params, rule: UnwrapRule) -> Result<Payload> {
        let body = self.execute(command, params).await?;
        Ok(rule.apply(body))
    }

    /// Gets the version of the SABnzbd server
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn version(&self) -> Result<Payload> {
        self.command("version", Params::new(), UnwrapRule::Version)
            .await
            .context("Failed to get version")
    }

    /// Gets the download queue, optionally paginated and filtered
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn queue(
        &self,
        start: Option<u32>,
        limit: Option<u32>,
        search: Option<&str>,
    ) -> Result<Payload> {
        let params = Params::new()
            .with_opt("start", start)
            .with_opt("limit", limit)
            .with_opt("search", search);

        self.command("queue", params, UnwrapRule::Queue)
            .await
            .context("Failed to get queue")
    }

    /// Pauses the whole queue, for the given number of minutes or indefinitely
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn pause_queue(&self, minutes: Option<u32>) -> Result<Payload> {
        let (command, params) = match minutes.filter(|minutes| *minutes > 0) {
            Some(minutes) => (
                "config",
                Params::new().with("name", "set_pause").with("value", minutes),
            ),
            None => ("pause", Params::new()),
        };

        self.command(command, params, UnwrapRule::Status)
            .await
            .context("Failed to pause queue")
    }

    /// Resumes the whole queue
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn resume_queue(&self) -> Result<Payload> {
        self.command("resume", Params::new(), UnwrapRule::Status)
            .await
            .context("Failed to resume queue")
    }

    /// Pauses a specific job
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn pause_job(&self, nzo_id: &str) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let params = Params::new().with("name", "pause").with("value", nzo_id);

        self.command("queue", params, UnwrapRule::Status)
            .await
            .with_context(|| format!("Failed to pause job id: {nzo_id}"))
    }

    /// Resumes a specific job
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn resume_job(&self, nzo_id: &str) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let params = Params::new().with("name", "resume").with("value", nzo_id);

        self.command("queue", params, UnwrapRule::Status)
            .await
            .with_context(|| format!("Failed to resume job id: {nzo_id}"))
    }

    /// Deletes one or more jobs from the queue.
    ///
    /// `del_files=1` is only sent when `delete_files` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The identifier list is empty or contains an empty ID
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn delete_jobs(&self, nzo_ids: impl Into<Ids>, delete_files: bool) -> Result<Payload> {
        let value = join_identifiers(&nzo_ids.into())?;
        self.delete_from_queue(value, delete_files)
            .await
            .context("Failed to delete jobs")
    }

    /// Deletes every job in the queue
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn delete_all_jobs(&self, delete_files: bool) -> Result<Payload> {
        let value = join_identifiers(&Ids::All)?;
        self.delete_from_queue(value, delete_files)
            .await
            .context("Failed to delete all jobs")
    }

    async fn delete_from_queue(&self, value: String, delete_files: bool) -> Result<Payload> {
        let params = Params::new()
            .with("name", "delete")
            .with("value", value)
            .with_opt("del_files", delete_files.then_some(1_i64));

        self.command("queue", params, UnwrapRule::Status).await
    }

    /// Removes every job from the queue, or only those matching `search`
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn purge_queue(&self, search: Option<&str>, delete_files: bool) -> Result<Payload> {
        let params = Params::new()
            .with("name", "purge")
            .with_opt("search", search)
            .with_opt("del_files", delete_files.then_some(1_i64));

        self.command("queue", params, UnwrapRule::Status)
            .await
            .context("Failed to purge queue")
    }

    /// Moves a job above another job, or to an absolute queue position
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn move_job(&self, nzo_id: &str, target: impl Into<SwitchTarget>) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let target: SwitchTarget = target.into();
        let params = Params::new().with("value", nzo_id).with("value2", target);

        self.command("switch", params, UnwrapRule::Raw)
            .await
            .with_context(|| format!("Failed to move job id: {nzo_id}"))
    }

    /// Changes the category of a job
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn change_job_category(&self, nzo_id: &str, category: &str) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let params = Params::new().with("value", nzo_id).with("value2", category);

        self.command("change_cat", params, UnwrapRule::Raw)
            .await
            .with_context(|| format!("Failed to change category of job id: {nzo_id}"))
    }

    /// Changes the post-processing script of a job
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn change_job_script(&self, nzo_id: &str, script: &str) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let params = Params::new().with("value", nzo_id).with("value2", script);

        self.command("change_script", params, UnwrapRule::Raw)
            .await
            .with_context(|| format!("Failed to change script of job id: {nzo_id}"))
    }

    /// Changes the priority of a job, given by name (`paused`, `low`, `normal`,
    /// `high`, `forced`) or number
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn change_job_priority(
        &self,
        nzo_id: &str,
        priority: impl Into<PriorityToken>,
    ) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let priority = priority_from_token(Some(&priority.into()));
        let params = Params::new()
            .with("name", "priority")
            .with("value", nzo_id)
            .with("priority", priority);

        self.command("queue", params, UnwrapRule::Raw)
            .await
            .with_context(|| format!("Failed to change priority of job id: {nzo_id}"))
    }

    /// Changes the post-processing options of a job
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn change_job_post_processing(
        &self,
        nzo_id: &str,
        post_processing: PostProcessing,
    ) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let params = Params::new()
            .with("value", nzo_id)
            .with("value2", post_processing);

        self.command("change_opts", params, UnwrapRule::Raw)
            .await
            .with_context(|| format!("Failed to change post-processing of job id: {nzo_id}"))
    }

    /// Lists the files of a job
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn get_job_files(&self, nzo_id: &str) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        let params = Params::new().with("value", nzo_id);

        self.command("get_files", params, UnwrapRule::Files)
            .await
            .with_context(|| format!("Failed to get files of job id: {nzo_id}"))
    }

    /// Removes a single file from a job
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Job ID or file ID is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn remove_job_file(&self, nzo_id: &str, nzf_id: &str) -> Result<Payload> {
        require("Job ID", nzo_id)?;
        require("File ID", nzf_id)?;
        let params = Params::new()
            .with("name", "delete_nzf")
            .with("value", nzo_id)
            .with("value2", nzf_id);

        self.command("queue", params, UnwrapRule::Raw)
            .await
            .with_context(|| format!("Failed to remove file {nzf_id} from job id: {nzo_id}"))
    }

    /// Sets the global download speed limit
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn speed_limit(&self, limit: SpeedLimit) -> Result<Payload> {
        let params = Params::new().with("name", "speedlimit").with("value", limit);

        self.command("config", params, UnwrapRule::Status)
            .await
            .context("Failed to set speed limit")
    }

    /// Sets the action to run once the queue is complete
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn on_queue_complete(&self, action: &CompleteAction) -> Result<Payload> {
        let params = Params::new().with("value", action.to_wire());

        self.command("change_complete_action", params, UnwrapRule::Status)
            .await
            .context("Failed to set queue complete action")
    }

    /// Sorts the queue, ascending unless a direction is given
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn sort_queue(
        &self,
        field: SortField,
        direction: Option<SortDirection>,
    ) -> Result<Payload> {
        let params = Params::new()
            .with("name", "sort")
            .with("sort", field.as_str())
            .with("dir", direction.unwrap_or_default().as_str());

        self.command("queue", params, UnwrapRule::Status)
            .await
            .context("Failed to sort queue")
    }

    /// Adds a download by fetching the NZB from a remote URL
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - URL is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn add_by_url(&self, url: &str, options: &AddOptions) -> Result<Payload> {
        require("URL", url)?;
        debug!("Adding download from URL: {url}");

        self.command("addurl", add_params(url, options), UnwrapRule::AddedJobs)
            .await
            .with_context(|| format!("Failed to add download from URL: {url}"))
    }

    /// Adds a download from an NZB file on the server's filesystem
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Path is empty
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn add_by_location(&self, path: &str, options: &AddOptions) -> Result<Payload> {
        require("Path", path)?;
        debug!("Adding download from local file: {path}");

        self.command("addlocalfile", add_params(path, options), UnwrapRule::AddedJobs)
            .await
            .with_context(|| format!("Failed to add download from local file: {path}"))
    }

    /// Gets the history, optionally paginated and filtered
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn history(&self, query: &HistoryQuery) -> Result<Payload> {
        let params = Params::new()
            .with_opt("start", query.start)
            .with_opt("limit", query.limit)
            .with_opt("category", query.category.as_deref())
            .with_opt("search", query.search.as_deref())
            .with("failed_only", i64::from(query.failed_only));

        self.command("history", params, UnwrapRule::Raw)
            .await
            .context("Failed to get history")
    }

    /// Retries every failed job in the history
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't be executed, see [`Self::execute()`]
    pub async fn retry_all_history(&self) -> Result<Payload> {
        self.command("retry_all", Params::new(), UnwrapRule::Raw)
            .await
            .context("Failed to retry history")
    }

    /// Deletes history entries, all of them when no identifiers are given.
    ///
    /// Unlike queue deletion, `del_files` is always sent (`0` or `1`).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The identifier list is empty or contains an empty ID
    /// - The command can't be executed, see [`Self::execute()`]
    pub async fn delete_history(&self, nzo_ids: Option<Ids>, delete_files: bool) -> Result<Payload> {
        let value = join_identifiers(&nzo_ids.unwrap_or(Ids::All))?;
        let params = Params::new()
            .with("name", "delete")
            .with("value", value)
            .with("del_files", i64::from(delete_files));

        self.command("history", params, UnwrapRule::Raw)
            .await
            .context("Failed to delete history")
    }
}

/// Appends the API path unless the URL already addresses it
fn normalize_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.ends_with(API_PATH) {
        url.to_string()
    } else {
        format!("{url}{API_PATH}")
    }
}

fn is_json(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains(JSON_CONTENT_TYPE)
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(InvalidInput(format!("{name} cannot be empty")).into());
    }
    Ok(())
}

/// Builds the query string of a command, extra parameters take precedence
fn build_query(command: &str, api_key: &str, params: &Params) -> Vec<(String, String)> {
    let mut merged: BTreeMap<String, ParamValue> = BTreeMap::from([
        ("mode".to_string(), ParamValue::from(command)),
        ("apikey".to_string(), ParamValue::from(api_key)),
        ("output".to_string(), ParamValue::from("json")),
    ]);

    for (key, value) in normalize_params(params).iter() {
        let Some(value) = value else { continue };
        if RESERVED_KEYS.contains(&key) {
            warn!("Parameter '{key}' overrides a reserved key of command '{command}'");
        }
        merged.insert(key.to_string(), value.clone());
    }

    merged
        .into_iter()
        .flat_map(|(key, value)| {
            value
                .to_query_values()
                .into_iter()
                .map(move |value| (key.clone(), value))
        })
        .collect()
}

/// Query parameters for logging, with the API key left out
fn describe_query(query: &[(String, String)]) -> String {
    query
        .iter()
        .map(|(key, value)| {
            if key == "apikey" {
                format!("{key}=***")
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn add_params(name: &str, options: &AddOptions) -> Params {
    Params::new()
        .with("name", name)
        .with_opt("nzbname", options.nzbname.as_deref())
        .with_opt("cat", options.category.as_deref())
        .with("priority", priority_from_token(options.priority.as_ref()))
        .with_opt("script", options.script.as_deref())
        .with_opt("pp", options.post_processing)
}

/// Builder for [`Sabnzbd`] client
#[derive(Default)]
pub struct SabnzbdBuilder {
    url: Option<String>,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl SabnzbdBuilder {
    /// Sets the server URL
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the API key
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the request timeout in milliseconds
    #[must_use]
    pub fn timeout(mut self, timeout_millis: u64) -> Self {
        self.timeout = Some(timeout_millis);
        self
    }

    /// Builds the [`Sabnzbd`] client
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required fields (URL, API key) are not provided
    /// - URL doesn't start with "http://" or "https://"
    /// - Any field contains invalid data
    pub fn build(self) -> Result<Sabnzbd> {
        let url = self
            .url
            .ok_or_else(|| Configuration("URL is required".into()))?;
        let api_key = self
            .api_key
            .ok_or_else(|| Configuration("API key is required".into()))?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS);

        let client = Sabnzbd::new(url, api_key, timeout)?;

        Ok(client)
    }
}
