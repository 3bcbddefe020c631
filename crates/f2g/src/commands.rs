//! Conversion pipeline: list, fetch, cache, align, encode.
//!
//! Every network payload lands in the cache directory before it is used,
//! so a rerun over the same date range touches the API only for data the
//! cache does not already hold. The activity list is completeness-marked:
//! its marker file is written only after the JSONL data file, and a rerun
//! refetches the list whenever the marker is missing.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use fitbit_client::cache::{CacheStore, FsCacheStore};
use fitbit_client::retry::RetryPolicy;
use fitbit_client::token::{AuthorizeFlow, TokenStore};
use fitbit_client::{Activity, FitbitClient};
use tokio::sync::watch;

use crate::encoder::{ActivityEncoder, NormalizedActivity};
use crate::error::{PipelineError, PipelineResult};
use crate::intraday::{self, HrStats};
use crate::{fit, tcx};

/// Maximum newline count of a track payload that still counts as "too
/// short to bother converting".
const SHORT_TRACK_NEWLINES: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Tcx,
    Fit,
}

impl OutputFormat {
    pub fn encoder(self) -> Box<dyn ActivityEncoder> {
        match self {
            OutputFormat::Tcx => Box::new(tcx::TcxEncoder),
            OutputFormat::Fit => Box::new(fit::FitEncoder),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub cache_directory: std::path::PathBuf,
    pub directory: std::path::PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub format: OutputFormat,
}

/// Operator acknowledgement before an activity is skipped.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> PipelineResult<()>;
}

/// Blocks on a newline from stdin, mirroring an interactive prompt.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &str) -> PipelineResult<()> {
        println!("{prompt}");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(())
    }
}

/// Accepts every prompt without interaction.
pub struct AutoConfirmer;

impl Confirmer for AutoConfirmer {
    fn confirm(&self, _prompt: &str) -> PipelineResult<()> {
        Ok(())
    }
}

/// An activity is skipped when it was auto-detected or its track is
/// trivially short, unless an intraday heart-rate series exists for it.
fn should_skip(activity: &Activity, track_newlines: usize) -> bool {
    let auto_detected = activity.log_type == "auto_detected";
    let short_track = track_newlines <= SHORT_TRACK_NEWLINES;
    (auto_detected || short_track) && activity.heart_rate_link.is_none()
}

fn list_key(start: NaiveDate, end: NaiveDate) -> String {
    format!(".exercises.{start}-{end}")
}

struct Pipeline<'a> {
    client: &'a dyn FitbitClient,
    flow: &'a dyn AuthorizeFlow,
    confirmer: &'a dyn Confirmer,
    cache: FsCacheStore,
    output: FsCacheStore,
    tokens: TokenStore,
    retry: RetryPolicy,
    encoder: Box<dyn ActivityEncoder>,
}

impl<'a> Pipeline<'a> {
    async fn activity_list(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> PipelineResult<Vec<serde_json::Value>> {
        let marker = list_key(start, end);
        let data_key = format!("{marker}.jsonl");
        if self.cache.is_complete(&marker) {
            let bytes = self.cache.get(&data_key)?.unwrap_or_default();
            return bytes
                .split(|&b| b == b'\n')
                .filter(|line| !line.is_empty())
                .map(|line| serde_json::from_slice(line).map_err(PipelineError::from))
                .collect();
        }

        let (client, flow, tokens) = (self.client, self.flow, &self.tokens);
        let entries = self
            .retry
            .run_cancellable(
                move || async move {
                    let token = tokens.acquire(client, flow).await?;
                    client
                        .get_activity_log_list(&token.bearer(), start, end)
                        .await
                },
                cancel_rx,
            )
            .await?;

        let mut buf = Vec::new();
        for entry in &entries {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }
        self.cache.put(&data_key, &buf)?;
        self.cache.mark_complete(&marker)?;
        tracing::info!(count = entries.len(), "fetched activity list");
        Ok(entries)
    }

    /// Fetch-through-cache for one intraday or track payload.
    async fn cached_fetch<F, Fut>(
        &self,
        store: &FsCacheStore,
        key: &str,
        cancel_rx: &mut watch::Receiver<bool>,
        fetch: F,
    ) -> PipelineResult<Vec<u8>>
    where
        F: Fn(fitbit_client::token::AuthToken) -> Fut,
        Fut: std::future::Future<Output = Result<Vec<u8>, fitbit_client::FitbitError>>,
    {
        if let Some(bytes) = store.get(key)? {
            return Ok(bytes);
        }
        let (client, flow, tokens, fetch) = (self.client, self.flow, &self.tokens, &fetch);
        let bytes = self
            .retry
            .run_cancellable(
                move || async move {
                    let token = tokens.acquire(client, flow).await?;
                    fetch(token).await
                },
                cancel_rx,
            )
            .await?;
        store.put(key, &bytes)?;
        Ok(bytes)
    }

    async fn convert_one(
        &self,
        activity: &Activity,
        raw: &serde_json::Value,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> PipelineResult<()> {
        let log_id = activity.log_id;
        self.output.put_if_absent(
            &format!("{log_id}/exercise-activity.json"),
            &serde_json::to_vec(raw)?,
        )?;

        let track = self
            .cached_fetch(
                &self.cache,
                &format!(".exercise.{log_id}.tcx"),
                cancel_rx,
                |token| async move {
                    let bearer = token.bearer();
                    self.client.get_activity_track(&bearer, log_id).await
                },
            )
            .await?;
        let track_newlines = track.iter().filter(|&&b| b == b'\n').count();

        if should_skip(activity, track_newlines) {
            tracing::warn!(
                log_id,
                activity = %activity.activity_name,
                log_type = %activity.log_type,
                track_newlines,
                "skipping activity without usable heart rate data"
            );
            self.confirmer.confirm("Press Enter to continue...")?;
            return Ok(());
        }

        let out_name = self.encoder.file_name(log_id);
        if self.output.has(&out_name) {
            tracing::debug!(log_id, file = %out_name, "output already exists");
            return Ok(());
        }

        let hr_link = activity
            .heart_rate_link
            .as_deref()
            .ok_or(PipelineError::NoHeartRate(log_id))?;
        let hr_bytes = self
            .cached_fetch(
                &self.output,
                &format!("{log_id}/exercise-heart-rate.json"),
                cancel_rx,
                |token| async move {
                    let bearer = token.bearer();
                    self.client.get_intraday(&bearer, hr_link).await
                },
            )
            .await?;

        let cal_bytes = match &activity.calories_link {
            Some(link) => {
                let key = format!("{log_id}/exercise-calories.json");
                match self.output.get(&key)? {
                    Some(bytes) => Some(bytes),
                    None => {
                        let (client, flow, tokens) = (self.client, self.flow, &self.tokens);
                        let link = link.as_str();
                        let fetched = self
                            .retry
                            .run_cancellable(
                                move || async move {
                                    let token = tokens.acquire(client, flow).await?;
                                    client.get_calories(&token.bearer(), link).await
                                },
                                cancel_rx,
                            )
                            .await?;
                        if let Some(bytes) = &fetched {
                            self.output.put(&key, bytes)?;
                        }
                        fetched
                    }
                }
            }
            None => None,
        };

        let start: DateTime<FixedOffset> = activity
            .start_time
            .parse()
            .map_err(|e| PipelineError::Intraday(format!("start time: {e}")))?;
        let offset = *start.offset();

        let hr = intraday::parse_heart_rate(&hr_bytes, offset)?;
        let stats = HrStats::compute(&hr).ok_or(PipelineError::NoHeartRate(log_id))?;
        // a calorie payload that fails to parse downgrades to "no calories"
        let calories = cal_bytes.as_deref().and_then(|bytes| {
            match intraday::parse_calories(bytes, offset) {
                Ok(samples) => Some(samples),
                Err(e) => {
                    tracing::warn!(log_id, error = %e, "ignoring unparseable calorie payload");
                    None
                }
            }
        });
        let records = intraday::align(&hr, calories.as_deref());

        let normalized = NormalizedActivity {
            activity: activity.clone(),
            start,
            stats,
            records,
        };
        let encoded = self.encoder.encode(&normalized)?;
        self.output.put_if_absent(&out_name, &encoded)?;
        tracing::info!(log_id, file = %out_name, bytes = encoded.len(), "wrote activity");
        Ok(())
    }
}

/// Run the full conversion over one inclusive date range.
pub async fn run_convert(
    client: Arc<dyn FitbitClient>,
    flow: &dyn AuthorizeFlow,
    confirmer: &dyn Confirmer,
    options: &ConvertOptions,
    cancel_rx: &mut watch::Receiver<bool>,
) -> PipelineResult<()> {
    let cache = FsCacheStore::new(&options.cache_directory)?;
    let tokens = TokenStore::new(cache.path_for(".auth"));
    let pipeline = Pipeline {
        client: client.as_ref(),
        flow,
        confirmer,
        output: FsCacheStore::new(&options.directory)?,
        cache,
        tokens,
        retry: RetryPolicy::default(),
        encoder: options.format.encoder(),
    };

    let entries = pipeline
        .activity_list(options.start_date, options.end_date, cancel_rx)
        .await?;
    let total = entries.len();
    for (i, raw) in entries.iter().enumerate() {
        if *cancel_rx.borrow() {
            return Err(PipelineError::Aborted);
        }
        let activity = Activity::from_value(raw)?;
        tracing::info!(
            "[{}/{}] {} ({})",
            i + 1,
            total,
            activity.activity_name,
            activity.start_time
        );
        pipeline.convert_one(&activity, raw, cancel_rx).await?;
    }
    Ok(())
}
