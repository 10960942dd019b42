use analyser_cloc::{CountRequest, LineCountReport};
use analyser_core::{
    message::{has_job_fields, mentions_tracked_language, parse_job},
    models::{ChatEvent, FrameworkKind, JobDescriptor},
};
use analyser_framework::{FormatOutcome, Formatter};
use analyser_git::Materializer;
use analyser_slack::ChatClient;
use anyhow::{Context, Result};
use time::OffsetDateTime;
use tracing::{Instrument, field};

use crate::{
    JobContext,
    store::{JobRecord, JobStatus, JobStore},
};

/// How a chat event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The event id was already taken.
    Duplicate,
    /// No sender, a bot, an edit, or our own message.
    Ignored,
    /// No tracked language is mentioned, or the message is not a job request.
    Untracked,
    Failed(String),
    /// The reply that was posted.
    Replied(String),
}

struct Completed {
    framework: FrameworkKind,
    report: LineCountReport,
    reply: String,
}

/// Run one chat event through the whole pipeline.
///
/// The event is recorded as seen before anything else happens, so a message
/// that always fails is not retried when redelivered.
pub async fn process_chat_event(ctx: &JobContext, event: &ChatEvent) -> Outcome {
    if !ctx.dedup.should_process(&event.event_id).await {
        tracing::debug!("Skipping duplicate event {}", event.event_id);
        return Outcome::Duplicate;
    }
    if event.from_bot
        || event.sender.is_none()
        || (ctx.bot_user_id.is_some() && event.sender == ctx.bot_user_id)
    {
        return Outcome::Ignored;
    }
    if !mentions_tracked_language(&event.text, &ctx.config.pipeline.tracked_languages) {
        tracing::debug!("Event {} mentions no tracked language", event.event_id);
        return Outcome::Untracked;
    }
    let span = tracing::info_span!("job", event_id = %event.event_id, client = field::Empty);
    process_tracked_event(ctx, event).instrument(span).await
}

async fn process_tracked_event(ctx: &JobContext, event: &ChatEvent) -> Outcome {
    let job = match parse_job(&event.text, &ctx.config.pipeline.sentinels) {
        Ok(job) => job,
        Err(e) if !has_job_fields(&event.text) => {
            tracing::debug!("Not a job message: {e}");
            return Outcome::Untracked;
        }
        Err(e) => {
            tracing::warn!("Rejected job message: {e}");
            let message = format!("Could not start the line count: {e}");
            notify_failure(ctx, event, &message).await;
            return Outcome::Failed(e.to_string());
        }
    };
    tracing::Span::current().record("client", job.client_id.as_str());
    tracing::info!(
        "Received job: repo={} language={} branch={} commit={} scope={}",
        job.repository_uri,
        job.language,
        job.branch.as_deref().unwrap_or("[default]"),
        job.revision.as_deref().unwrap_or("[tip]"),
        job.scope
    );
    ctx.store
        .put(JobRecord {
            descriptor: job.clone(),
            event_id: event.event_id.clone(),
            received_at: OffsetDateTime::now_utc(),
            status: JobStatus::Running,
        })
        .await;

    match run_job(ctx, &job).await {
        Ok(Completed { framework, report, reply }) => {
            let status = JobStatus::Completed {
                framework,
                files: report.totals.files,
                code: report.totals.code,
            };
            ctx.store.set_status(&job.client_id, &event.event_id, status).await;
            if let Err(e) = ctx.chat.post_reply(&event.channel, &event.event_id, &reply).await {
                tracing::error!("Failed to post reply: {e}");
                return Outcome::Failed(e.to_string());
            }
            tracing::info!("Replied with {} lines of code", report.totals.code);
            Outcome::Replied(reply)
        }
        Err(e) => {
            tracing::error!("Job failed: {e:?}");
            let error = format!("{e:#}");
            let status = JobStatus::Failed { error: error.clone() };
            ctx.store.set_status(&job.client_id, &event.event_id, status).await;
            let message = format!("Line count for {} failed: {error}", job.client_id);
            notify_failure(ctx, event, &message).await;
            Outcome::Failed(error)
        }
    }
}

async fn run_job(ctx: &JobContext, job: &JobDescriptor) -> Result<Completed> {
    let copy = ctx
        .materializer
        .materialize(job)
        .await
        .with_context(|| format!("Failed to fetch {}", job.repository_uri))?;
    tracing::info!("Checked out {} at {} in {}", copy.branch, copy.revision, copy.path.display());

    let framework = analyser_framework::detect(&copy.path).kind;
    let formatting = match ctx.formatter.format(&copy, framework).await {
        Ok(FormatOutcome::Formatted) => "applied".to_string(),
        Ok(FormatOutcome::Skipped(reason)) => {
            tracing::info!("Formatting skipped: {reason}");
            format!("skipped ({reason})")
        }
        Err(e) => {
            tracing::warn!("Formatting failed: {e}");
            "failed".to_string()
        }
    };

    let sentinels = &ctx.config.pipeline.sentinels;
    let request = CountRequest {
        policy_key: framework.as_str(),
        language: &job.language,
        scope: &job.scope,
        branch: job.branch.as_deref().unwrap_or(&sentinels.branch),
        revision: job.revision.as_deref().unwrap_or(&sentinels.revision),
    };
    let report = ctx.engine.count(&copy.path, request).await.context("Failed to count lines")?;
    let reply =
        format!("{}\nFramework: {framework}\nFormatting: {formatting}", report.render());
    Ok(Completed { framework, report, reply })
}

async fn notify_failure(ctx: &JobContext, event: &ChatEvent, message: &str) {
    if !ctx.config.pipeline.reply_on_failure {
        return;
    }
    if let Err(e) = ctx.chat.post_reply(&event.channel, &event.event_id, message).await {
        tracing::error!("Failed to post failure notice: {e}");
    }
}
