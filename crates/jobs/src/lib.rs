pub mod dedup;
pub mod pipeline;
pub mod store;

use std::sync::Arc;

use analyser_cloc::{Cloc, PolicyEngine, PolicyTable};
use analyser_core::{config::Config, models::ChatEvent};
use analyser_framework::{Formatter, ToolchainFormatter};
use analyser_git::{GitMaterializer, Materializer};
use analyser_slack::ChatClient;
pub use dedup::Deduplicator;
pub use pipeline::{Outcome, process_chat_event};
pub use store::{InMemoryJobStore, JobRecord, JobStatus, JobStore};
use tokio::sync::Semaphore;

/// Shared context available to every pipeline run.
#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<Config>,
    pub materializer: Arc<dyn Materializer>,
    pub formatter: Arc<dyn Formatter>,
    pub engine: Arc<PolicyEngine>,
    pub chat: Arc<dyn ChatClient>,
    pub store: Arc<dyn JobStore>,
    pub dedup: Arc<Deduplicator>,
    /// Messages from this user are never treated as jobs.
    pub bot_user_id: Option<String>,
}

impl JobContext {
    /// Wire the git, toolchain and cloc collaborators from configuration.
    pub fn new(
        config: Arc<Config>,
        chat: Arc<dyn ChatClient>,
        bot_user_id: Option<String>,
    ) -> Self {
        let engine = PolicyEngine::new(
            PolicyTable::new(config.cloc.policies.clone()),
            Arc::new(Cloc::new(&config.cloc)),
        );
        Self {
            materializer: Arc::new(GitMaterializer::new(config.git.clone())),
            formatter: Arc::new(ToolchainFormatter::new(config.formatter.clone())),
            engine: Arc::new(engine),
            chat,
            store: Arc::new(InMemoryJobStore::new(config.worker.registry_capacity)),
            dedup: Arc::new(Deduplicator::new(
                config.worker.dedup_capacity,
                config.worker.dedup_ttl(),
            )),
            bot_user_id,
            config,
        }
    }
}

/// Runs pipelines in the background, at most `worker.concurrency` at a time.
#[derive(Clone)]
pub struct JobRunner {
    context: JobContext,
    permits: Arc<Semaphore>,
    concurrency: u32,
}

impl JobRunner {
    pub fn new(context: JobContext) -> Self {
        let concurrency = context.config.worker.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            context,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency: concurrency as u32,
        }
    }

    pub fn context(&self) -> &JobContext { &self.context }

    /// Queue an event and return immediately.
    pub fn submit(&self, event: ChatEvent) {
        let context = self.context.clone();
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!("Dropping event {} received during shutdown", event.event_id);
                return;
            };
            process_chat_event(&context, &event).await;
        });
    }

    /// Wait for running and queued pipelines, then refuse new ones.
    pub async fn shutdown(&self) {
        tracing::info!("Waiting for running jobs");
        match self.permits.acquire_many(self.concurrency).await {
            Ok(permits) => {
                self.permits.close();
                drop(permits);
            }
            Err(_) => tracing::debug!("Job runner already shut down"),
        }
        tracing::info!("Job runner stopped");
    }
}


#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use super::{testing::*, *};

    const MESSAGE: &str = concat!(
        "*Repo:* git@example.com:org/repo.git\n",
        "*Client:* acme\n",
        "*Language:* solidity\n",
        "*Scope:* all"
    );

    fn fixture(root: &Path) {
        write_files(root, &[
            ("foundry.toml", "[profile.default]\n"),
            ("src/Vault.sol", "contract Vault {\n    uint256 total;\n}\n"),
            ("src/Token.sol", "contract Token {\n}\n"),
            ("src/access/Owned.sol", "contract Owned {\n    address owner;\n    uint x;\n}\n"),
            ("src/mocks/MockToken.sol", "contract MockToken {}\n"),
            ("lib/forge-std/Test.sol", "contract Test {}\n"),
        ]);
    }

    #[tokio::test]
    async fn end_to_end_counts_and_replies() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let materializer = Arc::new(FakeMaterializer::new(dir.path()));
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(materializer.clone(), FakeFormatter { fail: false }, chat.clone());

        let outcome = process_chat_event(&ctx, &event("1700000000.000100", MESSAGE)).await;
        let Outcome::Replied(reply) = outcome else {
            panic!("expected a reply, got {outcome:?}");
        };
        assert!(reply.contains("SUM: 0 0 9"), "{reply}");
        assert!(reply.contains("Branch: main\nCommit: latest"), "{reply}");
        assert!(reply.ends_with("Framework: Foundry\nFormatting: applied"), "{reply}");
        assert_eq!(materializer.calls(), 1);

        let replies = chat.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!((replies[0].0.as_str(), replies[0].1.as_str()), ("C123", "1700000000.000100"));

        let record = ctx.store.get("acme").await.unwrap();
        assert_eq!(record.status, JobStatus::Completed {
            framework: analyser_core::models::FrameworkKind::Foundry,
            files: 3,
            code: 9,
        });
    }

    #[tokio::test]
    async fn missing_required_field_never_clones() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = Arc::new(FakeMaterializer::new(dir.path()));
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(materializer.clone(), FakeFormatter { fail: false }, chat.clone());

        for (id, text) in [
            ("1", "*Client:* acme\n*Language:* solidity"),
            ("2", "*Repo:* git@example.com:org/repo.git\n*Language:* solidity"),
            ("3", "*Repo:* git@example.com:org/repo.git\n*Client:* acme\nsolidity"),
        ] {
            let outcome = process_chat_event(&ctx, &event(id, text)).await;
            assert!(matches!(outcome, Outcome::Failed(_)), "{text}");
        }
        assert_eq!(materializer.calls(), 0);
        assert!(chat.texts().iter().all(|t| t.contains("missing required field")));
    }

    #[tokio::test]
    async fn chatter_with_a_language_keyword_gets_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = Arc::new(FakeMaterializer::new(dir.path()));
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(materializer.clone(), FakeFormatter { fail: false }, chat.clone());

        for (id, text) in [
            ("1", "I don't trust this *deadline:* friday"),
            ("2", "frustrated with the solidity compiler"),
        ] {
            assert_eq!(process_chat_event(&ctx, &event(id, text)).await, Outcome::Untracked);
        }
        assert!(chat.texts().is_empty());
        assert_eq!(materializer.calls(), 0);
    }

    #[tokio::test]
    async fn duplicates_and_foreign_messages_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let materializer = Arc::new(FakeMaterializer::new(dir.path()));
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(materializer.clone(), FakeFormatter { fail: false }, chat.clone());

        let first = process_chat_event(&ctx, &event("1", MESSAGE)).await;
        assert!(matches!(first, Outcome::Replied(_)));
        assert_eq!(process_chat_event(&ctx, &event("1", MESSAGE)).await, Outcome::Duplicate);

        let mut bot = event("2", MESSAGE);
        bot.from_bot = true;
        assert_eq!(process_chat_event(&ctx, &bot).await, Outcome::Ignored);
        let mut own = event("3", MESSAGE);
        own.sender = Some("UBOT".to_string());
        assert_eq!(process_chat_event(&ctx, &own).await, Outcome::Ignored);
        let mut anonymous = event("4", MESSAGE);
        anonymous.sender = None;
        assert_eq!(process_chat_event(&ctx, &anonymous).await, Outcome::Ignored);

        let python = MESSAGE.replace("solidity", "python");
        assert_eq!(process_chat_event(&ctx, &event("5", &python)).await, Outcome::Untracked);

        assert_eq!(materializer.calls(), 1);
        assert_eq!(chat.texts().len(), 1);
    }

    #[tokio::test]
    async fn format_failure_still_counts() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let materializer = Arc::new(FakeMaterializer::new(dir.path()));
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(materializer, FakeFormatter { fail: true }, chat);

        let outcome = process_chat_event(&ctx, &event("1", MESSAGE)).await;
        let Outcome::Replied(reply) = outcome else {
            panic!("expected a reply, got {outcome:?}");
        };
        assert!(reply.contains("SUM: 0 0 9"));
        assert!(reply.ends_with("Formatting: failed"));
    }

    #[tokio::test]
    async fn fatal_errors_post_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let mut materializer = FakeMaterializer::new(dir.path());
        materializer.fail = true;
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(Arc::new(materializer), FakeFormatter { fail: false }, chat.clone());

        let outcome = process_chat_event(&ctx, &event("1", MESSAGE)).await;
        assert!(matches!(&outcome, Outcome::Failed(e) if e.contains("Permission denied")));
        let texts = chat.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Line count for acme failed"));
        assert!(!texts[0].contains("SUM"));
        assert!(matches!(ctx.store.get("acme").await.unwrap().status, JobStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn rust_has_no_policy() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let materializer = Arc::new(FakeMaterializer::new(dir.path()));
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(materializer, FakeFormatter { fail: false }, chat);

        let message = MESSAGE.replace("solidity", "rust");
        let outcome = process_chat_event(&ctx, &event("1", &message)).await;
        assert!(matches!(&outcome, Outcome::Failed(e) if e.contains("counts solidity, not rust")));
    }

    #[tokio::test]
    async fn runner_processes_submitted_events() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let materializer = Arc::new(FakeMaterializer::new(dir.path()));
        let chat = Arc::new(RecordingChat::default());
        let ctx = context(materializer.clone(), FakeFormatter { fail: false }, chat.clone());
        let runner = JobRunner::new(ctx);

        for _ in 0..3 {
            runner.submit(event("1", MESSAGE));
        }
        runner.submit(event("2", &MESSAGE.replace("acme", "globex")));
        tokio::time::timeout(Duration::from_secs(10), async {
            while chat.texts().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        runner.shutdown().await;
        assert_eq!(materializer.calls(), 2);
        assert!(runner.context().store.get("globex").await.is_some());
    }
}
