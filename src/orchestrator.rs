//! Builds the translation matrix and runs it.
//!
//! Every base file is paired with every target language, and each pair
//! becomes one [`TranslationTask`]. All tasks are spawned up front on a
//! `JoinSet`; when `max_concurrency` is set, a semaphore bounds how many of
//! them talk to the completion service at once. A failing task never stops
//! its siblings: its error is collected into the [`RunSummary`].

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ftl::FTL_EXTENSION;
use crate::metrics::RunMetrics;
use crate::openai::CompletionService;
use crate::progress::{format_list, ProgressReporter};
use crate::translation::{TaskReport, TranslationTask};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A task that did not produce a target file
#[derive(Debug)]
pub struct TaskFailure {
    pub file: String,
    pub language: String,
    pub error: Error,
}

/// Aggregate result of a run, sorted by (file, language)
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Number of tasks in the matrix
    pub tasks: usize,
    pub succeeded: Vec<TaskReport>,
    pub failures: Vec<TaskFailure>,
}

impl RunSummary {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// True when no task failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Orchestrator {
    config: Arc<Config>,
    service: Arc<dyn CompletionService>,
    reporter: Arc<ProgressReporter>,
    metrics: Arc<RunMetrics>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        service: Arc<dyn CompletionService>,
        reporter: Arc<ProgressReporter>,
    ) -> Self {
        Self {
            config,
            service,
            reporter,
            metrics: Arc::new(RunMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// One task per (base file, language) pair, files outermost
    pub fn build_tasks(&self, files: &[String], languages: &[String]) -> Vec<TranslationTask> {
        files
            .iter()
            .flat_map(|file| {
                languages.iter().map(move |language| {
                    TranslationTask::new(
                        &self.config.ftl_root_path,
                        &self.config.base_lang,
                        file,
                        language,
                    )
                })
            })
            .collect()
    }

    /// Discover, translate everything, and wait for every task to finish.
    ///
    /// Only configuration and discovery problems are returned as `Err`;
    /// task failures end up in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;

        let root = &self.config.ftl_root_path;
        let base_lang = &self.config.base_lang;

        self.reporter.start("Getting files to translate...");
        let files = discover_base_files(root, base_lang)?;
        self.reporter
            .done(format!("Files to translate:\n{}", format_list(&files)));

        self.reporter.start("Getting target languages...");
        let languages = discover_target_languages(root, base_lang)?;
        self.reporter
            .done(format!("Target languages:\n{}", format_list(&languages)));

        let tasks = self.build_tasks(&files, &languages);
        let total = tasks.len();
        if total == 0 {
            info!("Nothing to translate");
            return Ok(RunSummary::default());
        }

        info!(
            "Dispatching {} task(s) ({} file(s) x {} language(s))",
            total,
            files.len(),
            languages.len()
        );

        let limiter = self.config.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut set = JoinSet::new();

        for (index, task) in tasks.iter().enumerate() {
            self.reporter.batch(
                format!(
                    "Translating {} to {} in parallel...",
                    task.file_name(),
                    task.language()
                ),
                index + 1,
                total,
            );

            let task = task.clone();
            let service = Arc::clone(&self.service);
            let reporter = Arc::clone(&self.reporter);
            let metrics = Arc::clone(&self.metrics);
            let limiter = limiter.clone();

            set.spawn(async move {
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let result = task.execute(service.as_ref(), &reporter, &metrics).await;
                (index, result)
            });
        }

        let mut outcomes: Vec<Option<Result<TaskReport>>> = (0..total).map(|_| None).collect();
        let mut completed = 0;

        while let Some(joined) = set.join_next().await {
            completed += 1;
            match joined {
                Ok((index, result)) => outcomes[index] = Some(result),
                Err(e) => error!("Translation task did not complete: {}", e),
            }

            let noun = if completed > 1 { "files" } else { "file" };
            self.reporter.batch(
                format!("Translated {} {}...", completed, noun),
                completed,
                total,
            );
        }

        let mut summary = RunSummary {
            tasks: total,
            ..RunSummary::default()
        };

        for (task, outcome) in tasks.iter().zip(outcomes) {
            let result = outcome.unwrap_or_else(|| {
                self.reporter.error(format!(
                    "Translation of {} to {} was aborted",
                    task.file_name(),
                    task.language()
                ));
                Err(Error::Aborted(format!(
                    "task for {} ({}) panicked",
                    task.file_name(),
                    task.language()
                )))
            });

            match result {
                Ok(report) => summary.succeeded.push(report),
                Err(error) => {
                    warn!(
                        "Translation of {} to {} failed: {}",
                        task.file_name(),
                        task.language(),
                        error
                    );
                    summary.failures.push(TaskFailure {
                        file: task.file_name().to_string(),
                        language: task.language().to_string(),
                        error,
                    });
                }
            }
        }

        summary
            .succeeded
            .sort_by(|a, b| (&a.file, &a.language).cmp(&(&b.file, &b.language)));
        summary
            .failures
            .sort_by(|a, b| (&a.file, &a.language).cmp(&(&b.file, &b.language)));

        info!(
            "Run finished: {} succeeded, {} failed",
            summary.success_count(),
            summary.failure_count()
        );
        match serde_json::to_string(&self.metrics.report()) {
            Ok(json) => info!("Run metrics: {}", json),
            Err(e) => warn!("Failed to serialize run metrics: {}", e),
        }

        Ok(summary)
    }
}

/// Names of the `.ftl` files directly inside `root/base_lang`, sorted
pub fn discover_base_files(root: &Path, base_lang: &str) -> Result<Vec<String>> {
    let base_dir = root.join(base_lang);
    let entries = fs::read_dir(&base_dir).map_err(|e| Error::io(&base_dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(&base_dir, e))?.path();
        let is_ftl = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(FTL_EXTENSION));
        if path.is_file() && is_ftl {
            if let Some(name) = path.file_name() {
                files.push(name.to_string_lossy().into_owned());
            }
        } else {
            debug!("Skipping {}: not a top-level .ftl file", path.display());
        }
    }

    files.sort();
    Ok(files)
}

/// Every non-hidden directory of `root` except the base language, sorted
pub fn discover_target_languages(root: &Path, base_lang: &str) -> Result<Vec<String>> {
    let entries = fs::read_dir(root).map_err(|e| Error::io(root, e))?;

    let mut languages = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(root, e))?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name != base_lang && !name.starts_with('.') {
            languages.push(name);
        }
    }

    languages.sort();
    Ok(languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::CompletionRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    // ==================== Helpers ====================

    /// Echoes the base file back, prefixing each body with the language
    struct EchoService {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl EchoService {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    fn target_language(request: &CompletionRequest) -> String {
        request
            .user_prompt
            .lines()
            .next()
            .and_then(|line| line.trim_end_matches(':').rsplit(' ').next())
            .unwrap_or_default()
            .to_string()
    }

    fn source_block(request: &CompletionRequest) -> Vec<(String, String)> {
        request
            .user_prompt
            .split("\n\n")
            .nth(1)
            .unwrap_or_default()
            .lines()
            .filter_map(|line| line.split_once(" = "))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[async_trait]
    impl CompletionService for EchoService {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let language = target_language(request);
            Ok(source_block(request)
                .into_iter()
                .map(|(k, v)| format!("{} = [{}] {}\n", k, language, v))
                .collect())
        }
    }

    fn project(base_files: &[(&str, &str)], languages: &[&str]) -> TempDir {
        let dir = tempdir().expect("tempdir");
        let base_dir = dir.path().join("en");
        fs::create_dir_all(&base_dir).expect("mkdir");
        for (name, content) in base_files {
            fs::write(base_dir.join(name), content).expect("write");
        }
        for language in languages {
            fs::create_dir_all(dir.path().join(language)).expect("mkdir");
        }
        dir
    }

    fn orchestrator(root: &Path, service: Arc<dyn CompletionService>) -> Orchestrator {
        let config = Config::new("test-key", "en", "gpt-4o-mini", root);
        let (reporter, _output) = ProgressReporter::capture();
        Orchestrator::new(Arc::new(config), service, Arc::new(reporter))
    }

    // ==================== Discovery Tests ====================

    #[test]
    fn test_discover_base_files_only_ftl_sorted() {
        let dir = project(&[("zeta.ftl", "a = A\n"), ("alpha.ftl", "b = B\n"), ("notes.txt", "x")], &[]);
        fs::create_dir_all(dir.path().join("en").join("nested.ftl")).expect("mkdir");
        fs::create_dir_all(dir.path().join("en").join("app")).expect("mkdir");
        fs::write(dir.path().join("en").join("app").join("main.ftl"), "c = C\n").expect("write");

        let files = discover_base_files(dir.path(), "en").expect("Should discover");
        assert_eq!(files, vec!["alpha.ftl", "zeta.ftl"]);
    }

    #[test]
    fn test_discover_base_files_missing_base_dir() {
        let dir = tempdir().expect("tempdir");
        let err = discover_base_files(dir.path(), "en").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_discover_target_languages_excludes_base_hidden_and_files() {
        let dir = project(&[("main.ftl", "a = A\n")], &["fr", "de", ".git"]);
        fs::write(dir.path().join("README.md"), "docs").expect("write");

        let languages = discover_target_languages(dir.path(), "en").expect("Should discover");
        assert_eq!(languages, vec!["de", "fr"]);
    }

    #[test]
    fn test_build_tasks_is_cartesian_product() {
        let dir = tempdir().expect("tempdir");
        let orchestrator = orchestrator(dir.path(), Arc::new(EchoService::new()));

        let files = vec!["a.ftl".to_string(), "b.ftl".to_string()];
        let languages = vec!["de".to_string(), "fr".to_string(), "ja".to_string()];
        let tasks = orchestrator.build_tasks(&files, &languages);

        assert_eq!(tasks.len(), 6);
        let pairs: Vec<(&str, &str)> = tasks.iter().map(|t| (t.file_name(), t.language())).collect();
        assert_eq!(pairs[0], ("a.ftl", "de"));
        assert_eq!(pairs[5], ("b.ftl", "ja"));
        assert_eq!(tasks[4].target_path(), dir.path().join("fr").join("b.ftl"));
    }

    // ==================== run() Tests ====================

    #[tokio::test]
    async fn test_run_translates_every_pair() {
        let dir = project(
            &[("a.ftl", "hello = Hello\n"), ("b.ftl", "bye = Bye\n")],
            &["de", "fr", "ja"],
        );
        let service = Arc::new(EchoService::new());
        let orchestrator = orchestrator(dir.path(), service.clone());

        let summary = orchestrator.run().await.expect("Should run");

        assert_eq!(summary.tasks, 6);
        assert_eq!(summary.success_count(), 6);
        assert!(summary.is_success());
        assert_eq!(service.calls.load(Ordering::SeqCst), 6);
        assert_eq!(
            fs::read_to_string(dir.path().join("ja").join("b.ftl")).expect("read"),
            "bye = [ja] Bye\n"
        );
        assert_eq!(orchestrator.metrics().files_written(), 6);
    }

    #[tokio::test]
    async fn test_run_launches_all_tasks_at_once_by_default() {
        let files: Vec<(String, String)> = (0..4)
            .map(|i| (format!("f{}.ftl", i), format!("k{} = V\n", i)))
            .collect();
        let file_refs: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
        let dir = project(&file_refs, &["de", "fr"]);
        let service = Arc::new(EchoService::new());

        orchestrator(dir.path(), service.clone())
            .run()
            .await
            .expect("Should run");

        assert_eq!(service.peak.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_run_respects_max_concurrency() {
        let files: Vec<(String, String)> = (0..5)
            .map(|i| (format!("f{}.ftl", i), format!("k{} = V\n", i)))
            .collect();
        let file_refs: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
        let dir = project(&file_refs, &["de", "fr"]);
        let service = Arc::new(EchoService::new());

        let mut config = Config::new("test-key", "en", "gpt-4o-mini", dir.path());
        config.max_concurrency = Some(2);
        let (reporter, _output) = ProgressReporter::capture();
        let orchestrator = Orchestrator::new(Arc::new(config), service.clone(), Arc::new(reporter));

        let summary = orchestrator.run().await.expect("Should run");

        assert_eq!(summary.success_count(), 10);
        assert!(service.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_run_with_only_base_language() {
        let dir = project(&[("main.ftl", "hello = Hello\n")], &[]);
        let service = Arc::new(EchoService::new());

        let summary = orchestrator(dir.path(), service.clone())
            .run()
            .await
            .expect("Should run");

        assert_eq!(summary.tasks, 0);
        assert_eq!(summary.success_count(), 0);
        assert!(summary.failures.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_with_no_base_files() {
        let dir = project(&[], &["fr"]);

        let summary = orchestrator(dir.path(), Arc::new(EchoService::new()))
            .run()
            .await
            .expect("Should run");

        assert_eq!(summary.tasks, 0);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_run_reports_one_completion_per_task() {
        let dir = project(&[("a.ftl", "a = A\n"), ("b.ftl", "b = B\n")], &["de", "fr"]);
        let config = Config::new("test-key", "en", "gpt-4o-mini", dir.path());
        let (reporter, output) = ProgressReporter::capture();
        let orchestrator = Orchestrator::new(
            Arc::new(config),
            Arc::new(EchoService::new()),
            Arc::new(reporter),
        );

        orchestrator.run().await.expect("Should run");

        let lines = output.lines();
        let launched = lines.iter().filter(|l| l.contains("in parallel...")).count();
        let completed: Vec<&String> = lines.iter().filter(|l| l.contains("] Translated ")).collect();
        let done = lines.iter().filter(|l| l.starts_with("✓ Translated ")).count();

        assert_eq!(launched, 4);
        assert_eq!(completed.len(), 4);
        assert_eq!(done, 4);
        assert_eq!(completed.last().map(|s| s.as_str()), Some("[4/4] Translated 4 files..."));
    }

    #[tokio::test]
    async fn test_run_rejects_incomplete_config() {
        let dir = project(&[("main.ftl", "hello = Hello\n")], &["fr"]);
        let config = Config::new("", "en", "gpt-4o-mini", dir.path());
        let (reporter, output) = ProgressReporter::capture();
        let service = Arc::new(EchoService::new());
        let orchestrator = Orchestrator::new(Arc::new(config), service.clone(), Arc::new(reporter));

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(output.lines().is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_missing_root_is_io_error() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("does-not-exist");

        let err = orchestrator(&missing, Arc::new(EchoService::new()))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn test_run_records_panicked_task_as_failure() {
        struct PanickingService;

        #[async_trait]
        impl CompletionService for PanickingService {
            async fn complete(&self, request: &CompletionRequest) -> Result<String> {
                if target_language(request) == "fr" {
                    panic!("service exploded");
                }
                Ok("hello = Hallo\n".to_string())
            }
        }

        let dir = project(&[("main.ftl", "hello = Hello\n")], &["de", "fr"]);
        let summary = orchestrator(dir.path(), Arc::new(PanickingService))
            .run()
            .await
            .expect("Should run");

        assert_eq!(summary.success_count(), 1);
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.failures[0].language, "fr");
        assert!(matches!(summary.failures[0].error, Error::Aborted(_)));
    }
}
