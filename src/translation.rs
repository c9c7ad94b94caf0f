use crate::error::{Error, Result};
use crate::ftl::{resource_path, ResourceFile};
use crate::metrics::RunMetrics;
use crate::openai::{CompletionRequest, CompletionService};
use crate::progress::ProgressReporter;
use crate::validator::TranslationValidator;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static CODE_FENCE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Outcome of a successful task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub file: String,
    pub language: String,
    pub keys_translated: usize,
    pub stale_keys_pruned: usize,
}

/// One (base file, target language) unit of work.
///
/// Owns the target path exclusively: no other task in a run writes it.
#[derive(Debug, Clone)]
pub struct TranslationTask {
    file_name: String,
    base_lang: String,
    base_path: PathBuf,
    language: String,
    target_path: PathBuf,
}

impl TranslationTask {
    pub fn new(root: &Path, base_lang: &str, file_name: &str, language: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            base_lang: base_lang.to_string(),
            base_path: resource_path(root, base_lang, file_name),
            language: language.to_string(),
            target_path: resource_path(root, language, file_name),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Translate, write the target file, and report the outcome.
    pub async fn execute(
        &self,
        service: &dyn CompletionService,
        reporter: &ProgressReporter,
        metrics: &RunMetrics,
    ) -> Result<TaskReport> {
        match self.translate(service, metrics).await {
            Ok(report) => {
                reporter.done(format!(
                    "Translated {} to {} ({} messages)",
                    self.file_name, self.language, report.keys_translated
                ));
                Ok(report)
            }
            Err(e) => {
                reporter.error(format!(
                    "Failed to translate {} to {}: {}",
                    self.file_name, self.language, e
                ));
                Err(e)
            }
        }
    }

    async fn translate(
        &self,
        service: &dyn CompletionService,
        metrics: &RunMetrics,
    ) -> Result<TaskReport> {
        let base = ResourceFile::load(&self.base_path, &self.base_lang)?;
        let existing = ResourceFile::load(&self.target_path, &self.language)?;

        let translated = if base.is_empty() {
            debug!("{} is empty, nothing to translate", self.base_path.display());
            ResourceFile::new(&self.file_name, &self.language)
        } else {
            let request = build_request(&base, &existing, &self.language);

            metrics.record_api_call();
            let completion = service
                .complete(&request)
                .await
                .and_then(|text| parse_completion(&text, &base, &self.language, &self.target_path));

            match completion {
                Ok(file) => file,
                Err(e) => {
                    metrics.record_api_failure();
                    return Err(e);
                }
            }
        };

        let validation = TranslationValidator::validate(&base, &translated);
        if validation.has_errors() {
            warn!(
                "Translation validation errors for {} ({}): {:?}",
                self.file_name, self.language, validation.errors
            );
        }
        if validation.has_warnings() {
            warn!(
                "Translation validation warnings for {} ({}): {:?}",
                self.file_name, self.language, validation.warnings
            );
        }

        let stale_keys_pruned = existing.keys().filter(|k| !base.contains_key(k)).count();
        if stale_keys_pruned > 0 {
            info!(
                "Pruned {} stale message(s) from {}",
                stale_keys_pruned,
                self.target_path.display()
            );
        }

        translated.write(&self.target_path)?;
        metrics.record_file_written(translated.len(), stale_keys_pruned);

        Ok(TaskReport {
            file: self.file_name.clone(),
            language: self.language.clone(),
            keys_translated: translated.len(),
            stale_keys_pruned,
        })
    }
}

/// Build the system prompt for translating into `target_language`
fn build_system_prompt(base_lang: &str, target_language: &str) -> String {
    format!(
        r#"You are a professional software localization translator. You translate Fluent (.ftl) localization files from {} to {}.

## Translation Rules

### DO NOT translate:
- Message identifiers (the text before `=`), including terms starting with `-`
- Variables (e.g., `{{ $name }}`, `{{ $count }}`)
- Message and term references (e.g., `{{ -brand-name }}`, `{{ other-message }}`)
- Function names (e.g., `NUMBER`, `DATETIME`)
- Attribute names (e.g., `.title`, `.placeholder`)
- Variant keys of select expressions (e.g., `[one]`, `*[other]`)

### DO translate:
- The text of every message, attribute and variant

### Output:
- Return every message of the source file, with the same identifiers, in the same order
- Keep the Fluent syntax valid: continuation lines stay indented
- Return only the Fluent file content, with no explanations and no code fences

### Tone:
- Keep the tone and register of the source
- Keep messages concise; they are shown in a user interface"#,
        base_lang, target_language
    )
}

/// Build the user prompt with the source file and any existing translation
fn build_user_prompt(base: &ResourceFile, existing: &ResourceFile, target_language: &str) -> String {
    let mut prompt = format!(
        "Please translate the following Fluent file from {} to {}:\n\n{}",
        base.language(),
        target_language,
        base.to_ftl_string()
    );

    if !existing.is_empty() {
        prompt.push_str(&format!(
            "\nExisting {} translation of this file. Use it as a reference for terminology and style, \
             and keep its wording where it still matches the source:\n\n{}",
            target_language,
            existing.to_ftl_string()
        ));
    }

    prompt
}

fn build_request(base: &ResourceFile, existing: &ResourceFile, target_language: &str) -> CompletionRequest {
    CompletionRequest {
        system_prompt: build_system_prompt(base.language(), target_language),
        user_prompt: build_user_prompt(base, existing, target_language),
    }
}

/// Remove a Markdown code fence wrapped around the whole completion
fn strip_code_fences(text: &str) -> &str {
    let regex = CODE_FENCE_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").expect("Invalid code fence regex")
    });

    match regex.captures(text).and_then(|cap| cap.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}

/// Turn the completion text into the target file.
///
/// The result holds exactly the base keys, in base order. A completion that
/// doesn't parse or misses base keys is a service error.
fn parse_completion(
    text: &str,
    base: &ResourceFile,
    language: &str,
    target_path: &Path,
) -> Result<ResourceFile> {
    let parsed = ResourceFile::parse(base.name(), language, strip_code_fences(text), target_path)
        .map_err(|e| Error::service(format!("completion is not valid Fluent: {}", e)))?;

    let missing: Vec<&str> = base.keys().filter(|k| !parsed.contains_key(k)).collect();
    if !missing.is_empty() {
        return Err(Error::service(format!(
            "completion is missing {} message(s): {}",
            missing.len(),
            missing.join(", ")
        )));
    }

    let unexpected: Vec<&str> = parsed.keys().filter(|k| !base.contains_key(k)).collect();
    if !unexpected.is_empty() {
        warn!(
            "Dropping {} unexpected message(s) from {} completion for {}: {}",
            unexpected.len(),
            language,
            base.name(),
            unexpected.join(", ")
        );
    }

    let mut merged = ResourceFile::new(base.name(), language);
    for key in base.keys() {
        if let Some(body) = parsed.get(key) {
            merged.insert(key, body);
        }
    }
    Ok(merged)
}
