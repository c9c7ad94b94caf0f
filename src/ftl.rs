//! Fluent (`.ftl`) resource files.
//!
//! Only the subset of the Fluent syntax needed to move messages around is
//! understood here: a message is a non-indented `key = value` line followed by
//! any number of indented continuation lines (multi-line text, attributes,
//! select variants). The body of each message is kept as opaque text.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// File extension of resource files
pub const FTL_EXTENSION: &str = "ftl";

/// Indentation used when writing multi-line bodies
const INDENT: &str = "    ";

static KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn key_regex() -> &'static Regex {
    KEY_REGEX.get_or_init(|| {
        Regex::new(r"^-?[A-Za-z][A-Za-z0-9_-]*$").expect("Invalid message key regex")
    })
}

/// A single message entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: String,
    pub body: String,
}

impl Message {
    pub fn new(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
        }
    }
}

/// One localization file: an ordered mapping from message key to body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    /// File name, identical across languages (e.g. `main.ftl`)
    name: String,
    /// Name of the language directory the file belongs to
    language: String,
    messages: IndexMap<String, String>,
}

impl ResourceFile {
    /// Create an empty file
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            messages: IndexMap::new(),
        }
    }

    pub fn from_messages(
        name: impl Into<String>,
        language: impl Into<String>,
        messages: impl IntoIterator<Item = Message>,
    ) -> Self {
        let mut file = Self::new(name, language);
        for message in messages {
            file.insert(message.key, message.body);
        }
        file
    }

    /// Parse FTL text. `path` is only used to label errors.
    pub fn parse(
        name: impl Into<String>,
        language: impl Into<String>,
        content: &str,
        path: &Path,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            language: language.into(),
            messages: parse_messages(content, path)?,
        })
    }

    /// Load the file at `path`.
    ///
    /// A file that does not exist yet yields an empty mapping; that is the
    /// normal case the first time a language is translated.
    pub fn load(path: &Path, language: impl Into<String>) -> Result<Self> {
        let name = file_name(path);

        if !path.exists() {
            debug!("{} does not exist yet, starting empty", path.display());
            return Ok(Self::new(name, language));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(name, language, &content, path)
    }

    /// Serialize to `path`, creating parent directories and overwriting any
    /// existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(path, self.to_ftl_string()).map_err(|e| Error::io(path, e))
    }

    /// Render the messages in insertion order
    pub fn to_ftl_string(&self) -> String {
        let mut out = String::new();
        for (key, body) in &self.messages {
            if needs_block_layout(body) {
                out.push_str(key);
                out.push_str(" =\n");
                for line in body.lines() {
                    if !line.is_empty() {
                        out.push_str(INDENT);
                        out.push_str(line);
                    }
                    out.push('\n');
                }
            } else {
                out.push_str(&format!("{} = {}\n", key, body));
            }
        }
        out
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Insert or replace a message. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, body: impl Into<String>) -> Option<String> {
        self.messages.insert(key.into(), body.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.messages.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    pub fn messages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.messages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Bodies that can't follow `key = ` on the same line: multi-line text, and
/// bodies opening with an attribute or a variant
fn needs_block_layout(body: &str) -> bool {
    body.contains('\n') || body.starts_with(['.', '[', '*'])
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path of `name` inside the `language` directory of `root`
pub fn resource_path(root: &Path, language: &str, name: &str) -> PathBuf {
    root.join(language).join(name)
}

struct PendingMessage<'a> {
    key: String,
    line: usize,
    inline: String,
    block: Vec<&'a str>,
}

/// Parse FTL text into an ordered key -> body map
pub fn parse_messages(content: &str, path: &Path) -> Result<IndexMap<String, String>> {
    let mut messages = IndexMap::new();
    let mut current: Option<PendingMessage> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();

        if line.is_empty() {
            if let Some(pending) = current.as_mut() {
                pending.block.push("");
            }
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            match current.as_mut() {
                Some(pending) => pending.block.push(line),
                None => {
                    return Err(Error::parse(
                        path,
                        line_no,
                        "indented line outside of a message",
                    ))
                }
            }
            continue;
        }

        finish_message(current.take(), &mut messages, path)?;

        // Comments also end the previous message
        if line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::parse(path, line_no, "expected `key = value`"));
        };
        let key = key.trim();

        if !key_regex().is_match(key) {
            return Err(Error::parse(
                path,
                line_no,
                format!("invalid message identifier `{}`", key),
            ));
        }
        if messages.contains_key(key) {
            return Err(Error::parse(
                path,
                line_no,
                format!("duplicate message `{}`", key),
            ));
        }

        current = Some(PendingMessage {
            key: key.to_string(),
            line: line_no,
            inline: value.trim().to_string(),
            block: Vec::new(),
        });
    }

    finish_message(current, &mut messages, path)?;
    Ok(messages)
}

fn finish_message(
    pending: Option<PendingMessage>,
    messages: &mut IndexMap<String, String>,
    path: &Path,
) -> Result<()> {
    let Some(mut pending) = pending else {
        return Ok(());
    };

    while pending.block.last().is_some_and(|l| l.is_empty()) {
        pending.block.pop();
    }

    // Only ASCII blanks count as indentation, so slicing stays on a char boundary
    let indent = pending
        .block
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    let mut lines: Vec<&str> = Vec::with_capacity(pending.block.len() + 1);
    if !pending.inline.is_empty() {
        lines.push(&pending.inline);
    }
    lines.extend(
        pending
            .block
            .iter()
            .map(|l| if l.is_empty() { "" } else { &l[indent..] }),
    );

    if lines.is_empty() {
        return Err(Error::parse(
            path,
            pending.line,
            format!("message `{}` has no value", pending.key),
        ));
    }

    messages.insert(pending.key, lines.join("\n"));
    Ok(())
}
