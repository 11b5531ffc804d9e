use std::path::{Path, PathBuf};

/// Configuration for [`ChangeClassifier`].
///
/// All paths are injected explicitly; the classifier never consults the
/// environment.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Glob-style patterns evaluated against the path relative to the
    /// project root. `*` matches within a segment, `**` across segments.
    pub exclude_patterns: Vec<String>,
    /// Extensions (without the dot) the tracker is interested in.
    pub allowed_extensions: Vec<String>,
    /// Absolute path of the checkpoint repository itself. Events under it
    /// are always rejected to prevent self-tracking feedback loops.
    pub bookkeeping_dir: PathBuf,
}

impl ClassifierConfig {
    pub fn new(bookkeeping_dir: PathBuf) -> Self {
        Self {
            exclude_patterns: vec![
                ".git/**".to_string(),
                "target/**".to_string(),
                "node_modules/**".to_string(),
            ],
            allowed_extensions: vec![
                "rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "c", "h", "cpp", "hpp",
                "md", "toml", "yaml", "yml", "json", "html", "css", "sh",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            bookkeeping_dir,
        }
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_allowed_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions;
        self
    }
}

/// Pure accept/reject decision for filesystem events.
///
/// Rules are evaluated in order, first match wins:
/// 1. reject inside the bookkeeping directory,
/// 2. reject on any exclude pattern,
/// 3. reject unknown extensions,
/// 4. accept.
///
/// No interior mutability; safe to share across event threads.
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    config: ClassifierConfig,
}

impl ChangeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Decide whether an event for `path` (relative to the project root)
    /// should be tracked. Absolute paths are checked against the
    /// bookkeeping directory before being relativized by the caller.
    pub fn classify(&self, path: &Path) -> bool {
        if path.starts_with(&self.config.bookkeeping_dir) {
            return false;
        }

        let path_str = path.to_string_lossy();
        for pattern in &self.config.exclude_patterns {
            if glob_match(pattern, &path_str) {
                return false;
            }
        }

        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => return false,
        };

        self.config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed == ext)
    }
}

/// Segment-wise glob matching: `*` matches any run of characters within a
/// path segment, `**` matches zero or more whole segments, `?` matches a
/// single character.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern_segs: Vec<&str> = pattern.split('/').collect();
    let path_segs: Vec<&str> = path.split('/').collect();
    match_segments(&pattern_segs, &path_segs)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            // `**` may swallow zero or more leading segments.
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((first, rest)) => match path.split_first() {
            Some((seg, path_rest)) => {
                match_segment(first, seg) && match_segments(rest, path_rest)
            }
            None => false,
        },
    }
}

fn match_segment(pattern: &str, segment: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = segment.chars().collect();
    match_chars(&p, &s)
}

fn match_chars(pattern: &[char], segment: &[char]) -> bool {
    match pattern.split_first() {
        None => segment.is_empty(),
        Some(('*', rest)) => {
            (0..=segment.len()).any(|skip| match_chars(rest, &segment[skip..]))
        }
        Some(('?', rest)) => match segment.split_first() {
            Some((_, seg_rest)) => match_chars(rest, seg_rest),
            None => false,
        },
        Some((c, rest)) => match segment.split_first() {
            Some((sc, seg_rest)) => c == sc && match_chars(rest, seg_rest),
            None => false,
        },
    }
}
