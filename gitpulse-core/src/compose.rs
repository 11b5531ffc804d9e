use crate::models::{ChangeKind, ChangeRecord};

/// Turns a batch of change records into a checkpoint message.
///
/// The pipeline only requires a pure `batch -> string` function; callers
/// supply their own implementation or use [`DefaultComposer`].
pub trait MessageComposer: Send + Sync {
    fn compose(&self, batch: &[ChangeRecord]) -> String;
}

impl<F> MessageComposer for F
where
    F: Fn(&[ChangeRecord]) -> String + Send + Sync,
{
    fn compose(&self, batch: &[ChangeRecord]) -> String {
        self(batch)
    }
}

/// Count-based subject with a per-file body for small batches.
///
/// - `gitpulse: +2 added, ~1 modified`
/// - body lines like `added src/main.rs` for batches of up to five
///   records.
#[derive(Debug, Clone, Default)]
pub struct DefaultComposer;

impl DefaultComposer {
    const MAX_DETAILED_CHANGES: usize = 5;
    const PREFIX: &'static str = "gitpulse:";

    fn subject(batch: &[ChangeRecord]) -> String {
        let added = batch.iter().filter(|r| r.kind == ChangeKind::Added).count();
        let modified = batch
            .iter()
            .filter(|r| r.kind == ChangeKind::Modified)
            .count();
        let deleted = batch
            .iter()
            .filter(|r| r.kind == ChangeKind::Deleted)
            .count();

        let mut parts = Vec::new();
        if added > 0 {
            parts.push(format!("+{added} added"));
        }
        if modified > 0 {
            parts.push(format!("~{modified} modified"));
        }
        if deleted > 0 {
            parts.push(format!("-{deleted} deleted"));
        }

        if parts.is_empty() {
            format!("{} no changes", Self::PREFIX)
        } else {
            format!("{} {}", Self::PREFIX, parts.join(", "))
        }
    }
}

impl MessageComposer for DefaultComposer {
    fn compose(&self, batch: &[ChangeRecord]) -> String {
        let subject = Self::subject(batch);
        if batch.is_empty() || batch.len() > Self::MAX_DETAILED_CHANGES {
            return subject;
        }

        let body: Vec<String> = batch
            .iter()
            .map(|r| format!("{} {}", r.kind.as_str(), r.path.display()))
            .collect();
        format!("{subject}\n\n{}", body.join("\n"))
    }
}
