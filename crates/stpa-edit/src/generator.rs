//! Text-generation collaborator boundary
//!
//! The external generator is fallible, slow and makes no structural promises;
//! all structure is imposed here, by normalizing its raw output into
//! candidate lines and by the bounded generate/validate/retry loop.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Failure of the external text-generation service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    /// The backend cannot be reached.
    #[error("text generation backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with an error.
    #[error("text generation failed: {0}")]
    Backend(String),
}

/// The external text-generation collaborator.
///
/// Implementations wrap whatever chat-completion service the host provides.
/// The engine awaits calls sequentially and never fires concurrent requests
/// for the same instruction.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce raw text for a prompt. No structural guarantees.
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("bullet regex"));

/// Normalize raw generator output into candidate lines: code fences, bullet
/// decorations, markdown headings, blank lines and wrapping quotes go away.
#[must_use]
pub fn candidate_lines(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let without_bullet = BULLET_RE.replace(trimmed, "");
        let mut cleaned = without_bullet.trim().to_string();
        if cleaned.len() >= 2 && cleaned.starts_with('"') && cleaned.ends_with('"') {
            cleaned = cleaned[1..cleaned.len() - 1].trim().to_string();
        }
        // Prose preambles ("Here are the hazards:") end with a colon; entry
        // lines never do.
        if !cleaned.is_empty() && !cleaned.ends_with(':') {
            out.push(cleaned);
        }
    }
    out
}

/// Error of the bounded generation loop.
#[derive(Debug, thiserror::Error)]
pub enum GenerateLoopError {
    /// The backend itself failed; retrying validation is pointless.
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// Every attempt failed validation. The raw output of the last attempt
    /// is preserved so the caller can surface a precise error.
    #[error("{reason}")]
    Rejected {
        /// Why the last candidate batch was rejected
        reason: String,
        /// Raw output of the last attempt
        raw: String,
    },
}

/// Generate-and-validate with a bounded retry.
///
/// The first attempt uses `prompt` as-is; each retry appends the stricter
/// reminder. `validate` may transform the candidate lines (e.g. assign IDs)
/// and returns a rejection reason otherwise. The document is never touched
/// here; callers only mutate after this returns `Ok`.
pub async fn generate_validated<G, F>(
    generator: &G,
    prompt: &str,
    stricter_reminder: &str,
    attempts: usize,
    mut validate: F,
) -> Result<Vec<String>, GenerateLoopError>
where
    G: TextGenerator + ?Sized,
    F: FnMut(&[String]) -> Result<Vec<String>, String>,
{
    let attempts = attempts.max(1);
    let mut last_raw = String::new();
    let mut last_reason = String::new();
    for attempt in 0..attempts {
        let full_prompt = if attempt == 0 {
            prompt.to_string()
        } else {
            format!("{prompt}\n\n{stricter_reminder}")
        };
        let raw = generator.generate(&full_prompt).await?;
        let candidates = candidate_lines(&raw);
        match validate(&candidates) {
            Ok(lines) => return Ok(lines),
            Err(reason) => {
                tracing::warn!(attempt, %reason, "generated content rejected");
                last_raw = raw;
                last_reason = reason;
            }
        }
    }
    Err(GenerateLoopError::Rejected {
        reason: last_reason,
        raw: last_raw,
    })
}
