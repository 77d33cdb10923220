//! Narrow content sanitizer satisfying the contract normalization relies on.
//! Content-moderation rules are an external collaborator's concern and are
//! out of scope here; this only strips control characters that have no
//! business in a chat message.

pub struct SanitizeResult {
    pub text: String,
    pub warnings: Vec<String>,
}

pub struct StringSanitizer;

impl StringSanitizer {
    pub fn new() -> Self {
        Self
    }

    pub fn sanitize(&self, input: &str) -> SanitizeResult {
        let mut warnings = Vec::new();
        let cleaned: String = input
            .chars()
            .filter(|c| {
                let keep = *c == '\n' || *c == '\t' || !c.is_control();
                if !keep {
                    warnings.push(format!("stripped control character {:?}", c));
                }
                keep
            })
            .collect();

        SanitizeResult {
            text: cleaned,
            warnings,
        }
    }
}

impl Default for StringSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
