/// Separator agents put between reasoning steps in their intermediate text
pub const STEP_SEPARATOR: &str = "|||---|||";

const PREVIEW_STEPS: usize = 3;
const PREVIEW_CHARS: usize = 200;

/// Split intermediate text into trimmed, non-empty steps
pub fn split_steps(intermediate: &str) -> Vec<&str> {
    intermediate
        .split(STEP_SEPARATOR)
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .collect()
}

/// The last few steps, cut to the final 200 characters with a leading `...` when longer
pub fn preview(intermediate: &str) -> String {
    let steps = split_steps(intermediate);
    let recent = &steps[steps.len().saturating_sub(PREVIEW_STEPS)..];
    let text = recent.join("\n");

    let chars = text.chars().count();
    if chars <= PREVIEW_CHARS {
        return text;
    }
    let tail: String = text.chars().skip(chars - PREVIEW_CHARS).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_steps() {
        let text = "  Searching the web |||---||| Reading sources|||---||||||---|||  Drafting  ";
        assert_eq!(
            split_steps(text),
            vec!["Searching the web", "Reading sources", "Drafting"]
        );
        assert!(split_steps("").is_empty());
    }

    #[test]
    fn test_preview_keeps_last_three_steps() {
        let text = ["one", "two", "three", "four"].join(STEP_SEPARATOR);
        assert_eq!(preview(&text), "two\nthree\nfour");
        assert_eq!(preview(""), "");
    }

    #[test]
    fn test_preview_truncates_from_the_front() {
        let long = "x".repeat(150);
        let text = format!("{long}{STEP_SEPARATOR}{}", "y".repeat(150));
        let preview = preview(&text);
        assert!(preview.starts_with("..."));
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with(&"y".repeat(150)));
    }
}
