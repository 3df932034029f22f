//! Strip the decoration Wikipedia wraps around its formulas before parsing.

use std::sync::OnceLock;

use regex::Regex;

const DISPLAY_PREFIX: &str = "{\\displaystyle";

struct Patterns {
    trailing_period: Regex,
    escaped_brace: Regex,
    tilde: Regex,
    font_wrapper: Regex,
    spacing: Regex,
    environment: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        trailing_period: Regex::new(r"\.(\s+|$)").expect("valid regex"),
        escaped_brace: Regex::new(r"\\[{}]").expect("valid regex"),
        tilde: Regex::new(r"\\(tilde|widetilde)\b").expect("valid regex"),
        font_wrapper: Regex::new(
            r"\\(?:mathrm|mathcal|mathit|mathsf|mathbb|mathbf|boldsymbol|rm|bf)\s*\{([^{}]*)\}",
        )
        .expect("valid regex"),
        spacing: Regex::new(r"\\(?:quad|qquad|displaystyle|textstyle|[,;:!>])|~|&")
            .expect("valid regex"),
        environment: Regex::new(r"\\(?:begin|end)\{[a-z*]+\}").expect("valid regex"),
    })
}

/// Remove the `{\displaystyle ...}` wrapper: the prefix and its closing brace.
pub fn strip_display(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed.strip_prefix(DISPLAY_PREFIX) {
        Some(inner) => inner
            .trim_end()
            .strip_suffix('}')
            .unwrap_or(inner)
            .trim()
            .to_string(),
        None => trimmed.to_string(),
    }
}

/// Drop every brace pair whose only content is another brace group:
/// `{{x}}` → `{x}`. Unbalanced braces are left alone.
fn collapse_nested_groups(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut partner: Vec<Option<usize>> = vec![None; chars.len()];
    let mut stack = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' => stack.push(i),
            '}' => {
                if let Some(open) = stack.pop() {
                    partner[open] = Some(i);
                    partner[i] = Some(open);
                }
            }
            _ => {}
        }
    }

    let mut drop = vec![false; chars.len()];
    for (open, &c) in chars.iter().enumerate() {
        if c != '{' {
            continue;
        }
        let Some(close) = partner[open] else {
            continue;
        };
        let first = (open + 1..close).find(|&j| !chars[j].is_whitespace());
        let last = (open + 1..close).rev().find(|&j| !chars[j].is_whitespace());
        if let (Some(a), Some(b)) = (first, last) {
            if chars[a] == '{' && partner[a] == Some(b) {
                drop[open] = true;
                drop[close] = true;
            }
        }
    }

    chars
        .iter()
        .zip(&drop)
        .filter(|(_, d)| !**d)
        .map(|(&c, _)| c)
        .collect()
}

/// The regex pass that turns Wikipedia-flavoured LaTeX into something the
/// grammar accepts. Lossy: fonts, accents and spacing carry no structure.
pub fn strip_decoration(s: &str) -> String {
    let p = patterns();
    let s = s.replace("\\ell", "l");
    let s = p.environment.replace_all(&s, " ");
    let s = p.trailing_period.replace_all(&s, " ");
    let s = p.escaped_brace.replace_all(&s, " ");
    let s = p.tilde.replace_all(&s, "");
    let s = p.spacing.replace_all(&s, " ");
    let mut s = s.into_owned();
    // Fonts nest (`\mathrm{\mathbf{x}}`), unwrap until nothing changes.
    loop {
        let unwrapped = p.font_wrapper.replace_all(&s, "{$1}");
        let next = collapse_nested_groups(&unwrapped);
        if next == s {
            break;
        }
        s = next;
    }
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn clean(s: &str) -> String {
    strip_decoration(&strip_display(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_display() {
        assert_eq!(strip_display("{\\displaystyle E=mc^{2}}"), "E=mc^{2}");
        assert_eq!(strip_display("  {\\displaystyle x }  "), "x");
        assert_eq!(strip_display("a+b"), "a+b");
    }

    #[test]
    fn test_trailing_period_removed() {
        assert_eq!(strip_decoration("F=ma."), "F=ma");
        assert_eq!(strip_decoration("x=1. "), "x=1");
        // decimals survive
        assert_eq!(strip_decoration("g=9.81"), "g=9.81");
    }

    #[test]
    fn test_font_wrappers_unwrapped() {
        assert_eq!(strip_decoration("\\mathrm{d}x"), "{d}x");
        assert_eq!(strip_decoration("\\mathcal {L}"), "{L}");
        assert_eq!(strip_decoration("\\mathbf{\\mathrm{v}}"), "{v}");
    }

    #[test]
    fn test_doubled_braces_collapse() {
        assert_eq!(strip_decoration("{{\\frac {a}{b}}}"), "{\\frac {a}{b}}");
        assert_eq!(strip_decoration("{ {x} }"), "{x}");
        assert_eq!(strip_decoration("x^{{{2}}}"), "x^{2}");
        // siblings are not nested
        assert_eq!(strip_decoration("{{a}{b}}"), "{{a}{b}}");
    }

    #[test]
    fn test_spacing_and_alignment_dropped() {
        assert_eq!(strip_decoration("a\\,b\\quad c"), "a b c");
        assert_eq!(
            strip_decoration("\\begin{aligned}x&=1\\end{aligned}"),
            "x =1"
        );
    }

    #[test]
    fn test_ell_and_tilde() {
        assert_eq!(strip_decoration("\\ell+\\tilde{x}"), "l+{x}");
    }

    #[test]
    fn test_clean_combines_both() {
        assert_eq!(
            clean("{\\displaystyle \\mathrm {F} =m\\mathbf {a} .}"),
            "{F} =m{a}"
        );
    }
}
