//! Bounded memory block for system-prompt injection.

/// Usage hint placed ahead of the memory text.
pub const MEMORY_USAGE_HINT: &str = "Use `memory.save` to update long-term memory, \
`memory.daily` to append to daily notes, \
and `memory.recall` to search past memories.";

const TRUNCATION_MARKER: &str = "[memory truncated]";

/// Size limit for the rendered block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    pub max_chars: usize,
}

impl ContextBudget {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self { max_chars: 8_000 }
    }
}

/// Wrap memory context text with the usage hint, within `budget`.
///
/// Returns `None` for empty context. When the block would exceed the budget,
/// whole lines are dropped from the end and a marker line is appended.
pub fn render_memory_block(context: &str, budget: &ContextBudget) -> Option<String> {
    if context.trim().is_empty() {
        return None;
    }
    let block = format!("{MEMORY_USAGE_HINT}\n\n{context}");
    if block.chars().count() <= budget.max_chars {
        return Some(block);
    }

    let limit = budget
        .max_chars
        .saturating_sub(TRUNCATION_MARKER.chars().count() + 1);
    let mut kept = String::new();
    let mut used = 0;
    for line in block.lines() {
        let cost = line.chars().count() + 1;
        if used + cost > limit {
            break;
        }
        kept.push_str(line);
        kept.push('\n');
        used += cost;
    }
    kept.push_str(TRUNCATION_MARKER);
    Some(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_renders_nothing() {
        assert_eq!(render_memory_block("", &ContextBudget::default()), None);
        assert_eq!(render_memory_block(" \n", &ContextBudget::default()), None);
    }

    #[test]
    fn hint_precedes_context() {
        let block =
            render_memory_block("## Long-term Memory\nlikes tea", &ContextBudget::default())
                .unwrap();
        assert!(block.starts_with(MEMORY_USAGE_HINT));
        assert!(block.ends_with("likes tea"));
    }

    #[test]
    fn oversized_block_is_cut_on_line_boundary() {
        let context = (0..200)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let budget = ContextBudget::new(300);
        let block = render_memory_block(&context, &budget).unwrap();

        assert!(block.chars().count() <= 300);
        assert!(block.ends_with(TRUNCATION_MARKER));
        assert!(block.contains("line 0\n"));
        assert!(!block.contains("line 199"));
    }
}
