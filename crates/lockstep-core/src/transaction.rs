use std::fmt::{self, Write as _};

use rand::Rng;

use crate::diag::Tag;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RandomizeError {
    #[error("no value of '{field}' satisfies its constraints: {reason}")]
    Unsatisfiable { field: String, reason: String },

    #[error("stimulus exhausted after {produced} items")]
    Exhausted { produced: u64 },
}

/// One stimulus/response record exchanged between the agents.
///
/// Fields split into inputs (set by `randomize` or a script) and outputs
/// (filled in by the monitor). Every hand-off between agents is a `clone()`,
/// so no two agents ever share an instance.
pub trait Transaction: Clone + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Fill the input fields from their constraints.
    fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), RandomizeError>;

    /// Field names and rendered values, in display order.
    fn fields(&self) -> Vec<(&'static str, String)>;

    /// Diagnostic line `[TAG] field:value ...`.
    fn render(&self, tag: Tag) -> String {
        render_fields(tag, &self.fields())
    }
}

pub fn render_fields(tag: Tag, fields: &[(&'static str, String)]) -> String {
    let mut line = format!("[{tag}]");
    for (name, value) in fields {
        // Writing into a String cannot fail.
        let _ = write!(line, " {name}:{value}");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fields_format() {
        let line = render_fields(
            Tag::Gen,
            &[("din", "4".to_string()), ("op", "write".to_string())],
        );
        assert_eq!(line, "[GEN] din:4 op:write");
    }

    #[test]
    fn test_render_without_fields_is_just_tag() {
        assert_eq!(render_fields(Tag::Sco, &[]), "[SCO]");
    }
}
