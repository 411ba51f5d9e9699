use serde::Serialize;
use std::fmt;

/// One narrowing step applied to the current set of matched elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Descendants matching a CSS selector.
    Css { selector: String },
    /// Innermost descendants whose text contains `text`, case-insensitively.
    Text { text: String },
    Nth { index: usize },
    Last,
}

/// Engine-neutral address of page elements, built by chaining steps from the
/// document root. An action on a locator applies to its first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    steps: Vec<Step>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            steps: vec![Step::Css {
                selector: selector.into(),
            }],
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            steps: vec![Step::Text { text: text.into() }],
        }
    }

    pub fn child(&self, selector: impl Into<String>) -> Self {
        self.with(Step::Css {
            selector: selector.into(),
        })
    }

    pub fn nth(&self, index: usize) -> Self {
        self.with(Step::Nth { index })
    }

    pub fn first(&self) -> Self {
        self.nth(0)
    }

    pub fn last(&self) -> Self {
        self.with(Step::Last)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn with(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            match step {
                Step::Css { selector } => f.write_str(selector)?,
                Step::Text { text } => write!(f, "text={text}")?,
                Step::Nth { index } => write!(f, "nth={index}")?,
                Step::Last => f.write_str("last")?,
            }
        }
        Ok(())
    }
}
