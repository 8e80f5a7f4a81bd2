use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    Normal,
    /// Headline figure, e.g. a price.
    Highlight,
    /// Spoken-style text.
    Quote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardSection {
    pub heading: String,
    pub body: String,
    pub emphasis: Emphasis,
}

/// How a flow result is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultCard {
    pub title: String,
    pub description: Option<String>,
    pub sections: Vec<CardSection>,
}

impl ResultCard {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            sections: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn section(self, heading: &str, body: impl Into<String>) -> Self {
        self.section_with(heading, body, Emphasis::Normal)
    }

    pub fn section_with(mut self, heading: &str, body: impl Into<String>, emphasis: Emphasis) -> Self {
        self.sections.push(CardSection {
            heading: heading.to_string(),
            body: body.into(),
            emphasis,
        });
        self
    }

    pub fn get(&self, heading: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.heading == heading)
            .map(|s| s.body.as_str())
    }
}

impl fmt::Display for ResultCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if let Some(description) = &self.description {
            writeln!(f, "{}", description)?;
        }
        for section in &self.sections {
            writeln!(f)?;
            writeln!(f, "{}", section.heading)?;
            match section.emphasis {
                Emphasis::Quote => writeln!(f, "\"{}\"", section.body)?,
                Emphasis::Normal | Emphasis::Highlight => writeln!(f, "{}", section.body)?,
            }
        }
        Ok(())
    }
}
