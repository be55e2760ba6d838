//! Typed element selectors
//!
//! A [`Selector`] names one element tag plus optional id and class predicates.
//! The textual form is a small subset of CSS:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `li` | any `<li>` |
//! | `div#main` | `<div id="main">` |
//! | `li.foo.bar` | `<li>` whose class list holds both `foo` and `bar` |
//! | `div.variant*` | `<div>` whose class attribute contains `variant` |
//!
//! A [`SelectorPath`] chains selectors separated by whitespace; each step is
//! applied beneath the matches of the previous one.

use crate::dom::tags::is_known_tag;
use crate::{SelectorError, SelectorResult};
use scraper::node::Element;
use std::fmt;
use std::str::FromStr;

/// A predicate on the `class` attribute of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassPredicate {
    /// The class list must contain this exact token
    Token(String),

    /// The raw class attribute must contain this substring
    Contains(String),
}

impl ClassPredicate {
    fn holds(&self, element: &Element) -> bool {
        match self {
            Self::Token(token) => element.classes().any(|class| class == token.as_str()),
            Self::Contains(needle) => element
                .attr("class")
                .is_some_and(|value| value.contains(needle.as_str())),
        }
    }
}

/// An immutable tag + id/class description of the elements to match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: String,
    id: Option<String>,
    classes: Vec<ClassPredicate>,
}

impl Selector {
    /// Creates a selector matching every element with the given tag
    ///
    /// # Returns
    ///
    /// * `Ok(Selector)` - The tag is a known HTML element
    /// * `Err(SelectorError)` - The tag is empty or unknown
    pub fn new(tag: &str) -> SelectorResult<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Err(SelectorError::Empty);
        }
        if !is_known_tag(&tag) {
            return Err(SelectorError::UnknownTag(tag));
        }

        Ok(Self {
            tag,
            id: None,
            classes: Vec::new(),
        })
    }

    /// Requires an exact `id` attribute
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Requires `class` to be one of the element's class tokens
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(ClassPredicate::Token(class.into()));
        self
    }

    /// Requires the element's class attribute to contain `fragment`
    pub fn with_class_containing(mut self, fragment: impl Into<String>) -> Self {
        self.classes.push(ClassPredicate::Contains(fragment.into()));
        self
    }

    /// Parses the textual selector form described in the module docs
    ///
    /// # Example
    ///
    /// ```
    /// use humidor::dom::Selector;
    ///
    /// let selector = Selector::parse("li.foo.bar").unwrap();
    /// assert_eq!(selector.tag(), "li");
    /// assert!(Selector::parse("lii.foo").is_err());
    /// ```
    pub fn parse(input: &str) -> SelectorResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SelectorError::Empty);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(SelectorError::Malformed(input.to_string()));
        }

        let is_marker = |c: char| c == '#' || c == '.';
        let (tag, mut rest) = match input.find(is_marker) {
            Some(i) => (&input[..i], &input[i..]),
            None => (input, ""),
        };

        let mut selector = Self::new(tag)?;

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(is_marker).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return Err(SelectorError::Malformed(input.to_string()));
            }

            if marker == '#' {
                if selector.id.is_some() {
                    return Err(SelectorError::DuplicateId(input.to_string()));
                }
                selector = selector.with_id(name);
            } else if let Some(fragment) = name.strip_suffix('*') {
                if fragment.is_empty() {
                    return Err(SelectorError::Malformed(input.to_string()));
                }
                selector = selector.with_class_containing(fragment);
            } else {
                selector = selector.with_class(name);
            }

            rest = &body[end..];
        }

        Ok(selector)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn classes(&self) -> &[ClassPredicate] {
        &self.classes
    }

    /// Checks a single element against this selector
    pub fn matches(&self, element: &Element) -> bool {
        element.name() == self.tag
            && self
                .id
                .as_deref()
                .map_or(true, |id| element.id() == Some(id))
            && self.classes.iter().all(|predicate| predicate.holds(element))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }
        for predicate in &self.classes {
            match predicate {
                ClassPredicate::Token(token) => write!(f, ".{}", token)?,
                ClassPredicate::Contains(fragment) => write!(f, ".{}*", fragment)?,
            }
        }
        Ok(())
    }
}

/// A whitespace-separated chain of selectors, e.g. `div#tab-pane-data span.price`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPath {
    steps: Vec<Selector>,
}

impl SelectorPath {
    pub fn parse(input: &str) -> SelectorResult<Self> {
        let steps = input
            .split_whitespace()
            .map(Selector::parse)
            .collect::<SelectorResult<Vec<_>>>()?;

        if steps.is_empty() {
            return Err(SelectorError::Empty);
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Selector] {
        &self.steps
    }
}

impl From<Selector> for SelectorPath {
    fn from(selector: Selector) -> Self {
        Self {
            steps: vec![selector],
        }
    }
}

impl FromStr for SelectorPath {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    /// Parses `<div class="...">` and checks the selector against it
    fn matches_class(selector: &str, class: &str) -> bool {
        let html = format!(r#"<div class="{}"></div>"#, class);
        let fragment = Html::parse_fragment(&html);
        let element = fragment
            .root_element()
            .children()
            .find_map(scraper::ElementRef::wrap)
            .unwrap();
        Selector::parse(selector).unwrap().matches(element.value())
    }

    #[test]
    fn test_parse_tag_only() {
        let selector = Selector::parse("li").unwrap();
        assert_eq!(selector.tag(), "li");
        assert_eq!(selector.id(), None);
        assert!(selector.classes().is_empty());
    }

    #[test]
    fn test_parse_id() {
        let selector = Selector::parse("div#foo").unwrap();
        assert_eq!(selector.tag(), "div");
        assert_eq!(selector.id(), Some("foo"));
    }

    #[test]
    fn test_parse_classes() {
        let selector = Selector::parse("div.foo.bar*").unwrap();
        assert_eq!(
            selector.classes(),
            &[
                ClassPredicate::Token("foo".to_string()),
                ClassPredicate::Contains("bar".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_id_and_class() {
        let selector = Selector::parse("div#main.foo").unwrap();
        assert_eq!(selector.id(), Some("main"));
        assert_eq!(selector.classes().len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse(""), Err(SelectorError::Empty));
        assert_eq!(
            Selector::parse("dvi.foo"),
            Err(SelectorError::UnknownTag("dvi".to_string()))
        );
        assert_eq!(
            Selector::parse(".foo"),
            Err(SelectorError::Empty)
        );
        assert!(matches!(
            Selector::parse("div..foo"),
            Err(SelectorError::Malformed(_))
        ));
        assert!(matches!(
            Selector::parse("div.*"),
            Err(SelectorError::Malformed(_))
        ));
        assert!(matches!(
            Selector::parse("div#a#b"),
            Err(SelectorError::DuplicateId(_))
        ));
        assert!(matches!(
            Selector::parse("div span"),
            Err(SelectorError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_is_case_insensitive_for_tag() {
        assert_eq!(Selector::parse("DIV").unwrap().tag(), "div");
    }

    #[test]
    fn test_display_roundtrip_text() {
        for text in ["li", "div#foo", "li.foo.bar", "div#main.variant*"] {
            assert_eq!(Selector::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_class_token_matching() {
        for hit in ["foo bar", "bar foo", "foo bar qux", "qux foo bar", "bar qux foo"] {
            assert!(matches_class("div.foo.bar", hit), "{}", hit);
        }
        for miss in ["foo", "bar", "foo qux", "qux", "foobar"] {
            assert!(!matches_class("div.foo.bar", miss), "{}", miss);
        }
    }

    #[test]
    fn test_class_contains_matching() {
        assert!(matches_class("div.variant*", "detail-variant-list"));
        assert!(matches_class("div.variant*", "variant"));
        assert!(!matches_class("div.variant*", "var iant"));
    }

    #[test]
    fn test_builder_matches_parsed() {
        let built = Selector::new("li")
            .unwrap()
            .with_class("foo")
            .with_class_containing("ba");
        assert_eq!(built, Selector::parse("li.foo.ba*").unwrap());
    }

    #[test]
    fn test_selector_path() {
        let path = SelectorPath::parse("div#tab  span.price").unwrap();
        assert_eq!(path.steps().len(), 2);
        assert_eq!(path.to_string(), "div#tab span.price");
        assert_eq!(SelectorPath::parse("   "), Err(SelectorError::Empty));
        assert!(SelectorPath::parse("div nope").is_err());
    }
}
