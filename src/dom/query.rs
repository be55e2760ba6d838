//! Two-phase sibling query over a parsed document
//!
//! The search is depth-first until the first element matching the selector is
//! found. After that only the immediate children of that element's parent are
//! scanned, so the result is the repeated list of items at the level of the
//! first hit. Matches nested deeper inside those siblings are never returned.

use crate::dom::selector::{Selector, SelectorPath};
use scraper::ElementRef;

#[derive(Debug, Clone)]
enum Phase<'a> {
    /// Nothing evaluated yet
    Locate,

    /// Walking the siblings; holds the next candidate to test
    Scan(Option<ElementRef<'a>>),
}

/// Lazy iterator returned by [`find`]
///
/// Dropping it early leaves the rest of the tree unvisited. Calling [`find`]
/// again on the same root yields the same sequence.
#[derive(Debug, Clone)]
pub struct Find<'a> {
    root: ElementRef<'a>,
    selector: &'a Selector,
    phase: Phase<'a>,
}

impl<'a> Iterator for Find<'a> {
    type Item = ElementRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Phase::Locate = self.phase {
            let cursor = locate_first(self.root, self.selector)
                .and_then(|hit| hit.parent())
                .and_then(ElementRef::wrap)
                .and_then(first_element_child);
            self.phase = Phase::Scan(cursor);
        }

        let Phase::Scan(cursor) = &mut self.phase else {
            return None;
        };

        while let Some(candidate) = cursor.take() {
            *cursor = next_element_sibling(candidate);
            if self.selector.matches(candidate.value()) {
                return Some(candidate);
            }
        }

        None
    }
}

/// Finds the repeated sibling elements matching `selector` beneath `root`
///
/// # Example
///
/// ```
/// use humidor::dom::{find, Selector};
/// use scraper::Html;
///
/// let html = Html::parse_fragment(r#"<ul><li class="a">1</li><li class="a">2</li></ul>"#);
/// let selector = Selector::parse("li.a").unwrap();
/// assert_eq!(find(html.root_element(), &selector).count(), 2);
/// ```
pub fn find<'a>(root: ElementRef<'a>, selector: &'a Selector) -> Find<'a> {
    Find {
        root,
        selector,
        phase: Phase::Locate,
    }
}

/// Extension trait exposing [`find`] as a method on elements
pub trait DomQuery<'a> {
    fn query(self, selector: &'a Selector) -> Find<'a>;
}

impl<'a> DomQuery<'a> for ElementRef<'a> {
    fn query(self, selector: &'a Selector) -> Find<'a> {
        find(self, selector)
    }
}

/// Follows a selector path, keeping only the first match at every step
pub fn first<'a>(root: ElementRef<'a>, path: &'a SelectorPath) -> Option<ElementRef<'a>> {
    path.steps()
        .iter()
        .try_fold(root, |node, step| find(node, step).next())
}

/// Follows a selector path, expanding every match at every step
///
/// This mirrors nested loops over `find`: for `div.results a.item` each
/// `div.results` sibling is searched for its `a.item` siblings.
pub fn find_all<'a>(root: ElementRef<'a>, path: &'a SelectorPath) -> Vec<ElementRef<'a>> {
    path.steps().iter().fold(vec![root], |nodes, step| {
        nodes
            .into_iter()
            .flat_map(|node| find(node, step))
            .collect()
    })
}

/// Returns the element's text with whitespace runs collapsed to one space
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns a trimmed, non-empty attribute value
pub fn attr_of<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn locate_first<'a>(root: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    root.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|element| selector.matches(element.value()))
}

fn first_element_child(parent: ElementRef<'_>) -> Option<ElementRef<'_>> {
    parent.children().find_map(ElementRef::wrap)
}

fn next_element_sibling(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}
