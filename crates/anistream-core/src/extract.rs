//! Declarative HTML extraction
//!
//! Every scraping provider reads pages through this module, so a change in
//! a target's layout only ever means a change of selectors.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use crate::error::ExtractError;

/// What to read from a matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attr {
    /// Concatenated text content, whitespace collapsed
    Text,
    Href,
    Src,
    /// Any other attribute, e.g. `data-src`
    Named(String),
}

/// CSS path plus the attribute to read from its first match
///
/// An empty `css` targets the row element itself in [`extract_rows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    pub css: String,
    pub attr: Attr,
}

/// Mapping from field name to selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorSpec {
    fields: Vec<(String, FieldSelector)>,
}

impl SelectorSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field; builder style
    pub fn field(mut self, name: impl Into<String>, css: impl Into<String>, attr: Attr) -> Self {
        self.fields.push((
            name.into(),
            FieldSelector {
                css: css.into(),
                attr,
            },
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn compile(&self) -> Result<Vec<(&str, Option<Selector>, &Attr)>, ExtractError> {
        self.fields
            .iter()
            .map(|(name, field)| -> Result<_, ExtractError> {
                let selector = if field.css.trim().is_empty() {
                    None
                } else {
                    Some(Selector::parse(&field.css).map_err(|_| {
                        ExtractError::InvalidSelector {
                            field: name.clone(),
                            selector: field.css.clone(),
                        }
                    })?)
                };
                Ok((name.as_str(), selector, &field.attr))
            })
            .collect()
    }
}

/// Extracted values; `None` when the selector matched nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    values: HashMap<String, Option<String>>,
}

impl ExtractedFields {
    /// Value of a field, `None` if unmatched or not requested
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|v| v.as_deref())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// True when no field matched anything
    pub fn is_blank(&self) -> bool {
        self.values.values().all(Option::is_none)
    }
}

fn parse(html: &str) -> Result<Html, ExtractError> {
    if html.trim().is_empty() {
        return Err(ExtractError::MalformedDocument("empty input".to_string()));
    }
    if !html.contains('<') {
        return Err(ExtractError::MalformedDocument(
            "input contains no markup".to_string(),
        ));
    }
    Ok(Html::parse_document(html))
}

fn read(element: ElementRef<'_>, attr: &Attr) -> Option<String> {
    let value = match attr {
        Attr::Text => element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" "),
        Attr::Href => element.value().attr("href")?.trim().to_string(),
        Attr::Src => element.value().attr("src")?.trim().to_string(),
        Attr::Named(name) => element.value().attr(name)?.trim().to_string(),
    };
    (!value.is_empty()).then_some(value)
}

fn read_fields(
    scope: ElementRef<'_>,
    compiled: &[(&str, Option<Selector>, &Attr)],
) -> ExtractedFields {
    let values = compiled
        .iter()
        .map(|(name, selector, attr)| {
            let target = match selector {
                Some(selector) => scope.select(selector).next(),
                None => Some(scope),
            };
            (name.to_string(), target.and_then(|el| read(el, attr)))
        })
        .collect();
    ExtractedFields { values }
}

/// Extracts one value per field from the whole document
///
/// Missing elements never fail; only unparsable input or an invalid
/// selector does.
pub fn extract(html: &str, spec: &SelectorSpec) -> Result<ExtractedFields, ExtractError> {
    let compiled = spec.compile()?;
    let document = parse(html)?;
    Ok(read_fields(document.root_element(), &compiled))
}

/// Extracts one [`ExtractedFields`] per element matching `row_css`
///
/// Field selectors are evaluated relative to each row.
pub fn extract_rows(
    html: &str,
    row_css: &str,
    spec: &SelectorSpec,
) -> Result<Vec<ExtractedFields>, ExtractError> {
    let compiled = spec.compile()?;
    let row_selector = Selector::parse(row_css).map_err(|_| ExtractError::InvalidSelector {
        field: "<row>".to_string(),
        selector: row_css.to_string(),
    })?;
    let document = parse(html)?;

    Ok(document
        .select(&row_selector)
        .map(|row| read_fields(row, &compiled))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
    <html>
    <head><title>Example Show - Watch</title></head>
    <body>
        <div class="anime-info">
            <a class="detail" href="/anime/example-show">  Example   Show </a>
            <iframe src="https://embed.example/e/abc"></iframe>
        </div>
        <ul id="episodes">
            <li><a href="/ep/1" data-num="1">Episode 1</a></li>
            <li><a href="/ep/2" data-num="2">Episode 2</a></li>
            <li><a href="/ep/2-5" data-num="2.5">Recap</a></li>
        </ul>
    </body>
    </html>
    "#;

    #[test]
    fn test_extract_fields() {
        let spec = SelectorSpec::new()
            .field("link", "a.detail", Attr::Href)
            .field("name", "a.detail", Attr::Text)
            .field("player", "iframe", Attr::Src)
            .field("missing", "div.nope", Attr::Text);

        let fields = extract(PAGE, &spec).unwrap();
        assert_eq!(fields.get("link"), Some("/anime/example-show"));
        assert_eq!(fields.get("name"), Some("Example Show"));
        assert_eq!(fields.get("player"), Some("https://embed.example/e/abc"));
        assert_eq!(fields.get("missing"), None);
        assert!(fields.contains_field("missing"));
        assert!(!fields.is_blank());
    }

    #[test]
    fn test_missing_attribute_is_none() {
        let spec = SelectorSpec::new().field("src", "a.detail", Attr::Src);
        let fields = extract(PAGE, &spec).unwrap();
        assert_eq!(fields.get("src"), None);
        assert!(fields.is_blank());
    }

    #[test]
    fn test_extract_rows_relative_to_row() {
        let spec = SelectorSpec::new()
            .field("href", "", Attr::Href)
            .field("number", "", Attr::Named("data-num".to_string()))
            .field("title", "", Attr::Text);

        let rows = extract_rows(PAGE, "ul#episodes a", &spec).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("href"), Some("/ep/1"));
        assert_eq!(rows[2].get("number"), Some("2.5"));
        assert_eq!(rows[2].get("title"), Some("Recap"));
    }

    #[test]
    fn test_extract_rows_no_match_is_empty() {
        let spec = SelectorSpec::new().field("href", "a", Attr::Href);
        let rows = extract_rows(PAGE, "table.results tr", &spec).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let spec = SelectorSpec::new().field("a", "a", Attr::Href);
        assert!(matches!(
            extract("", &spec),
            Err(ExtractError::MalformedDocument(_))
        ));
        assert!(matches!(
            extract("   \n ", &spec),
            Err(ExtractError::MalformedDocument(_))
        ));
        assert!(matches!(
            extract("{\"data\": []}", &spec),
            Err(ExtractError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_broken_markup_still_parses() {
        let spec = SelectorSpec::new().field("link", "a", Attr::Href);
        let fields = extract("<div><a href='/x'>unclosed", &spec).unwrap();
        assert_eq!(fields.get("link"), Some("/x"));
    }

    #[test]
    fn test_invalid_selector() {
        let spec = SelectorSpec::new().field("bad", "a[[", Attr::Href);
        match extract(PAGE, &spec) {
            Err(ExtractError::InvalidSelector { field, .. }) => assert_eq!(field, "bad"),
            other => panic!("Expected InvalidSelector, got {:?}", other),
        }
    }
}
