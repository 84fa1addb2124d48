use scraper::{ElementRef, Html, Selector};

use super::ExtractError;

/// Finds the element holding the table to extract.
pub trait TableLocator {
    fn locate<'a>(&self, document: &'a Html) -> Result<ElementRef<'a>, ExtractError>;
}

/// First element matching a CSS selector, e.g. `table.wikitable`.
#[derive(Debug, Clone)]
pub struct CssTableLocator {
    raw: String,
    selector: Selector,
}

impl CssTableLocator {
    pub fn new(selector: &str) -> Result<Self, ExtractError> {
        let parsed = Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
            selector: selector.to_string(),
            reason: format!("{:?}", e),
        })?;
        Ok(Self {
            raw: selector.to_string(),
            selector: parsed,
        })
    }
}

impl TableLocator for CssTableLocator {
    fn locate<'a>(&self, document: &'a Html) -> Result<ElementRef<'a>, ExtractError> {
        document
            .select(&self.selector)
            .next()
            .ok_or_else(|| ExtractError::TableNotFound {
                selector: self.raw.clone(),
            })
    }
}
