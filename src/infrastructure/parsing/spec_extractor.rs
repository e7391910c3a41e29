//! Datasheet extractor
//!
//! Turns a rendered detail page into the product identity plus an ordered set of
//! legend → value pairs. The attribute set is open-ended: whatever rows the page
//! has become attributes. Each row is inspected on its own and a malformed row
//! is skipped without affecting the rest of the page.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::config::DetailSelectors;
use super::context::DetailParseContext;
use super::dom::{child_elements, element_text, first_descendant, row_cells, table_rows};
use super::error::{ExtractionError, ExtractionResult, SelectorError, compile_selector};
use super::ContextualParser;
use crate::domain::{NestedTablePolicy, ProductIdentity, RawAttributeSet, RawValue};

/// Why a datasheet row contributed no attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Legend starts with a digit: footnote or pagination residue
    NumericLabel(String),
    /// Legend cell is empty
    BlankLabel,
    Malformed(ExtractionError),
}

/// Result of inspecting a single datasheet row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Attribute { label: String, value: RawValue },
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSkip {
    /// Zero-based row index within the datasheet, header rows included
    pub row: usize,
    pub reason: SkipReason,
}

/// Everything read from one datasheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailExtraction {
    pub identity: ProductIdentity,
    pub attributes: RawAttributeSet,
    pub skipped: Vec<RowSkip>,
}

impl DetailExtraction {
    /// Rows that failed inspection, as opposed to rows filtered on purpose.
    pub fn malformed_rows(&self) -> usize {
        self.skipped
            .iter()
            .filter(|skip| matches!(skip.reason, SkipReason::Malformed(_)))
            .count()
    }
}

/// Parser for datasheet pages
pub struct SpecExtractor {
    datasheet_selector: Selector,
    identity_cell_selector: Selector,
    datasheet_source: String,
}

impl SpecExtractor {
    /// Create an extractor with the default datasheet layout
    pub fn new() -> Result<Self, SelectorError> {
        Self::with_config(&DetailSelectors::default())
    }

    pub fn with_config(selectors: &DetailSelectors) -> Result<Self, SelectorError> {
        Ok(Self {
            datasheet_selector: compile_selector(&selectors.datasheet)?,
            identity_cell_selector: compile_selector(&selectors.identity_cell)?,
            datasheet_source: selectors.datasheet.clone(),
        })
    }

    /// Parse raw markup and extract the datasheet.
    pub fn extract(&self, html: &str, context: &DetailParseContext) -> ExtractionResult<DetailExtraction> {
        let document = Html::parse_document(html);
        self.parse_with_context(&document, context)
    }

    /// The datasheet element may be the table itself or a wrapper around it.
    fn find_datasheet<'a>(&self, html: &'a Html) -> Option<ElementRef<'a>> {
        let element = html.select(&self.datasheet_selector).next()?;
        if element.value().name() == "table" {
            Some(element)
        } else {
            first_descendant(element, "table")
        }
    }

    fn read_identity(&self, header: ElementRef<'_>, context: &DetailParseContext) -> Option<ProductIdentity> {
        let heading = header
            .select(&self.identity_cell_selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
            .or_else(|| {
                row_cells(header)
                    .into_iter()
                    .map(element_text)
                    .rfind(|text| !text.is_empty())
            })?;
        ProductIdentity::from_heading(&heading, &context.group)
    }

    /// Inspect one attribute row.
    pub fn inspect_row(&self, index: usize, row: ElementRef<'_>, policy: NestedTablePolicy) -> RowOutcome {
        let cells = row_cells(row);
        let Some(legend_cell) = cells.first() else {
            return RowOutcome::Skip(SkipReason::Malformed(ExtractionError::EmptyRow { row: index }));
        };

        let label = element_text(*legend_cell);
        if label.is_empty() {
            return RowOutcome::Skip(SkipReason::BlankLabel);
        }
        if label.starts_with(|c: char| c.is_ascii_digit()) {
            return RowOutcome::Skip(SkipReason::NumericLabel(label));
        }

        let Some(value_cell) = cells.get(1) else {
            return RowOutcome::Skip(SkipReason::Malformed(ExtractionError::MissingValueCell {
                row: index,
                label,
            }));
        };

        RowOutcome::Attribute {
            label,
            value: read_value_cell(*value_cell, policy),
        }
    }
}

impl ContextualParser for SpecExtractor {
    type Output = DetailExtraction;
    type Context = DetailParseContext;
    type Error = ExtractionError;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ExtractionResult<Self::Output> {
        debug!("Extracting datasheet from: {}", context.url);

        let datasheet = self
            .find_datasheet(html)
            .ok_or_else(|| ExtractionError::MissingDatasheet {
                selector: self.datasheet_source.clone(),
            })?;
        let rows = table_rows(datasheet);

        let identity = rows
            .first()
            .and_then(|header| self.read_identity(*header, context))
            .ok_or(ExtractionError::MissingIdentity)?;

        let policy = context.taxonomy.nested_table_policy();
        let mut attributes = RawAttributeSet::new();
        let mut skipped = Vec::new();

        for (index, row) in rows.iter().enumerate().skip(context.taxonomy.header_rows()) {
            match self.inspect_row(index, *row, policy) {
                RowOutcome::Attribute { label, value } => attributes.insert(label, value),
                RowOutcome::Skip(reason) => {
                    match &reason {
                        SkipReason::Malformed(err) => warn!("Skipping row on {}: {}", context.url, err),
                        SkipReason::NumericLabel(label) => debug!("Skipping digit-led row {}: '{}'", index, label),
                        SkipReason::BlankLabel => debug!("Skipping row {} with blank legend", index),
                    }
                    skipped.push(RowSkip { row: index, reason });
                }
            }
        }

        debug!(
            "Extracted {} attributes for {} {} ({} rows skipped)",
            attributes.len(),
            identity.brand,
            identity.model,
            skipped.len()
        );

        Ok(DetailExtraction {
            identity,
            attributes,
            skipped,
        })
    }
}

/// Resolve a value cell to a raw value, in order of cell shape:
/// nested sub-table, several child elements, plain text.
fn read_value_cell(cell: ElementRef<'_>, policy: NestedTablePolicy) -> RawValue {
    if let Some(nested) = first_descendant(cell, "table") {
        return read_nested_table(nested, policy);
    }

    let children: Vec<_> = child_elements(cell)
        .filter(|el| el.value().name() != "br")
        .collect();
    if children.len() > 1 {
        let parts: Vec<String> = children
            .into_iter()
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect();
        return RawValue::List(parts);
    }

    RawValue::Scalar(element_text(cell))
}

fn read_nested_table(table: ElementRef<'_>, policy: NestedTablePolicy) -> RawValue {
    let sub_rows: Vec<Vec<String>> = table_rows(table)
        .into_iter()
        .map(|row| {
            row_cells(row)
                .into_iter()
                .map(element_text)
                .filter(|text| !text.is_empty())
                .collect()
        })
        .collect();

    let parts = match policy {
        NestedTablePolicy::Flatten => sub_rows.into_iter().flatten().collect(),
        NestedTablePolicy::GroupBySubRow => sub_rows
            .into_iter()
            .filter(|cells| !cells.is_empty())
            .map(|cells| cells.join(" "))
            .collect(),
    };
    RawValue::List(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Taxonomy;

    fn datasheet(rows: &str) -> String {
        format!(
            "<html><body><table class='dkDataSheet'><tbody>\
             <tr><td class='colData1'>Nikon Z9</td></tr>{rows}</tbody></table></body></html>"
        )
    }

    fn primary_ctx() -> DetailParseContext {
        DetailParseContext::new(Taxonomy::Primary, "https://example.test/z9", "Nikon")
    }

    #[test]
    fn test_extractor_creation() {
        assert!(SpecExtractor::new().is_ok());
    }

    #[test]
    fn digit_led_rows_are_dropped() {
        let html = datasheet(
            "<tr><td>Sensor</td><td>Full Frame</td></tr>\
             <tr><td>0 Footnote</td><td>ignored</td></tr>",
        );
        let extraction = SpecExtractor::new().unwrap().extract(&html, &primary_ctx()).unwrap();

        assert_eq!(extraction.identity.brand, "Nikon");
        assert_eq!(extraction.identity.model, "Z9");
        assert_eq!(extraction.attributes.len(), 1);
        assert_eq!(
            extraction.attributes.get("Sensor"),
            Some(&RawValue::Scalar("Full Frame".to_string()))
        );
        assert_eq!(
            extraction.skipped[0].reason,
            SkipReason::NumericLabel("0 Footnote".to_string())
        );
    }

    #[test]
    fn malformed_row_does_not_poison_the_page() {
        let mut rows = String::new();
        for i in 0..9 {
            rows.push_str(&format!("<tr><td>Feature {}</td><td>value {}</td></tr>", char::from(b'A' + i), i));
        }
        rows.insert_str(0, "<tr><td>Lonely legend</td></tr>");
        let extraction = SpecExtractor::new().unwrap().extract(&datasheet(&rows), &primary_ctx()).unwrap();

        assert_eq!(extraction.attributes.len(), 9);
        assert_eq!(extraction.malformed_rows(), 1);
        assert_eq!(
            extraction.skipped[0].reason,
            SkipReason::Malformed(ExtractionError::MissingValueCell {
                row: 1,
                label: "Lonely legend".to_string()
            })
        );
    }

    #[test]
    fn multi_child_cells_are_comma_joined() {
        let html = datasheet(
            "<tr><td>Anschlüsse</td><td><a href='#'>USB-C</a><br><a href='#'>HDMI</a></td></tr>\
             <tr><td>Gehäuse</td><td><span>Magnesium</span></td></tr>",
        );
        let extraction = SpecExtractor::new().unwrap().extract(&html, &primary_ctx()).unwrap();

        assert_eq!(extraction.attributes.get("Anschlüsse").unwrap().joined(), "USB-C, HDMI");
        assert_eq!(
            extraction.attributes.get("Gehäuse"),
            Some(&RawValue::Scalar("Magnesium".to_string()))
        );
    }

    #[test]
    fn nested_table_is_flattened_for_primary_items() {
        let html = datasheet(
            "<tr><td>Video</td><td><table>\
             <tr><td>4K</td><td>60p</td></tr><tr><td>8K</td><td>30p</td></tr>\
             </table></td></tr>",
        );
        let extraction = SpecExtractor::new().unwrap().extract(&html, &primary_ctx()).unwrap();
        assert_eq!(extraction.attributes.get("Video").unwrap().joined(), "4K, 60p, 8K, 30p");
    }

    #[test]
    fn nested_table_is_grouped_by_sub_row_for_accessories() {
        let html = "<table class='dkDataSheet'><tbody>\
             <tr><td class='colData1'>Nikon Z 24-70mm f/2.8 S</td></tr>\
             <tr><td>Bild</td><td>-</td></tr>\
             <tr><td>Filter</td><td><table>\
             <tr><td>Durchmesser</td><td>82 mm</td></tr><tr><td>Gewinde</td><td>ja</td></tr>\
             </table></td></tr></tbody></table>";
        let ctx = DetailParseContext::new(Taxonomy::Accessory, "https://example.test/lens", "Nikon");
        let extraction = SpecExtractor::new().unwrap().extract(html, &ctx).unwrap();

        assert_eq!(extraction.identity.model, "Z 24-70mm f/2.8 S");
        assert!(extraction.attributes.get("Bild").is_none());
        assert_eq!(
            extraction.attributes.get("Filter").unwrap().joined(),
            "Durchmesser 82 mm, Gewinde ja"
        );
    }

    #[test]
    fn missing_datasheet_fails_the_entry() {
        let err = SpecExtractor::new()
            .unwrap()
            .extract("<html><body><p>404</p></body></html>", &primary_ctx())
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MissingDatasheet { .. }));
        assert!(!err.is_row_scoped());
    }

    #[test]
    fn blank_heading_is_missing_identity() {
        let html = "<table class='dkDataSheet'><tr><td class='colData1'> </td></tr>\
                    <tr><td>Sensor</td><td>APS-C</td></tr></table>";
        let err = SpecExtractor::new().unwrap().extract(html, &primary_ctx()).unwrap_err();
        assert_eq!(err, ExtractionError::MissingIdentity);
    }

    #[test]
    fn datasheet_wrapper_div_is_accepted() {
        let html = "<div class='dkDataSheet'><table>\
                    <tr><th>Sony Alpha 1</th></tr><tr><td>ISO</td><td>50 - 102.400</td></tr>\
                    </table></div>";
        let ctx = DetailParseContext::new(Taxonomy::Primary, "https://example.test/a1", "Sony");
        let extraction = SpecExtractor::new().unwrap().extract(html, &ctx).unwrap();
        assert_eq!(extraction.identity.model, "Alpha 1");
        assert_eq!(extraction.attributes.get("ISO").unwrap().joined(), "50 - 102.400");
    }
}
