//! DOM helpers shared by the listing and datasheet parsers

use scraper::{ElementRef, Node};

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Rendered text of an element. `<br>` reads as a space, like a browser would lay it out.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if el.name() == "br" => raw.push(' '),
            _ => {}
        }
    }
    normalize_ws(&raw)
}

/// Direct child elements, text nodes skipped.
pub fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Direct `td`/`th` children of a row. Cells of nested tables are not included.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    child_elements(row)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

/// Direct `tr` children of a table section.
pub fn section_rows(section: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    child_elements(section)
        .filter(|el| el.value().name() == "tr")
        .collect()
}

/// Top-level rows of a table: rows of its sections (`thead`/`tbody`/`tfoot`) and
/// bare rows, in document order, never descending into nested tables.
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        match child.value().name() {
            "thead" | "tbody" | "tfoot" => rows.extend(section_rows(child)),
            "tr" => rows.push(child),
            _ => {}
        }
    }
    rows
}

/// First descendant element with the given tag name.
pub fn first_descendant<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn normalize_ws_collapses_and_trims() {
        assert_eq!(normalize_ws("  Full \n\t Frame  "), "Full Frame");
        assert_eq!(normalize_ws(""), "");
    }

    #[test]
    fn element_text_treats_br_as_space() {
        let html = Html::parse_fragment("<p>4K<br>60p <b>HDR</b></p>");
        let sel = Selector::parse("p").unwrap();
        let p = html.select(&sel).next().unwrap();
        assert_eq!(element_text(p), "4K 60p HDR");
    }

    #[test]
    fn table_rows_skip_nested_tables() {
        let html = Html::parse_document(
            "<table id='t'><tr><td>a</td><td><table><tr><td>x</td></tr></table></td></tr>\
             <tr><td>b</td><td>c</td></tr></table>",
        );
        let sel = Selector::parse("#t").unwrap();
        let table = html.select(&sel).next().unwrap();
        let rows = table_rows(table);
        assert_eq!(rows.len(), 2);
        assert_eq!(row_cells(rows[0]).len(), 2);
    }
}
