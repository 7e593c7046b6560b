//! Table scraping for the HTML admin pages.
//!
//! The switches render everything as plain `<table>` markup, so parsing is a
//! matter of walking rows and reading the stripped text of each cell.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Concatenated text of an element with every text node trimmed.
pub fn cell_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

pub struct Page {
    document: Html,
}

impl Page {
    pub fn parse(body: &str) -> Self {
        Self {
            document: Html::parse_document(body),
        }
    }

    /// `td` cell texts of every row in the document.
    pub fn rows(&self) -> Vec<Vec<String>> {
        collect_rows(self.document.select(&selector("tr")), &selector("td"))
    }

    /// `th`/`td` cell texts of the rows of the first table only.
    pub fn first_table_rows(&self) -> Vec<Vec<String>> {
        let table = selector("table");
        match self.document.select(&table).next() {
            Some(first) => collect_rows(first.select(&selector("tr")), &selector("th, td")),
            None => Vec::new(),
        }
    }

    /// `th`/`td` cell texts of every row in the document.
    pub fn rows_with_headers(&self) -> Vec<Vec<String>> {
        collect_rows(self.document.select(&selector("tr")), &selector("th, td"))
    }

    /// `key: value` pairs written into `div`/`span` elements whose class
    /// names mention info, system, device or model.
    pub fn labelled_fields(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for element in self.document.select(&selector("div[class], span[class]")) {
            let class = element.value().attr("class").unwrap_or_default().to_lowercase();
            if !["info", "system", "device", "model"]
                .iter()
                .any(|word| class.contains(word))
            {
                continue;
            }
            let text = cell_text(&element);
            if let Some((key, value)) = text.split_once(':') {
                out.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        out
    }

    pub fn text(&self) -> String {
        cell_text(&self.document.root_element())
    }
}

fn collect_rows<'a>(rows: impl Iterator<Item = ElementRef<'a>>, cells: &Selector) -> Vec<Vec<String>> {
    rows.map(|row| row.select(cells).map(|cell| cell_text(&cell)).collect())
        .collect()
}

/// Name the cells of a row; missing trailing cells become empty strings.
pub fn record(columns: &[&str], cells: &[String]) -> BTreeMap<String, String> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            (
                column.to_string(),
                cells.get(index).cloned().unwrap_or_default(),
            )
        })
        .collect()
}

pub fn is_number(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table>
            <tr><th>Model</th><td> SL-SWTG124AS </td></tr>
            <tr><th>MAC Address</th><td><b>00:11:22</b>:33:44:55</td></tr>
          </table>
          <table>
            <tr><td>Port</td><td>State</td></tr>
            <tr><td>Port 1</td><td>Enable</td></tr>
          </table>
          <div class="sysInfo">Uptime: 3 days</div>
          <span class="footer">Copyright: nobody</span>
        </body></html>
    "#;

    #[test]
    fn first_table_includes_header_cells() {
        let page = Page::parse(PAGE);
        let rows = page.first_table_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Model", "SL-SWTG124AS"]);
        assert_eq!(rows[1], vec!["MAC Address", "00:11:22:33:44:55"]);
    }

    #[test]
    fn rows_only_read_data_cells() {
        let page = Page::parse(PAGE);
        let rows = page.rows();
        assert_eq!(rows[0], vec!["SL-SWTG124AS"]);
        assert_eq!(rows[3], vec!["Port 1", "Enable"]);
    }

    #[test]
    fn labelled_fields_follow_class_names() {
        let page = Page::parse(PAGE);
        assert_eq!(
            page.labelled_fields(),
            vec![("Uptime".to_string(), "3 days".to_string())]
        );
    }

    #[test]
    fn record_pads_missing_cells() {
        let cells = vec!["1".to_string(), "default".to_string()];
        let row = record(&["vlan_id", "vlan_name", "ports"], &cells);
        assert_eq!(row["vlan_name"], "default");
        assert_eq!(row["ports"], "");
        assert!(is_number("120"));
        assert!(!is_number("VLAN ID"));
        assert!(!is_number(""));
    }
}
