//! Terminal rendering for session state.

use colored::Colorize;

use maptology_core::{
    term_page_url, ColumnSummary, MappingRecord, Notice, NoticeLevel, OntologyInfo, OntologyTerm,
    SearchResultSet, SessionStore,
};
use std::collections::BTreeSet;

const DEFINITION_WIDTH: usize = 100;
const DESCRIPTION_WIDTH: usize = 70;

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

pub fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info:".blue().bold(),
            NoticeLevel::Success => "ok:".green().bold(),
            NoticeLevel::Warning => "warning:".yellow().bold(),
            NoticeLevel::Error => "error:".red().bold(),
        };
        println!("{tag} {}", notice.message);
    }
}

pub fn summary_line(summary: &ColumnSummary) -> String {
    match summary {
        ColumnSummary::Distinct { preview, total } => {
            let more = total.saturating_sub(preview.len());
            if more > 0 {
                format!("{} (+{more} more)", preview.join(", "))
            } else {
                preview.join(", ")
            }
        }
        ColumnSummary::Numeric { min, max, mean } => {
            format!("min {min}, max {max}, mean {mean:.2}")
        }
        ColumnSummary::Dates { min, max } => format!("{min} .. {max}"),
        ColumnSummary::Sample(values) => values.join(", "),
    }
}

pub fn ontology_line(info: &OntologyInfo) -> String {
    let mut line = format!("{:<12} {}", info.acronym.bold(), info.name);
    if !info.description.is_empty() {
        line.push_str(&format!(
            "\n             {}",
            truncate(&info.description, DESCRIPTION_WIDTH).dimmed()
        ));
    }
    line
}

/// One numbered search hit. `checked` adds a checkbox.
pub fn term_line(number: usize, term: &OntologyTerm, checked: Option<bool>) -> String {
    let mark = match checked {
        Some(true) => format!("{} ", "[x]".green().bold()),
        Some(false) => "[ ] ".to_string(),
        None => String::new(),
    };
    let mut line = format!(
        "{mark}{number:>3}. {} ({})  {}",
        term.preferred_label.bold(),
        term.ontology_abbreviation.cyan(),
        term.term_uri
    );
    if let Some(definition) = &term.definition {
        line.push_str(&format!(
            "\n        {}",
            truncate(definition, DEFINITION_WIDTH).dimmed()
        ));
    }
    line
}

pub fn print_results(
    store: &SessionStore,
    results: Option<&SearchResultSet>,
    selected: &BTreeSet<String>,
    verbose: bool,
) {
    let Some(results) = results else {
        println!("(no results)");
        return;
    };
    println!(
        "{} {} ({} terms)",
        "results for".green().bold(),
        results.context,
        results.len()
    );
    for (idx, term) in results.terms.iter().enumerate() {
        println!(
            "{}",
            term_line(idx + 1, term, Some(selected.contains(&term.term_uri)))
        );
        if verbose {
            println!(
                "        {} {}",
                store.widget_key(&results.context, idx).to_string().dimmed(),
                term_page_url(&term.ontology_abbreviation, &term.term_uri).dimmed()
            );
        }
    }
}

fn record_line(number: usize, record: &MappingRecord) -> String {
    format!(
        "{number:>5}. {} [{}]  {}  {}",
        record.preferred_label.bold(),
        record.data_type.to_string().cyan(),
        record.ontology_display_name,
        record.term_uri.dimmed()
    )
}

pub fn print_mappings(store: &SessionStore) {
    if !store.has_mappings() {
        println!("(no mappings)");
        return;
    }
    if !store.column_mappings().is_empty() {
        println!("{}", "Column mappings".green().bold());
        for (label, mapping) in store.column_mappings() {
            println!("  {}", label.bold());
            for (idx, record) in mapping.records.iter().enumerate() {
                println!("{}", record_line(idx + 1, record));
            }
        }
    }
    if !store.value_mappings().is_empty() {
        println!("{}", "Value mappings".green().bold());
        for (column, values) in store.value_mappings() {
            for (value, records) in values {
                println!("  {} = {}", column.bold(), value.bold());
                for (idx, record) in records.iter().enumerate() {
                    println!("{}", record_line(idx + 1, record));
                }
            }
        }
    }
}

/// Where the session currently is: column, label and result counts.
pub fn print_status(store: &SessionStore) {
    let Some(column) = store.active_column() else {
        println!("(no column selected)");
        return;
    };
    let data_type = store
        .dataset()
        .and_then(|ds| ds.data_type(column).ok())
        .map(|t| t.to_string())
        .unwrap_or_default();
    print!("column {} ({})", column.bold(), data_type.cyan());
    if let Some(query) = store.manual_search_term() {
        print!(", searching '{query}'");
    }
    let hits = store.column_results().map(|r| r.len()).unwrap_or(0);
    println!(": {hits} results, {} selected", store.selected_terms().len());
    if let Some(value) = store.active_value() {
        let hits = store.value_results().map(|r| r.len()).unwrap_or(0);
        println!(
            "value {}: {hits} results, {} selected",
            value.bold(),
            store.value_selection().len()
        );
    }
}
