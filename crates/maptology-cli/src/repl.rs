//! Interactive mapping session.
//!
//! By default we use `rustyline` for line editing and tab completion.
//! A minimal stdin-based fallback exists behind `--no-default-features`.
//!
//! Every command runs against one [`SessionStore`]; after each command the
//! ontology-change hook is applied and pending notices are printed.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::fs;
use std::io;
use std::io::Read;
#[cfg(not(feature = "repl-rustyline"))]
use std::io::Write;
use std::path::{Path, PathBuf};

use maptology_core::{
    filter_catalog, DataType, Dataset, MappingRecord, SearchResultSet, SessionStore, TermLookup,
};

use crate::render;

const PROMPT: &str = "maptology> ";

#[cfg(feature = "repl-rustyline")]
const COMMANDS: &[&str] = &[
    "help",
    "exit",
    "quit",
    "load",
    "columns",
    "column",
    "status",
    "summary",
    "ontologies",
    "ontology",
    "catalog",
    "results",
    "select",
    "deselect",
    "search",
    "reset-search",
    "values",
    "value",
    "vresults",
    "vselect",
    "vdeselect",
    "vsearch",
    "type",
    "retag",
    "mappings",
    "remove",
    "remove-term",
    "remove-value",
    "remove-value-term",
    "preview",
    "schema",
    "export",
];

pub struct ReplState {
    store: SessionStore,
    lookup: Box<dyn TermLookup>,
    /// Show widget keys and browser links under each result.
    verbose_results: bool,
}

impl ReplState {
    pub fn new(lookup: Box<dyn TermLookup>) -> Self {
        Self {
            store: SessionStore::new(),
            lookup,
            verbose_results: false,
        }
    }

    /// Apply command-line startup options: ontologies first, so opening the
    /// dataset already searches its first column.
    pub fn preselect(&mut self, ontologies: &[String], csv: Option<&Path>) -> Result<()> {
        for acronym in ontologies {
            self.store.ontologies_mut().insert(acronym)?;
        }
        self.store.ontologies_mut().take_changed();
        if let Some(path) = csv {
            cmd_load(self, path)?;
        }
        self.flush_notices();
        Ok(())
    }

    fn flush_notices(&mut self) {
        render::print_notices(self.store.drain_notices());
    }

    /// Post-command hook: rerun searches if the ontology restriction changed.
    fn sync(&mut self) {
        if self.store.apply_ontology_change(self.lookup.as_ref()) {
            render::print_status(&self.store);
        }
        self.flush_notices();
    }
}

pub fn cmd_repl(state: &mut ReplState) -> Result<()> {
    #[cfg(feature = "repl-rustyline")]
    {
        return cmd_repl_rustyline(state);
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        return cmd_repl_simple(state);
    }
}

pub fn cmd_repl_script(
    state: &mut ReplState,
    script: Option<&PathBuf>,
    commands: &[String],
    continue_on_error: bool,
    quiet: bool,
) -> Result<()> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(script_path) = script {
        let text = if script_path.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            fs::read_to_string(script_path)?
        };
        lines.extend(text.lines().map(str::to_string));
    }
    lines.extend(commands.iter().cloned());

    for (idx, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        if !quiet {
            println!("{PROMPT}{line}");
        }

        let tokens = split_command_line(line);
        match dispatch_repl_line_result(state, &tokens) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => {
                state.flush_notices();
                if continue_on_error {
                    eprintln!("{} {e}", "error:".red().bold());
                } else {
                    return Err(anyhow!("repl script failed at line {}: {e}", idx + 1));
                }
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "repl-rustyline"))]
fn cmd_repl_simple(state: &mut ReplState) -> Result<()> {
    println!("{}", "Maptology REPL".green().bold());
    println!("Type `help` for commands. Type `exit` to quit.\n");

    let stdin = io::stdin();
    loop {
        print!("{}", PROMPT.cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tokens = split_command_line(line);
        match dispatch_repl_line_result(state, &tokens) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => {
                state.flush_notices();
                eprintln!("{} {e}", "error:".red().bold());
            }
        }
    }

    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn cmd_repl_rustyline(state: &mut ReplState) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::Editor;

    println!("{}", "Maptology REPL".green().bold());
    println!("Tab-completion enabled. Type `help` for commands. Type `exit` to quit.\n");

    let completions = std::sync::Arc::new(std::sync::RwLock::new(CompletionData::default()));
    let helper = ReplLineHelper::new(completions.clone());
    let mut rl: Editor<ReplLineHelper, rustyline::history::DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    rl.set_helper(Some(helper));

    loop {
        refresh_completion_data(&completions, &state.store);

        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        let tokens = split_command_line(line);
        match dispatch_repl_line_result(state, &tokens) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => {
                state.flush_notices();
                eprintln!("{} {e}", "error:".red().bold());
            }
        }
    }

    Ok(())
}

// ============================================================================
// Dispatch
// ============================================================================

enum ReplControl {
    Continue,
    Exit,
}

fn dispatch_repl_line_result(state: &mut ReplState, tokens: &[String]) -> Result<ReplControl> {
    if tokens.is_empty() {
        return Ok(ReplControl::Continue);
    }

    let cmd = tokens[0].as_str();
    let args = &tokens[1..];

    match cmd {
        "help" | "?" => print_help(),
        "exit" | "quit" => return Ok(ReplControl::Exit),

        "load" => {
            let path = args.first().ok_or_else(|| anyhow!("usage: load <file.csv>"))?;
            cmd_load(state, Path::new(path))?;
        }
        "columns" => cmd_columns(state)?,
        "column" => {
            let column = args.first().ok_or_else(|| anyhow!("usage: column <name>"))?;
            state
                .store
                .navigate_to_column(state.lookup.as_ref(), column)?;
            render::print_status(&state.store);
        }
        "status" => render::print_status(&state.store),
        "summary" => cmd_summary(state, args.first().map(String::as_str))?,

        "ontologies" => cmd_ontologies(state),
        "ontology" => cmd_ontology(state, args)?,
        "catalog" => cmd_catalog(state, args.first().map(String::as_str)),

        "results" => {
            if args.first().map(String::as_str) == Some("-v") {
                state.verbose_results = !state.verbose_results;
            }
            render::print_results(
                &state.store,
                state.store.column_results(),
                state.store.selected_terms(),
                state.verbose_results,
            );
        }
        "select" | "deselect" => {
            let uris = pick_terms(state.store.column_results(), args)?;
            for uri in &uris {
                state.store.toggle_column_term(uri, cmd == "select");
            }
            println!(
                "{} terms selected for '{}'",
                state.store.selected_terms().len(),
                state.store.active_label().unwrap_or_default()
            );
        }
        "search" => {
            if args.is_empty() {
                return Err(anyhow!("usage: search <query...>"));
            }
            let query = args.join(" ");
            if state
                .store
                .manual_column_search(state.lookup.as_ref(), &query)
            {
                render::print_results(
                    &state.store,
                    state.store.column_results(),
                    state.store.selected_terms(),
                    state.verbose_results,
                );
            }
        }
        "reset-search" => {
            state.store.clear_manual_search(state.lookup.as_ref());
            render::print_status(&state.store);
        }

        "values" => cmd_values(state)?,
        "value" => {
            if args.is_empty() {
                return Err(anyhow!("usage: value <value>"));
            }
            let value = args.join(" ");
            if state.store.select_value(state.lookup.as_ref(), &value)? {
                render::print_status(&state.store);
            }
        }
        "vresults" => render::print_results(
            &state.store,
            state.store.value_results(),
            state.store.value_selection(),
            state.verbose_results,
        ),
        "vselect" | "vdeselect" => {
            let uris = pick_terms(state.store.value_results(), args)?;
            for uri in &uris {
                state.store.toggle_value_term(uri, cmd == "vselect");
            }
            println!(
                "{} terms selected for value '{}'",
                state.store.value_selection().len(),
                state.store.active_value().unwrap_or_default()
            );
        }
        "vsearch" => {
            if args.is_empty() {
                return Err(anyhow!("usage: vsearch <query...>"));
            }
            let query = args.join(" ");
            if state
                .store
                .manual_value_search(state.lookup.as_ref(), &query)
            {
                render::print_results(
                    &state.store,
                    state.store.value_results(),
                    state.store.value_selection(),
                    state.verbose_results,
                );
            }
        }

        "type" => {
            let data_type: DataType = args
                .first()
                .ok_or_else(|| anyhow!("usage: type <DataType> [column]"))?
                .parse()?;
            let column = match args.get(1) {
                Some(c) => c.clone(),
                None => active_column(state)?,
            };
            state.store.change_column_type(&column, data_type)?;
        }
        "retag" => {
            let [label, term, data_type] = args else {
                return Err(anyhow!("usage: retag <label> <N|term-uri> <DataType>"));
            };
            let data_type: DataType = data_type.parse()?;
            let records = label_records(state, label)?;
            let uri = pick_record(records, term)?;
            if !state.store.retag_record(label, &uri, data_type) {
                return Err(anyhow!("no mapping of '{label}' to {uri}"));
            }
            println!("{label}: {uri} is now {data_type}");
        }

        "mappings" => render::print_mappings(&state.store),
        "remove" => {
            let label = args.first().ok_or_else(|| anyhow!("usage: remove <label>"))?;
            if !state.store.remove_label_mapping(label) {
                println!("no mapping for '{label}'");
            }
        }
        "remove-term" => {
            let [label, term] = args else {
                return Err(anyhow!("usage: remove-term <label> <N|term-uri>"));
            };
            let uri = pick_record(label_records(state, label)?, term)?;
            if state.store.remove_term_from_label(label, &uri) {
                println!("removed {uri} from '{label}'");
            }
        }
        "remove-value" => {
            let [column, value] = args else {
                return Err(anyhow!("usage: remove-value <column> <value>"));
            };
            if !state.store.remove_value_mapping(column, value) {
                println!("no mapping for '{column}' = '{value}'");
            }
        }
        "remove-value-term" => {
            let [column, value, term] = args else {
                return Err(anyhow!(
                    "usage: remove-value-term <column> <value> <N|term-uri>"
                ));
            };
            let records = state
                .store
                .value_mapping(column, value)
                .ok_or_else(|| anyhow!("no mapping for '{column}' = '{value}'"))?;
            let uri = pick_record(records, term)?;
            if state.store.remove_term_from_value(column, value, &uri) {
                println!("removed {uri} from '{column}' = '{value}'");
            }
        }

        "preview" => {
            if state.store.export_records().is_empty() && state.store.value_mappings().is_empty() {
                println!("(no mappings)");
            }
            if !state.store.export_records().is_empty() {
                print!("{}", state.store.column_mappings_csv()?);
            }
            if !state.store.value_mappings().is_empty() {
                print!("{}", state.store.value_mappings_csv()?);
            }
        }
        "schema" => cmd_schema(state, args.first().map(String::as_str).unwrap_or("yaml"))?,
        "export" => {
            let dir = args.first().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            fs::create_dir_all(&dir)?;
            for path in state.store.write_exports(&dir)? {
                println!("wrote {}", path.display());
            }
        }

        _ => {
            return Err(anyhow!(
                "unknown command `{cmd}` (type `help` for a list of commands)"
            ))
        }
    }

    state.sync();
    Ok(ReplControl::Continue)
}

fn print_help() {
    println!(
        r#"Commands:
  help | ?                        Show this help
  exit | quit                     Exit the REPL

  load <file.csv>                 Load a dataset and open its first column
  columns                         List columns with their types
  column <name>                   Switch to a column (its state is restored)
  status                          Show the active column, value and result counts
  summary [column]                Summarize a column

  ontologies                      Show the ontologies searches are restricted to
  ontology add <ACR>...           Add ontologies (at most 10)
  ontology rm <ACR>...            Remove ontologies
  ontology all | none             Select the first 10 of the catalog / clear
  catalog [filter]                List available ontologies

  results [-v]                    Show column results (-v toggles keys and links)
  select <N|uri>...               Check column results
  deselect <N|uri>...             Uncheck column results
  search <query...>               Search all terms; selections map to the query
  reset-search                    Go back to mapping the column itself

  values                          List the selectable values of the column
  value <value>                   Switch to a value and search it
  vresults                        Show value results
  vselect <N|uri>...              Check value results
  vdeselect <N|uri>...            Uncheck value results
  vsearch <query...>              Search all terms for the active value

  type <DataType> [column]        Convert a column (String, Categorical, Float, Integer, Boolean, Date)
  retag <label> <N|uri> <DataType>
                                  Change the type of one mapped term
  mappings                        Show all mappings
  remove <label>                  Remove a column mapping (and its value mappings)
  remove-term <label> <N|uri>     Remove one term from a column mapping
  remove-value <column> <value>   Remove a value mapping
  remove-value-term <column> <value> <N|uri>
                                  Remove one term from a value mapping

  preview                         Print the mapping tables as CSV
  schema [yaml|json|extended]     Print the generated schema
  export [dir]                    Write CSVs and schemas to a directory"#
    );
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_load(state: &mut ReplState, path: &Path) -> Result<()> {
    let dataset =
        Dataset::from_path(path).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))?;
    state.store.open_dataset(state.lookup.as_ref(), dataset)?;
    state.flush_notices();
    render::print_status(&state.store);
    Ok(())
}

fn cmd_columns(state: &ReplState) -> Result<()> {
    let dataset = state
        .store
        .dataset()
        .ok_or_else(|| anyhow!("no dataset loaded (use `load <file.csv>`)"))?;
    for column in dataset.columns() {
        let marker = if state.store.active_column() == Some(column.name.as_str()) {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        let mapped = if state.store.column_mapping(&column.name).is_some() {
            " mapped".green().to_string()
        } else {
            String::new()
        };
        println!(
            "{marker} {:<24} {}{mapped}",
            column.name,
            column.data_type.to_string().cyan()
        );
    }
    Ok(())
}

fn cmd_summary(state: &ReplState, column: Option<&str>) -> Result<()> {
    let dataset = state
        .store
        .dataset()
        .ok_or_else(|| anyhow!("no dataset loaded"))?;
    let column = match column {
        Some(c) => c.to_string(),
        None => active_column(state)?,
    };
    let summary = dataset.summary(&column)?;
    println!(
        "{} ({}): {}",
        column.bold(),
        dataset.data_type(&column)?.to_string().cyan(),
        render::summary_line(&summary)
    );
    Ok(())
}

fn cmd_ontologies(state: &ReplState) {
    let selected = state.store.ontologies();
    if selected.is_empty() {
        println!("(no ontologies selected)");
        return;
    }
    for acronym in selected.as_slice() {
        let name = state.store.ontology_full_name(acronym);
        if name == acronym {
            println!("  {}", acronym.bold());
        } else {
            println!("  {:<12} {name}", acronym.bold());
        }
    }
}

fn cmd_ontology(state: &mut ReplState, args: &[String]) -> Result<()> {
    let sub = args
        .first()
        .ok_or_else(|| anyhow!("usage: ontology add|rm|all|none ..."))?;
    let rest = &args[1..];
    match sub.as_str() {
        "add" => {
            if rest.is_empty() {
                return Err(anyhow!("usage: ontology add <ACRONYM>..."));
            }
            for acronym in rest {
                state.store.ontologies_mut().insert(acronym)?;
            }
        }
        "rm" | "remove" => {
            for acronym in rest {
                if !state.store.ontologies_mut().remove(acronym) {
                    println!("'{acronym}' was not selected");
                }
            }
        }
        "all" => {
            state.store.ensure_catalog(state.lookup.as_ref());
            let n = state.store.select_all_ontologies();
            println!("{n} ontologies selected");
        }
        "none" | "clear" => state.store.ontologies_mut().clear(),
        other => return Err(anyhow!("unknown ontology subcommand `{other}`")),
    }
    cmd_ontologies(state);
    Ok(())
}

fn cmd_catalog(state: &mut ReplState, filter: Option<&str>) {
    let catalog = state.store.ensure_catalog(state.lookup.as_ref());
    if catalog.is_empty() {
        return;
    }
    let shown = filter_catalog(catalog, filter.unwrap_or_default());
    for info in &shown {
        println!("{}", render::ontology_line(info));
    }
    println!("{} of {} ontologies", shown.len(), catalog.len());
}

fn cmd_values(state: &ReplState) -> Result<()> {
    let column = active_column(state)?;
    let dataset = state
        .store
        .dataset()
        .ok_or_else(|| anyhow!("no dataset loaded"))?;
    if !dataset.data_type(&column)?.is_textual() {
        println!("column '{column}' is not textual; value mapping is not offered");
        return Ok(());
    }
    for value in dataset.value_choices(&column)? {
        let marker = if state.store.active_value() == Some(value.as_str()) {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        let mapped = if state.store.value_mapping(&column, &value).is_some() {
            " mapped".green().to_string()
        } else {
            String::new()
        };
        println!("{marker} {value}{mapped}");
    }
    Ok(())
}

fn cmd_schema(state: &ReplState, format: &str) -> Result<()> {
    match format {
        "yaml" | "json" => {
            let Some(schema) = state.store.linkml_schema() else {
                println!("(no mappings)");
                return Ok(());
            };
            let text = if format == "yaml" {
                schema.to_yaml()?
            } else {
                schema.to_json()?
            };
            println!("{text}");
        }
        "extended" => {
            let Some(schema) = state.store.extended_schema() else {
                println!("(no mappings)");
                return Ok(());
            };
            println!("{}", schema.to_json()?);
        }
        other => return Err(anyhow!("unknown schema format `{other}` (yaml|json|extended)")),
    }
    Ok(())
}

// ============================================================================
// Argument helpers
// ============================================================================

fn active_column(state: &ReplState) -> Result<String> {
    state
        .store
        .active_column()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no column selected (use `column <name>`)"))
}

fn label_records<'a>(state: &'a ReplState, label: &str) -> Result<&'a [MappingRecord]> {
    state
        .store
        .column_mapping(label)
        .map(|m| m.records.as_slice())
        .ok_or_else(|| anyhow!("no mapping for '{label}'"))
}

/// Term URIs for 1-based result numbers (or literal URIs).
fn pick_terms(results: Option<&SearchResultSet>, args: &[String]) -> Result<Vec<String>> {
    let results = results.ok_or_else(|| anyhow!("no results to select from"))?;
    if args.is_empty() {
        return Err(anyhow!("expected one or more result numbers"));
    }
    args.iter()
        .map(|arg| match arg.parse::<usize>() {
            Ok(n) => results
                .get(n.wrapping_sub(1))
                .map(|t| t.term_uri.clone())
                .ok_or_else(|| anyhow!("no result #{n} (have {})", results.len())),
            Err(_) if results.contains(arg) => Ok(arg.clone()),
            Err(_) => Err(anyhow!("'{arg}' is not in the current results")),
        })
        .collect()
}

fn pick_record(records: &[MappingRecord], arg: &str) -> Result<String> {
    match arg.parse::<usize>() {
        Ok(n) => records
            .get(n.wrapping_sub(1))
            .map(|r| r.term_uri.clone())
            .ok_or_else(|| anyhow!("no mapped term #{n} (have {})", records.len())),
        Err(_) => Ok(arg.to_string()),
    }
}

fn split_command_line(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    out.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() || quoted {
        out.push(current);
    }

    out
}

// ============================================================================
// Completion
// ============================================================================

#[cfg(feature = "repl-rustyline")]
#[derive(Default)]
struct CompletionData {
    columns: Vec<String>,
    values: Vec<String>,
    labels: Vec<String>,
    ontologies: Vec<String>,
}

#[cfg(feature = "repl-rustyline")]
fn refresh_completion_data(
    completions: &std::sync::Arc<std::sync::RwLock<CompletionData>>,
    store: &SessionStore,
) {
    let Ok(mut data) = completions.write() else {
        return;
    };
    data.columns = store
        .dataset()
        .map(|ds| ds.column_names().into_iter().map(str::to_string).collect())
        .unwrap_or_default();
    data.values = match (store.dataset(), store.active_column()) {
        (Some(ds), Some(column)) => ds.value_choices(column).unwrap_or_default(),
        _ => Vec::new(),
    };
    data.labels = store.column_mappings().keys().cloned().collect();
    data.ontologies = store
        .catalog()
        .map(|c| c.iter().map(|o| o.acronym.clone()).collect())
        .unwrap_or_default();
}

#[cfg(feature = "repl-rustyline")]
struct ReplLineHelper {
    files: rustyline::completion::FilenameCompleter,
    data: std::sync::Arc<std::sync::RwLock<CompletionData>>,
}

#[cfg(feature = "repl-rustyline")]
impl ReplLineHelper {
    fn new(data: std::sync::Arc<std::sync::RwLock<CompletionData>>) -> Self {
        Self {
            files: rustyline::completion::FilenameCompleter::new(),
            data,
        }
    }

    fn pairs_from_prefix<S: AsRef<str>>(
        items: &[S],
        prefix: &str,
    ) -> Vec<rustyline::completion::Pair> {
        items
            .iter()
            .map(AsRef::as_ref)
            .filter(|item| item.starts_with(prefix))
            .map(|item| rustyline::completion::Pair {
                display: item.to_string(),
                replacement: item.to_string(),
            })
            .collect()
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::Helper for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::highlight::Highlighter for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::hint::Hinter for ReplLineHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::validate::Validator for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::completion::Completer for ReplLineHelper {
    type Candidate = rustyline::completion::Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &line[start..pos];
        let tokens: Vec<&str> = line[..start].split_whitespace().collect();

        if tokens.is_empty() {
            return Ok((start, Self::pairs_from_prefix(COMMANDS, word)));
        }
        if matches!(tokens[0], "load" | "export") {
            return self.files.complete(line, pos, ctx);
        }

        let Ok(data) = self.data.read() else {
            return Ok((start, Vec::new()));
        };
        let pairs = match (tokens[0], tokens.len()) {
            ("column" | "summary", 1) => Self::pairs_from_prefix(&data.columns, word),
            ("type", 2) | ("remove-value" | "remove-value-term", 1) => {
                Self::pairs_from_prefix(&data.columns, word)
            }
            ("type", 1) | ("retag", 3) => {
                let types: Vec<&str> = DataType::ALL.iter().map(|t| t.as_str()).collect();
                Self::pairs_from_prefix(&types, word)
            }
            ("value", 1) => Self::pairs_from_prefix(&data.values, word),
            ("remove" | "remove-term" | "retag", 1) => Self::pairs_from_prefix(&data.labels, word),
            ("ontology", 1) => Self::pairs_from_prefix(&["add", "rm", "all", "none"], word),
            ("ontology", _) => Self::pairs_from_prefix(&data.ontologies, word),
            ("schema", 1) => Self::pairs_from_prefix(&["yaml", "json", "extended"], word),
            _ => Vec::new(),
        };
        Ok((start, pairs))
    }
}
