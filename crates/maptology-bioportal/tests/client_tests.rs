//! Client tests against a one-shot local HTTP responder.

use maptology_bioportal::{BioPortalClient, BioPortalConfig, OntologyNameCache};
use maptology_core::{LookupError, LookupQuery, SearchMode, TermLookup};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;

/// Serve exactly one request with `status` and `body`; the handle yields the
/// request line that was received.
fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let status = status.to_string();
    let body = body.to_string();
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request_line.trim_end().to_string()
    });
    (base, handle)
}

fn client(base: &str, api_key: Option<&str>) -> BioPortalClient {
    let config = BioPortalConfig::default()
        .with_api_key(api_key.map(str::to_string))
        .with_base_url(base)
        .unwrap();
    BioPortalClient::new(config)
        .unwrap()
        .with_name_cache(OntologyNameCache::new())
}

fn query(text: &str, ontologies: &[&str], mode: SearchMode) -> LookupQuery {
    let ontologies: Vec<String> = ontologies.iter().map(|o| o.to_string()).collect();
    LookupQuery::new(text, &ontologies, mode)
}

const SEARCH_BODY: &str = r#"{
    "collection": [
        {
            "@id": "http://purl.obolibrary.org/obo/OMIT_0013622",
            "prefLabel": "Sex",
            "definition": ["The biological sex"],
            "links": {"ontology": "https://data.bioontology.org/ontologies/OMIT"}
        },
        {
            "@id": "http://ncicb.nci.nih.gov/xml/owl/EVS/Thesaurus.owl#C28421",
            "prefLabel": "Gender",
            "links": {"ontology": "https://data.bioontology.org/ontologies/NCIT"}
        },
        {
            "@id": "http://snomed.info/id/248153007",
            "prefLabel": "Male",
            "definition": ["male"],
            "links": {"ontology": "https://data.bioontology.org/ontologies/SNOMEDCT"}
        }
    ],
    "totalCount": 3
}"#;

#[test]
fn auto_search_sends_restriction_and_shapes_results() {
    let (base, handle) = serve_once("200 OK", SEARCH_BODY);
    let client = client(&base, Some("k3y"));

    let terms = client
        .search(&query("sex", &["OMIT", "NCIT"], SearchMode::Auto))
        .unwrap();

    let request = handle.join().unwrap();
    assert!(request.starts_with("GET /search?"), "{request}");
    assert!(request.contains("q=sex"));
    assert!(request.contains("apikey=k3y"));
    assert!(request.contains("ontologies=OMIT%2CNCIT"));
    assert!(!request.contains("pagesize"));

    // Gender has no definition; SNOMEDCT is not selected.
    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].preferred_label, "Sex");
    assert_eq!(terms[0].ontology_abbreviation, "OMIT");
}

#[test]
fn search_all_requests_a_large_page_and_keeps_undefined_terms() {
    let (base, handle) = serve_once("200 OK", SEARCH_BODY);
    let client = client(&base, Some("k3y"));

    let terms = client
        .search(&query("sex", &["OMIT", "NCIT"], SearchMode::All))
        .unwrap();

    assert!(handle.join().unwrap().contains("pagesize=100"));
    let labels: Vec<&str> = terms.iter().map(|t| t.preferred_label.as_str()).collect();
    assert_eq!(labels, vec!["Gender", "Sex"]);
    assert_eq!(terms[0].definition, None);
}

#[test]
fn missing_key_never_touches_the_network() {
    // Nothing listens here; a request would be a transport error instead.
    let client = client("http://127.0.0.1:9", None);
    let err = client
        .search(&query("sex", &["OMIT"], SearchMode::Auto))
        .unwrap_err();
    assert!(matches!(err, LookupError::MissingCredential));
    assert!(matches!(client.catalog(), Err(LookupError::MissingCredential)));
    assert_eq!(client.ontology_name("OMIT"), "OMIT");
}

#[test]
fn non_success_status_is_reported() {
    let (base, handle) = serve_once("401 Unauthorized", r#"{"errors":["bad key"]}"#);
    let client = client(&base, Some("wrong"));
    let err = client
        .search(&query("sex", &["OMIT"], SearchMode::Auto))
        .unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, LookupError::Status { status: 401 }));
}

#[test]
fn malformed_body_is_a_decode_error() {
    let (base, handle) = serve_once("200 OK", "<html>maintenance</html>");
    let client = client(&base, Some("k3y"));
    let err = client
        .search(&query("sex", &["OMIT"], SearchMode::Auto))
        .unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, LookupError::Decode(_)));
}

#[test]
fn catalog_is_shaped() {
    let body = r#"[
        {"acronym": "OMIT", "name": "Ontology for MIRNA Target", "description": "miRNA"},
        {"acronym": "", "name": "Nameless"},
        {"acronym": "MESH", "name": "Medical Subject Headings"}
    ]"#;
    let (base, handle) = serve_once("200 OK", body);
    let client = client(&base, Some("k3y"));
    let catalog = client.catalog().unwrap();
    assert!(handle.join().unwrap().starts_with("GET /ontologies?apikey=k3y"));
    let acronyms: Vec<&str> = catalog.iter().map(|o| o.acronym.as_str()).collect();
    assert_eq!(acronyms, vec!["MESH", "OMIT"]);
}

#[test]
fn ontology_names_are_fetched_once() {
    let (base, handle) = serve_once(
        "200 OK",
        r#"{"acronym": "OMIT", "name": "Ontology for MIRNA Target"}"#,
    );
    let client = client(&base, Some("k3y"));

    assert_eq!(client.ontology_name("OMIT"), "Ontology for MIRNA Target");
    assert!(handle.join().unwrap().starts_with("GET /ontologies/OMIT?apikey=k3y"));
    // The responder is gone; this must come from the cache.
    assert_eq!(client.ontology_name("OMIT"), "Ontology for MIRNA Target");
    assert_eq!(client.name_cache().len(), 1);
}

#[test]
fn failed_name_lookups_cache_the_acronym() {
    let (base, handle) = serve_once("404 Not Found", "{}");
    let client = client(&base, Some("k3y"));
    assert_eq!(client.ontology_name("NOPE"), "NOPE");
    handle.join().unwrap();
    assert_eq!(client.name_cache().get("NOPE").as_deref(), Some("NOPE"));
}
