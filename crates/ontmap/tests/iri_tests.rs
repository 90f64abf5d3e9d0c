use ontmap::model::iri::IriMinter;
use ontmap::model::ontology::map;

const BASE: &str = "http://example.org/mapping";

fn minter() -> IriMinter {
    IriMinter::new(BASE)
}

// --- Base ---

#[test]
fn base_trailing_separators_are_trimmed() {
    assert_eq!(IriMinter::new("http://example.org/mapping/").base_uri(), BASE);
    assert_eq!(IriMinter::new("http://example.org/mapping#").base_uri(), BASE);
}

// --- Context IRI ---

#[test]
fn context_iri_uses_local_names() {
    let m = minter();
    assert_eq!(
        m.context_iri("http://ex.org/src#Person", "http://ex.org/tgt/User"),
        "http://example.org/mapping#Context-Person-User"
    );
}

#[test]
fn context_iri_escapes_special_chars() {
    let m = minter();
    assert_eq!(
        m.context_iri("urn:x:A B", "urn:x:C"),
        "http://example.org/mapping#Context-A%20B-C"
    );
}

// --- Rule and bridge IRIs ---

#[test]
fn rule_and_bridge_iris_are_numbered() {
    let m = minter();
    assert_eq!(m.rule_iri(3), "http://example.org/mapping#Rule-3");
    assert_eq!(m.bridge_iri(3), "http://example.org/mapping#Bridge-3");
}

// --- Templates and variables ---

#[test]
fn template_iri_embeds_key() {
    assert_eq!(
        IriMinter::template_iri("1-3--2-10-1"),
        format!("{}Mapping-1-3--2-10-1", map::NS)
    );
}

#[test]
fn variable_iri_is_positional() {
    assert_eq!(IriMinter::variable_iri(2), format!("{}_arg2", map::NS));
}

// --- UUIDs ---

#[test]
fn uuid_iri_is_stable() {
    let a = IriMinter::uuid_iri("http://ex.org/p1");
    let b = IriMinter::uuid_iri("http://ex.org/p1");
    let c = IriMinter::uuid_iri("http://ex.org/p2");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("urn:uuid:"));
    assert_eq!(a.len(), "urn:uuid:".len() + 36);
}

// --- URI templates ---

#[test]
fn fill_template_substitutes_positions() {
    let out = IriMinter::fill_template(
        "http://ex.org/user/{?2}/{?1}",
        &["ann".to_string(), "lee".to_string()],
    );
    assert_eq!(out.as_deref(), Some("http://ex.org/user/lee/ann"));
}

#[test]
fn fill_template_escapes_values() {
    let out = IriMinter::fill_template("http://ex.org/{?1}", &["a b/c".to_string()]);
    assert_eq!(out.as_deref(), Some("http://ex.org/a%20b%2Fc"));
}

#[test]
fn fill_template_missing_value() {
    assert_eq!(IriMinter::fill_template("http://ex.org/{?2}", &["a".to_string()]), None);
    assert_eq!(IriMinter::fill_template("http://ex.org/{?0}", &["a".to_string()]), None);
    assert_eq!(IriMinter::fill_template("http://ex.org/{?1", &["a".to_string()]), None);
}

#[test]
fn fill_template_without_placeholders() {
    assert_eq!(
        IriMinter::fill_template("http://ex.org/fixed", &[]).as_deref(),
        Some("http://ex.org/fixed")
    );
}
