use sonarup_types::*;

#[test]
fn test_project_key_grammar() {
    assert!(is_valid_project_key("k"));
    assert!(is_valid_project_key("org.acme:billing-service_2"));
    assert!(!is_valid_project_key("12345")); // digits only
    assert!(!is_valid_project_key("has space"));
    assert!(!is_valid_project_key("slash/key"));
    assert!(!is_valid_project_key(""));
}

#[test]
fn test_full_run_trims_fields() {
    let run = RunConfig::full(" k ", " n ", "main", "tkn", "./proj").unwrap();
    assert_eq!(run.project_key(), Some("k"));
    assert_eq!(run.project_name(), "n");
    assert_eq!(run.mode(), RunMode::Full);
}
