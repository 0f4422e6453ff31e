use apidoc_core::config::EnvelopeStyle;
use apidoc_core::parse;
use apidoc_core::parse::parameter::ParameterOrRef;
use apidoc_core::parse::spec::SwaggerSpec;
use apidoc_core::transform::analysis::{
    dangling_references, find_cycles, unreachable_definitions,
};
use apidoc_core::transform::conventions::{IDENTIFIER_DESCRIPTION, OFFSET_DESCRIPTION};
use apidoc_core::transform::{NormalizeOptions, normalize, normalize_with_options};

const CONTACTS: &str = include_str!("fixtures/contacts.swagger.json");
const PROFILES: &str = include_str!("fixtures/profiles.swagger.yaml");
const RINGS: &str = include_str!("fixtures/rings.swagger.json");

fn normalized_contacts() -> SwaggerSpec {
    let mut spec = parse::from_json(CONTACTS).unwrap();
    normalize(&mut spec).expect("contacts should normalize");
    spec
}

fn parameter_names(params: &[ParameterOrRef]) -> Vec<&str> {
    params
        .iter()
        .map(|p| match p {
            ParameterOrRef::Parameter(p) => p.name.as_str(),
            ParameterOrRef::Ref { ref_path } => ref_path.as_str(),
        })
        .collect()
}

fn to_value<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[test]
fn contacts_report() {
    let mut spec = parse::from_json(CONTACTS).unwrap();
    let report = normalize(&mut spec).unwrap();
    insta::assert_json_snapshot!(report, @r#"
    {
      "roots": [
        "contactsCreateContactRequest",
        "contactsUpdateContactRequest",
        "contactsListContactsResponse",
        "contactsCreateContactResponse",
        "contactsReadContactResponse",
        "contactsUpdateContactResponse",
        "contactsDeleteContactResponse",
        "rpcStatus"
      ],
      "synthesized": [
        "contactsGroup_In_contactsContact",
        "contactsContact"
      ],
      "pruned": [
        "contactsGroup",
        "contactsUnused"
      ]
    }
    "#);
}

#[test]
fn normalized_graph_is_acyclic_closed_and_reachable() {
    let original = parse::from_json(CONTACTS).unwrap();
    assert_eq!(
        find_cycles(&original),
        vec![vec!["contactsContact".to_string(), "contactsGroup".to_string()]]
    );
    assert_eq!(unreachable_definitions(&original), vec!["contactsUnused"]);

    let spec = normalized_contacts();
    assert!(find_cycles(&spec).is_empty());
    assert!(dangling_references(&spec).is_empty());
    assert!(unreachable_definitions(&spec).is_empty());
}

#[test]
fn contact_groups_point_at_flattened_group() {
    let spec = normalized_contacts();
    assert!(!spec.definitions.contains_key("contactsGroup"));
    assert!(!spec.definitions.contains_key("contactsUnused"));
    assert!(spec.definitions.contains_key("rpcStatus"));
    assert!(spec.definitions.contains_key("protobufAny"));

    let contact = to_value(&spec.definitions["contactsContact"]);
    assert_eq!(
        contact["properties"]["groups"]["items"]["$ref"],
        "#/definitions/contactsGroup_In_contactsContact"
    );
    assert_eq!(contact["properties"]["groups"]["type"], "array");
    assert_eq!(contact["x-go-package"], "contacts");
    assert_eq!(contact["required"][0], "first_name");

    let group = to_value(&spec.definitions["contactsGroup_In_contactsContact"]);
    assert!(group["properties"].get("contacts").is_none());
    assert_eq!(group["properties"]["name"]["type"], "string");
    assert_eq!(group["required"], serde_json::json!(["name"]));
}

#[test]
fn identifier_properties_are_described_and_read_only() {
    let spec = normalized_contacts();
    for name in ["contactsContact", "contactsGroup_In_contactsContact"] {
        let id = to_value(&spec.definitions[name])["properties"]["id"].clone();
        assert_eq!(id["description"], IDENTIFIER_DESCRIPTION, "{name}");
        assert_eq!(id["readOnly"], true, "{name}");
        assert_eq!(id["$ref"], "#/definitions/atlasrpcIdentifier", "{name}");
    }
}

#[test]
fn collection_parameters_are_expanded() {
    let spec = normalized_contacts();
    let list = spec.paths["/contacts"].get.as_ref().unwrap();
    assert_eq!(
        parameter_names(&list.parameters),
        vec!["_filter", "_order_by", "_fields", "_offset", "_limit", "_page_token"]
    );
    let offset = to_value(&list.parameters[3]);
    assert_eq!(offset["in"], "query");
    assert_eq!(offset["type"], "integer");
    assert_eq!(offset["description"], OFFSET_DESCRIPTION);
}

#[test]
fn identifier_paths_collapse_onto_id() {
    let spec = normalized_contacts();
    assert_eq!(
        spec.paths.keys().collect::<Vec<_>>(),
        vec!["/contacts", "/contacts/{id}"]
    );

    let item = &spec.paths["/contacts/{id}"];
    let read = item.get.as_ref().unwrap();
    assert_eq!(parameter_names(&read.parameters), vec!["id", "_fields"]);
    assert_eq!(
        to_value(&read.parameters[0])["description"],
        IDENTIFIER_DESCRIPTION
    );

    let update = item.put.as_ref().expect("PUT merged from the payload path");
    assert_eq!(parameter_names(&update.parameters), vec!["id", "body"]);
    let delete = item.delete.as_ref().unwrap();
    assert_eq!(parameter_names(&delete.parameters), vec!["id"]);
}

#[test]
fn success_responses_move_to_verb_codes() {
    let spec = normalized_contacts();
    let collection = &spec.paths["/contacts"];
    let item = &spec.paths["/contacts/{id}"];

    let cases = [
        (collection.get.as_ref().unwrap(), "200", "OK"),
        (collection.post.as_ref().unwrap(), "201", "CREATED"),
        (item.get.as_ref().unwrap(), "200", "OK"),
        (item.put.as_ref().unwrap(), "202", "UPDATED"),
        (item.delete.as_ref().unwrap(), "203", "DELETED"),
    ];
    for (op, code, status) in cases {
        let keys: Vec<&str> = op.responses.keys().map(String::as_str).collect();
        assert!(keys.contains(&code), "{code} missing from {keys:?}");
        assert!(keys.contains(&"default"));
        if code != "200" {
            assert!(!keys.contains(&"200"));
        }

        let body = to_value(&op.responses[code]);
        let success = &body["schema"]["properties"]["success"]["properties"];
        assert_eq!(success["status"]["example"], status);
        assert_eq!(success["code"]["example"], code.parse::<u16>().unwrap());
        assert_eq!(success["message"]["example"], "<response message>");
        assert!(body["schema"]["properties"]["results"]["$ref"].is_string());
    }
}

#[test]
fn inline_envelope_extends_response_definitions() {
    let mut spec = parse::from_json(CONTACTS).unwrap();
    let options = NormalizeOptions {
        envelope: EnvelopeStyle::Inline,
        ..NormalizeOptions::default()
    };
    normalize_with_options(&mut spec, &options).unwrap();

    let create = spec.paths["/contacts"].post.as_ref().unwrap();
    let body = to_value(&create.responses["201"]);
    assert_eq!(
        body["schema"]["$ref"],
        "#/definitions/contactsCreateContactResponse"
    );
    let target = to_value(&spec.definitions["contactsCreateContactResponse"]);
    assert_eq!(
        target["properties"]["success"]["properties"]["status"]["example"],
        "CREATED"
    );
    assert!(find_cycles(&spec).is_empty());
    assert!(dangling_references(&spec).is_empty());
}

#[test]
fn profiles_self_reference_and_map_body() {
    let mut spec = parse::from_yaml(PROFILES).unwrap();
    let report = normalize(&mut spec).unwrap();
    assert_eq!(report.roots, vec!["profilesGroup", "profilesProfile"]);
    assert_eq!(report.synthesized, vec!["profilesProfile"]);
    assert_eq!(report.pruned, vec!["profilesLegacy"]);

    let item = &spec.paths["/profiles/{id}/groups"];
    assert_eq!(parameter_names(&item.parameters), vec!["id"]);

    let list = item.get.as_ref().unwrap();
    assert_eq!(
        parameter_names(&list.parameters),
        vec!["_offset", "_limit", "_page_token"]
    );
    let ok = to_value(&list.responses["200"]);
    assert_eq!(
        ok["schema"]["properties"]["results"]["items"]["$ref"],
        "#/definitions/profilesGroup"
    );

    // PATCH has no success code of its own and keeps its response as is.
    let patch = item.patch.as_ref().unwrap();
    let ok = to_value(&patch.responses["200"]);
    assert_eq!(ok["schema"]["$ref"], "#/definitions/profilesProfile");

    let profile = to_value(&spec.definitions["profilesProfile"]);
    assert!(profile["properties"].get("parent").is_none());
    assert_eq!(profile["required"], serde_json::json!(["name"]));
    assert_eq!(profile["properties"]["id"]["readOnly"], true);

    assert!(find_cycles(&spec).is_empty());
    assert!(dangling_references(&spec).is_empty());
    assert!(unreachable_definitions(&spec).is_empty());
    assert_eq!(spec.extensions["x-service"], "profiles");
}

#[test]
fn normalized_output_parses_back() {
    let spec = normalized_contacts();
    let json = parse::to_json(&spec).unwrap();
    assert_eq!(parse::from_json(&json).unwrap(), spec);
    let yaml = parse::to_yaml(&spec).unwrap();
    assert_eq!(parse::from_yaml(&yaml).unwrap(), spec);
}

#[test]
fn two_roots_entering_one_ring_keep_only_reachable_drafts() {
    let mut spec = parse::from_json(RINGS).unwrap();
    let report = normalize(&mut spec).unwrap();
    assert_eq!(report.roots, vec!["ringsAccount", "ringsTeam"]);
    assert_eq!(
        report.synthesized,
        vec![
            "ringsBilling_In_ringsAccount",
            "ringsAccount",
            "ringsOwner_In_ringsBilling_In_ringsAccount_In_ringsTeam",
        ]
    );
    assert_eq!(report.pruned, vec!["ringsBilling", "ringsOwner"]);
    assert_eq!(
        spec.definitions.keys().collect::<Vec<_>>(),
        vec![
            "ringsAccount",
            "ringsTeam",
            "ringsBilling_In_ringsAccount",
            "ringsOwner_In_ringsBilling_In_ringsAccount_In_ringsTeam",
        ]
    );

    // The walk from ringsTeam restages the billing draft; its owner now
    // points at the draft built on that walk.
    let billing = to_value(&spec.definitions["ringsBilling_In_ringsAccount"]);
    assert!(billing["properties"].get("account").is_none());
    assert_eq!(
        billing["properties"]["owner"]["$ref"],
        "#/definitions/ringsOwner_In_ringsBilling_In_ringsAccount_In_ringsTeam"
    );
    let owner = to_value(&spec.definitions["ringsOwner_In_ringsBilling_In_ringsAccount_In_ringsTeam"]);
    assert!(owner["properties"].get("team").is_none());
    assert_eq!(owner["properties"]["email"]["type"], "string");

    let team = to_value(&spec.definitions["ringsTeam"]);
    assert_eq!(team["properties"]["account"]["$ref"], "#/definitions/ringsAccount");

    assert!(find_cycles(&spec).is_empty());
    assert!(dangling_references(&spec).is_empty());
    assert!(unreachable_definitions(&spec).is_empty());
}
