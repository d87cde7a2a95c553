use super::*;
use crate::builders::rust::RustTarget;

const PETS: &str = r#"
types:
  - name: ShowPayload
    fields:
      - { name: id, type: string, required: true }
      - { name: name, type: string }
  - name: Owner
    fields:
      - { name: name, type: string, required: true }
      - { name: email, type: string, constraints: { format: email } }
  - name: Pet
    fields:
      - { name: id, type: string, required: true }
      - { name: name, type: string }
      - { name: owner, type: Owner }
      - { name: etag, type: string }
    views:
      - { name: tiny, fields: [id] }
      - { name: named, fields: [id, name] }
      - { name: card, result: PetCard, fields: [id, name] }
  - name: PetCard
    fields:
      - { name: id, type: string, required: true }
      - { name: name, type: string }
      - { name: badge, type: string, default: pet }
  - name: ListPayload
    fields:
      - { name: tags, type: "[]string", required: true }
      - { name: token, type: string, required: true }
  - name: PetList
    fields:
      - { name: pets, type: "[]Pet", required: true }
  - name: NotFound
    fields:
      - { name: message, type: string, required: true }
services:
  - name: pets
    endpoints:
      - name: show
        payload: ShowPayload
        result: Pet
        responses:
          - { status: 200, headers: [{ field: etag, name: ETag }] }
        errors:
          - { name: not_found, type: NotFound, status: 404 }
      - name: list
        payload: ListPayload
        result: PetList
        request:
          headers: [{ field: token, name: Authorization }]
          body: { attribute: tags }
        responses:
          - { status: 200, body: { attribute: pets } }
"#;

fn build(yaml: &str) -> crate::Result<ServiceDescriptors> {
    let schema = SchemaModel::parse_content(yaml).expect("schema parses");
    let target = RustTarget::new("pets", "clientgen_runtime");
    BodyDescriptorBuilder::new(&schema, &schema.services[0], &target).build()
}

fn endpoint<'d>(d: &'d ServiceDescriptors, name: &str) -> &'d EndpointDescriptor {
    d.endpoints.iter().find(|e| e.name == name).expect("endpoint")
}

#[test]
fn test_request_body_constructor() {
    let d = build(PETS).expect("build");
    let show = endpoint(&d, "show");
    let body = d.body(show.payload.request_body.expect("request body"));
    assert_eq!(body.type_name, "ShowRequestBody");
    assert_eq!(body.owner, BodyOwner::Request);
    assert_eq!(body.fields[0].representation, Representation::Value);
    assert_eq!(body.fields[1].representation, Representation::Optional);

    let init = d.init(body.init.expect("constructor"));
    assert_eq!(init.name, "new_show_request_body");
    let args: Vec<_> = init.args.iter().map(|a| (a.name.as_str(), a.type_ref.as_str())).collect();
    assert_eq!(args, vec![("id", "String"), ("name", "Option<String>")]);
    assert_eq!(init.returns.type_ref, "ShowRequestBody");
    assert!(init.returns.is_struct);
    assert!(init.code.contains("ShowRequestBody {"));
    assert!(body.validate.is_none());
}

#[test]
fn test_bare_request_body_needs_no_constructor() {
    let d = build(PETS).expect("build");
    let list = endpoint(&d, "list");
    let body = d.body(list.payload.request_body.expect("request body"));
    assert!(!body.declared);
    assert!(body.init.is_none());
    assert_eq!(body.type_ref, "Option<Vec<String>>");
    assert_eq!(body.fields.len(), 1);
    assert_eq!(body.fields[0].ident, "tags");
}

#[test]
fn test_result_constructor_takes_body_then_headers() {
    let d = build(PETS).expect("build");
    let show = endpoint(&d, "show");
    let response = &show.result.responses[0];
    let body = d.body(response.body.expect("response body"));
    assert_eq!(body.type_name, "ShowResponseBody");
    assert!(body.fields.iter().all(|f| f.representation.is_optional()));
    assert!(body.fields.iter().all(|f| f.ident != "etag"));

    let init = d.init(response.result_init.expect("result constructor"));
    assert_eq!(init.name, "new_show_pet");
    let args: Vec<_> = init.args.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(args, vec!["body", "etag"]);
    assert_eq!(init.args[0].type_ref, "&ShowResponseBody");
    assert_eq!(init.returns.type_ref, "pets::Pet");
    assert!(init.code.contains("id: body.id.clone().unwrap_or_default(),"));
}

#[test]
fn test_error_constructor() {
    let d = build(PETS).expect("build");
    let show = endpoint(&d, "show");
    let err = &show.errors[0];
    assert_eq!(err.status, 404);
    let body = d.body(err.body.expect("error body"));
    assert_eq!(body.type_name, "ShowNotFoundResponseBody");
    assert_eq!(body.owner, BodyOwner::Error);
    let init = d.init(err.result_init.expect("error constructor"));
    assert_eq!(init.name, "new_show_not_found");
    // required field decoded into an optional body field is checked
    assert!(body.validate.is_some());
}

#[test]
fn test_attribute_types_are_shared() {
    let d = build(PETS).expect("build");
    let names: Vec<_> = d
        .attribute_types
        .iter()
        .map(|id| d.body(*id).type_name.as_str())
        .collect();
    assert_eq!(names.iter().filter(|n| **n == "OwnerResponseBody").count(), 1);
    assert!(names.contains(&"PetResponseBody"));
    let owner = d
        .attribute_types
        .iter()
        .map(|id| d.body(*id))
        .find(|b| b.type_name == "OwnerResponseBody")
        .expect("owner attribute type");
    assert!(owner.validate.is_some());
}

#[test]
fn test_helpers_are_registered_once() {
    let d = build(PETS).expect("build");
    let names: Vec<_> = d.helpers.iter().map(|h| h.name.as_str()).collect();
    assert!(names.contains(&"unmarshal_owner_response_body_to_pets_owner"));
    assert!(names.contains(&"unmarshal_pet_response_body_to_pets_pet"));
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn test_expanded_type_for_viewed_result() {
    let d = build(PETS).expect("build");
    assert_eq!(d.expanded.len(), 1);
    let expanded = &d.expanded[0];
    assert_eq!(expanded.type_name, "PetExpanded");

    // one conversion per view, in declaration order
    let views: Vec<_> = expanded
        .views
        .iter()
        .map(|v| (v.function.as_str(), v.target_ref.as_str()))
        .collect();
    assert_eq!(
        views,
        vec![
            ("as_tiny_view", "pets::Pet"),
            ("as_named_view", "pets::Pet"),
            ("as_card_view", "pets::PetCard"),
        ]
    );

    let tiny = &expanded.views[0];
    assert!(tiny.code.contains("id: self.id.clone().unwrap_or_default(),"));
    assert!(tiny.code.contains("name: Default::default(),"));

    let card = &expanded.views[2];
    assert_eq!(card.target, "PetCard");
    assert!(card.code.contains("pets::PetCard {"));
    assert!(card.code.contains("name: self.name.clone(),"));
    assert!(card.code.contains("badge: "));
}

#[test]
fn test_view_field_type_must_match_result_type() {
    let yaml = PETS.replace(
        "      - { name: name, type: string }\n      - { name: badge",
        "      - { name: name, type: int64 }\n      - { name: badge",
    );
    match build(&yaml).unwrap_err() {
        Error::SchemaInconsistency { path, reason, .. } => {
            assert_eq!(path, "Pet.views[2].fields.name");
            assert!(reason.contains("PetCard"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_view_is_inconsistent() {
    let yaml = PETS.replace("{ status: 200, headers: [{ field: etag, name: ETag }] }", "{ status: 200, view: huge }");
    match build(&yaml).unwrap_err() {
        Error::SchemaInconsistency { service, endpoint, reason, .. } => {
            assert_eq!(service, "pets");
            assert_eq!(endpoint, "show");
            assert!(reason.contains("huge"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_body_field_is_inconsistent() {
    let yaml = PETS.replace("body: { attribute: tags }", "body: { attribute: missing }");
    assert!(matches!(build(&yaml), Err(Error::SchemaInconsistency { .. })));
}

#[test]
fn test_object_header_is_unsupported() {
    let yaml = PETS.replace("headers: [{ field: etag, name: ETag }]", "headers: [owner]");
    assert!(matches!(build(&yaml), Err(Error::UnsupportedFieldShape { .. })));
}

#[test]
fn test_build_is_deterministic() {
    let first = serde_json::to_string(&build(PETS).expect("build")).expect("serialize");
    for _ in 0..5 {
        let again = serde_json::to_string(&build(PETS).expect("build")).expect("serialize");
        assert_eq!(first, again);
    }
}

#[test]
fn test_object_request_header_is_unsupported() {
    let yaml = PETS.replace(
        "headers: [{ field: token, name: Authorization }]",
        "headers: [{ field: tags, name: X-Tags }, { field: owner, name: X-Owner }]",
    )
    .replace(
        "      - { name: token, type: string, required: true }",
        "      - { name: token, type: string, required: true }\n      - { name: owner, type: Owner }",
    );
    match build(&yaml).unwrap_err() {
        Error::UnsupportedFieldShape { path, kind, .. } => {
            assert_eq!(path, "pets.list.request.owner");
            assert_eq!(kind, "object");
        }
        other => panic!("unexpected error: {other}"),
    }
}

const BANK: &str = r#"
types:
  - name: Owner
    fields:
      - { name: name, type: string, required: true }
  - name: Account
    fields:
      - { name: owner, type: Owner }
      - { name: balance, type: int64 }
services:
  - name: bank
    endpoints:
      - name: owner
        payload: Account
        result: Account
        errors:
          - { name: account, type: Account, status: 409 }
"#;

#[test]
fn test_endpoint_bodies_do_not_take_attribute_type_names() {
    let d = build(BANK).expect("build");
    let ep = endpoint(&d, "owner");

    let request = d.body(ep.payload.request_body.expect("request body"));
    assert_eq!(request.type_name, "OwnerRequestBody2");
    assert!(request.fields.iter().any(|f| f.type_ref == "Option<Box<OwnerRequestBody>>"));
    let response = d.body(ep.result.responses[0].body.expect("response body"));
    assert_eq!(response.type_name, "OwnerResponseBody2");
    assert!(response.fields.iter().any(|f| f.type_ref == "Option<Box<OwnerResponseBody>>"));

    // the nested type keeps its own name and fields
    let owner = d
        .attribute_types
        .iter()
        .map(|id| d.body(*id))
        .find(|b| b.type_name == "OwnerResponseBody")
        .expect("owner response type");
    let fields: Vec<_> = owner.fields.iter().map(|f| f.ident.as_str()).collect();
    assert_eq!(fields, vec!["name"]);
    assert!(owner.validate.is_some());

    let declared: Vec<_> = d.bodies.iter().filter(|b| b.declared).map(|b| b.type_name.as_str()).collect();
    let unique: HashSet<_> = declared.iter().collect();
    assert_eq!(unique.len(), declared.len());
}

#[test]
fn test_constructor_names_are_unique() {
    let d = build(BANK).expect("build");
    let ep = endpoint(&d, "owner");
    let result = d.init(ep.result.responses[0].result_init.expect("result constructor"));
    let error = d.init(ep.errors[0].result_init.expect("error constructor"));
    assert_eq!(result.name, "new_owner_account");
    assert_eq!(error.name, "new_owner_account2");
}

#[test]
fn test_types_generating_the_same_name_are_inconsistent() {
    let yaml = BANK.replace("  - name: Account\n", "  - name: owner\n    fields: []\n  - name: Account\n");
    match build(&yaml).unwrap_err() {
        Error::SchemaInconsistency { path, reason, .. } => {
            assert_eq!(path, "types.owner");
            assert!(reason.contains("OwnerRequestBody"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
