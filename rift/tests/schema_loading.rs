use rift::schema::{
    load_schema, ConstValue, Requiredness, StructKind, TypeRef,
};

#[test]
fn test_load_addressbook() {
    let schema = load_schema("examples/addressbook.thrift").unwrap();

    let phone_type = schema.enum_def("addressbook.PhoneType").unwrap();
    assert_eq!(
        phone_type.members,
        vec![
            ("MOBILE".to_string(), 0),
            ("HOME".to_string(), 1),
            ("WORK".to_string(), 2)
        ]
    );
    assert_eq!(phone_type.default_symbol(), Some("MOBILE"));

    let phone_number = schema.struct_def("addressbook.PhoneNumber").unwrap();
    assert_eq!(phone_number.kind, StructKind::Struct);
    assert_eq!(phone_number.fields.len(), 2);
    let ty_field = &phone_number.fields[0];
    assert_eq!(ty_field.id, 1);
    assert_eq!(ty_field.requiredness, Requiredness::Optional);
    assert_eq!(ty_field.ty, TypeRef::Enum("addressbook.PhoneType".into()));
    assert_eq!(ty_field.default, Some(ConstValue::Int(0)));
    let number_field = &phone_number.fields[1];
    assert_eq!(number_field.id, 2);
    assert_eq!(number_field.ty, TypeRef::String);
    assert_eq!(number_field.default, None);

    let service = schema.service_def("addressbook.AddressBookService").unwrap();
    assert_eq!(service.methods.len(), 9);
    let names: Vec<&str> = service.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "ping",
            "hello",
            "add",
            "remove",
            "get",
            "book",
            "get_phonenumbers",
            "get_phones",
            "sleep"
        ]
    );

    let sleep = schema
        .method("addressbook.AddressBookService", "sleep")
        .unwrap();
    assert_eq!(sleep.returns, Some(TypeRef::Bool));
    assert_eq!(sleep.args.fields.len(), 1);
    assert_eq!(sleep.args.fields[0].id, 1);
    assert_eq!(sleep.args.fields[0].ty, TypeRef::I16);
    assert_eq!(sleep.args.fields[0].name, "ms");
}

#[test]
fn test_addressbook_constants_and_typedefs() {
    let schema = load_schema("examples/addressbook.thrift").unwrap();

    let module = schema.module("addressbook").unwrap();
    let size = module.constant("DEFAULT_LIST_SIZE").unwrap();
    assert_eq!(size.ty, TypeRef::I16);
    assert_eq!(size.value, ConstValue::Int(10));

    let timestamp = schema.typedef_def("addressbook.timestamp").unwrap();
    assert_eq!(timestamp.target, TypeRef::I32);
    // The alias is transparent everywhere semantics matter.
    assert_eq!(
        schema.resolve_alias(&TypeRef::Typedef("addressbook.timestamp".into())),
        &TypeRef::I32
    );

    let exc = schema
        .struct_def("addressbook.PersonNotExistsError")
        .unwrap();
    assert_eq!(exc.kind, StructKind::Exception);
    assert_eq!(
        exc.fields[0].default,
        Some(ConstValue::Str("Person Not Exists!".into()))
    );
}

#[test]
fn test_parse_determinism() {
    let first = load_schema("examples/addressbook.thrift").unwrap();
    let second = load_schema("examples/addressbook.thrift").unwrap();

    let mut names: Vec<String> = first.registry().names().map(String::from).collect();
    let mut names2: Vec<String> = second.registry().names().map(String::from).collect();
    names.sort();
    names2.sort();
    assert_eq!(names, names2);

    for name in &names {
        match (first.struct_def(name), second.struct_def(name)) {
            (Some(a), Some(b)) => assert_eq!(a, b),
            (None, None) => {}
            _ => panic!("registry disagreement on `{}`", name),
        }
        match (first.enum_def(name), second.enum_def(name)) {
            (Some(a), Some(b)) => assert_eq!(a, b),
            (None, None) => {}
            _ => panic!("registry disagreement on `{}`", name),
        }
    }

    let a = first.service_methods("addressbook.AddressBookService");
    let b = second.service_methods("addressbook.AddressBookService");
    assert_eq!(a.len(), b.len());
    for (ma, mb) in a.iter().zip(&b) {
        assert_eq!(ma.name, mb.name);
        assert_eq!(ma.args, mb.args);
        assert_eq!(ma.result, mb.result);
    }
}

#[test]
fn test_load_tracker_union_and_inheritance() {
    let schema = load_schema("tests/schemas/tracker.thrift").unwrap();

    let payload = schema.struct_def("tracker.Payload").unwrap();
    assert_eq!(payload.kind, StructKind::Union);
    assert!(payload
        .fields
        .iter()
        .all(|f| f.requiredness == Requiredness::Optional));
    assert_eq!(payload.fields[1].ty, TypeRef::Binary);

    let event = schema.struct_def("tracker.Event").unwrap();
    assert!(event.fields[0].is_required());
    assert_eq!(event.fields[1].default, Some(ConstValue::Int(1)));

    // Inherited methods resolve through the extends chain.
    assert!(schema.method("tracker.Tracker", "ping").is_some());
    assert_eq!(schema.service_methods("tracker.Tracker").len(), 4);

    let nudge = schema.method("tracker.Tracker", "nudge").unwrap();
    assert!(nudge.oneway);
    assert!(nudge.result.fields.is_empty());

    let module = schema.module("tracker").unwrap();
    assert_eq!(
        module.constant("SEED_TAGS").unwrap().value,
        ConstValue::List(vec![
            ConstValue::Str("alpha".into()),
            ConstValue::Str("beta".into())
        ])
    );
    assert_eq!(
        module.constant("LIMITS").unwrap().value,
        ConstValue::Map(vec![
            (ConstValue::Str("queue".into()), ConstValue::Int(128)),
            (ConstValue::Str("batch".into()), ConstValue::Int(16)),
        ])
    );
}
