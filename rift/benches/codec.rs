use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rift::protocol::{read_struct, write_struct, BinaryProtocol, CompactProtocol, Protocol};
use rift::schema::load_schema;
use rift::transport::MemoryTransport;
use rift::value::{StructValue, Value};

fn sample_person() -> StructValue {
    StructValue::new("addressbook.Person")
        .with_field(1, Value::String("Alice Example".into()))
        .with_field(
            2,
            Value::List(
                (0..8)
                    .map(|i| {
                        Value::Struct(
                            StructValue::new("addressbook.PhoneNumber")
                                .with_field(1, Value::I32(i % 3))
                                .with_field(2, Value::String(format!("555-010{}", i))),
                        )
                    })
                    .collect(),
            ),
        )
        .with_field(3, Value::I32(1_700_000_000))
}

fn bench_binary_round_trip(c: &mut Criterion) {
    let schema = load_schema(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/examples/addressbook.thrift"
    ))
    .unwrap();
    let def = schema.struct_def("addressbook.Person").unwrap().clone();
    let person = sample_person();

    c.bench_function("binary_person_round_trip", |b| {
        b.iter(|| {
            let mut prot = BinaryProtocol::new(MemoryTransport::new());
            write_struct(&mut prot, &schema, &def, &person).unwrap();
            let decoded = read_struct(&mut prot, &schema, &def).unwrap();
            black_box(decoded);
        });
    });
}

fn bench_compact_round_trip(c: &mut Criterion) {
    let schema = load_schema(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/examples/addressbook.thrift"
    ))
    .unwrap();
    let def = schema.struct_def("addressbook.Person").unwrap().clone();
    let person = sample_person();

    c.bench_function("compact_person_round_trip", |b| {
        b.iter(|| {
            let mut prot = CompactProtocol::new(MemoryTransport::new());
            write_struct(&mut prot, &schema, &def, &person).unwrap();
            let decoded = read_struct(&mut prot, &schema, &def).unwrap();
            black_box(decoded);
        });
    });
}

fn bench_schema_load(c: &mut Criterion) {
    c.bench_function("load_addressbook_schema", |b| {
        b.iter(|| {
            let schema = load_schema(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/examples/addressbook.thrift"
            ))
            .unwrap();
            black_box(schema);
        });
    });
}

criterion_group!(
    benches,
    bench_binary_round_trip,
    bench_compact_round_trip,
    bench_schema_load
);
criterion_main!(benches);
