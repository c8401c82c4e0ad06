//! Loads the AddressBook schema, encodes a Person over the binary protocol,
//! and decodes it back.

use rift::protocol::{read_struct, write_struct, BinaryProtocol};
use rift::schema::load_schema;
use rift::transport::MemoryTransport;
use rift::value::{StructValue, Value};

fn main() {
    let schema = load_schema(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/examples/addressbook.thrift"
    ))
    .expect("schema loads");

    let def = schema
        .struct_def("addressbook.Person")
        .expect("Person is declared")
        .clone();

    let person = StructValue::new("addressbook.Person")
        .with_field(1, Value::String("Alice".into()))
        .with_field(
            2,
            Value::List(vec![Value::Struct(
                StructValue::new("addressbook.PhoneNumber")
                    .with_field(1, Value::I32(2))
                    .with_field(2, Value::String("555".into())),
            )]),
        )
        .with_field(3, Value::I32(1_700_000_000));

    let mut prot = BinaryProtocol::new(MemoryTransport::new());
    write_struct(&mut prot, &schema, &def, &person).expect("encodes");
    println!(
        "encoded Person in {} bytes",
        prot.transport_mut().bytes().len()
    );

    let decoded = read_struct(&mut prot, &schema, &def).expect("decodes");
    assert_eq!(decoded, person);
    println!(
        "decoded name: {:?}",
        decoded.get(1).and_then(Value::as_str)
    );
}
