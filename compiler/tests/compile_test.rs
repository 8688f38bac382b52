#![cfg(test)]

use std::fs;

use defc_compiler::{compile_files, compile_with, CompileOptions, DefError, MemorySource, Registry};
use defc_schema::{
    DefinitionKind, EmptyCheck, FieldType, MaxSize, PackStrategy, Placement, PrimitiveType,
    ResetPolicy, SizePrefix, SqlType, Visibility,
};

fn compile(source: MemorySource, files: &[&str]) -> Result<Registry, DefError> {
    compile_with(source, &CompileOptions::default(), files).map(|c| c.into_registry())
}

#[test]
fn test_enum_three_elements() {
    let source = MemorySource::new().with("types/Color.the", "Colors of a thing.\n-\nRED\nGREEN\nBLUE\n");
    let registry = compile(source, &["types/Color.the"]).expect("compile failed");

    let color = registry.lookup("Color").expect("Color missing");
    assert_eq!(color.kind(), DefinitionKind::Enum);
    assert_eq!(color.doc, "Colors of a thing.");
    let def = color.as_enum().unwrap();
    assert_eq!(def.elements.len(), 4);
    assert_eq!(def.elements.last().map(|e| e.name.as_str()), Some("VALUE_INVALID"));
    assert_eq!(def.underlying, PrimitiveType::UInt8);
}

#[test]
fn test_bitfield_shifts() {
    let source = MemorySource::new().with("Mode.btx", "flag_a(1), flag_b(2), flag_c(5)\n");
    let registry = compile(source, &["Mode.btx"]).expect("compile failed");

    let def = registry.lookup("Mode").and_then(|d| d.as_bitfield()).unwrap();
    assert_eq!(def.underlying.bits(), 8);
    assert_eq!(def.shift_table(), vec![("flag_a", 0), ("flag_b", 1), ("flag_c", 3)]);
}

#[test]
fn test_protocol_layout() {
    let source = MemorySource::new().with(
        "net/Packet.thx",
        "A packet.\n-\nuint32_t foo\nuint8_t bar\nuint8_t[var] payload\n",
    );
    let registry = compile(source, &["net/Packet.thx"]).expect("compile failed");

    let packet = registry.lookup("Packet").unwrap();
    let def = packet.as_protocol().unwrap();
    assert_eq!(def.static_size, 5);
    assert_eq!(def.offset_of("foo"), Some(0));
    assert_eq!(def.offset_of("bar"), Some(4));

    let payload = packet.field("payload").unwrap();
    assert_eq!(payload.placement, Placement::Trailing { prefix: SizePrefix::U8, index: 0 });
    assert_eq!(payload.policy.pack, PackStrategy::LengthPrefixed(SizePrefix::U8));
    assert_eq!(payload.policy.reset, ResetPolicy::Clear);
}

#[test]
fn test_protocol_fixed_offsets_sum() {
    let source = MemorySource::new()
        .with("e/Kind.the", "A\nB\n")
        .with("b/Bits.btx", "x(4), y(12)\n")
        .with(
            "Frame.thx",
            "-\nenum e/Kind\nbit b/Bits\n-\nKind kind\nBits bits\nuint16_t[3] samples\n~int64_t old\nuint8_t lo(3), hi(5)\nvirtual uint32_t crc\n",
        );
    let registry = compile(source, &["Frame.thx"]).expect("compile failed");

    let frame = registry.lookup("Frame").unwrap();
    let def = frame.as_protocol().unwrap();
    let offsets: Vec<Option<usize>> = frame.fields().iter().map(|f| f.offset()).collect();
    assert_eq!(offsets, vec![Some(0), Some(1), Some(3), Some(9), Some(17), Some(18)]);
    assert_eq!(def.static_size, 22);

    let old = frame.field("old").unwrap();
    assert!(old.is_deprecated);
    assert_eq!(frame.active_fields().count(), 5);

    let squeeze = frame.field("lo_hi").unwrap();
    match &squeeze.ty {
        FieldType::Squeeze { storage, slots } => {
            assert_eq!(*storage, PrimitiveType::UInt8);
            assert_eq!(slots.iter().map(|s| s.shift).collect::<Vec<_>>(), vec![0, 3]);
        }
        other => panic!("expected a squeeze, got {:?}", other),
    }

    assert_eq!(frame.field("crc").unwrap().policy.pack, PackStrategy::Deferred);
    assert_eq!(frame.field("kind").unwrap().storage(), Some(PrimitiveType::UInt8));
    assert_eq!(frame.field("bits").unwrap().storage(), Some(PrimitiveType::UInt16));
}

#[test]
fn test_shared_import_is_memoized() {
    let source = MemorySource::new()
        .with("types/Color.the", "RED\nGREEN\n")
        .with("A.thx", "-\nenum types/Color.the\n-\nColor color\n")
        .with("B.thx", "import ./types/../types/Color.the\nColor tint\n");
    let compilation = compile_with(source, &CompileOptions::default(), &["A.thx", "B.thx"])
        .expect("compile failed");
    let registry = compilation.registry();

    assert_eq!(registry.len(), 3);
    let a = registry.lookup("A").unwrap();
    let b = registry.lookup("B").unwrap();
    assert_eq!(a.imports, b.imports);
    assert!(std::ptr::eq(&registry[a.imports[0]], &registry[b.imports[0]]));
    assert_eq!(registry.import_closure(a.id), vec![a.imports[0]]);
    assert_eq!(registry.find_path("./types/Color.the"), Some(a.imports[0]));
    assert_eq!(registry.find_path("types/Missing.the"), None);
    assert_eq!(compilation.roots().len(), 2);
}

#[test]
fn test_unknown_type() {
    let source = MemorySource::new().with("P.thx", "Color color\n");
    assert!(matches!(
        compile(source, &["P.thx"]),
        Err(DefError::UnknownType { line: 1, .. })
    ));

    // the import comes after its first use
    let source = MemorySource::new()
        .with("Color.the", "RED\n")
        .with("P.thx", "Color color\nimport Color.the\n");
    assert!(matches!(compile(source, &["P.thx"]), Err(DefError::UnknownType { .. })));
}

#[test]
fn test_cyclic_imports() {
    let source = MemorySource::new().with("Node.tbx", "import Node.tbx\n");
    assert!(matches!(compile(source, &["Node.tbx"]), Err(DefError::CyclicImport { .. })));

    let source = MemorySource::new()
        .with("A.tbx", "-\ntable B.tbx\n-\nB b\n")
        .with("B.tbx", "-\ntable A.tbx\n-\nA a\n");
    match compile(source, &["A.tbx"]) {
        Err(DefError::CyclicImport { chain, .. }) => {
            assert_eq!(chain, vec!["A.tbx", "B.tbx", "A.tbx"]);
        }
        other => panic!("expected a cycle, got {:?}", other.map(|r| r.len())),
    }

    let source = MemorySource::new().with("db/Tree.sqx", "foreign db/Tree parent\n");
    assert!(matches!(compile(source, &["db/Tree.sqx"]), Err(DefError::CyclicImport { .. })));
}

#[test]
fn test_width_too_small() {
    let source = MemorySource::new().with("Wide.btx", "type uint8_t\na(6), b(6)\n");
    assert!(matches!(
        compile(source, &["Wide.btx"]),
        Err(DefError::WidthTooSmall { line: 1, .. })
    ));
}

#[test]
fn test_protocol_array_rules() {
    let source = MemorySource::new()
        .with("Color.the", "RED\n")
        .with("P.thx", "import Color.the\nColor[4] colors\n");
    match compile(source, &["P.thx"]) {
        Err(DefError::UnsupportedArrayElement { element, kind, line, .. }) => {
            assert_eq!(element, "Color");
            assert_eq!(kind, DefinitionKind::Protocol);
            assert_eq!(line, 2);
        }
        other => panic!("expected an array error, got {:?}", other.map(|r| r.len())),
    }

    let source = MemorySource::new().with("P.thx", "bool[2] flags\n");
    assert!(matches!(
        compile(source, &["P.thx"]),
        Err(DefError::UnsupportedArrayElement { .. })
    ));

    let source = MemorySource::new().with("P.thx", "uint8_t[many] data\n");
    assert!(matches!(compile(source, &["P.thx"]), Err(DefError::DefinitionSyntax { .. })));

    let source = MemorySource::new().with("P.thx", "uint32_t[VAR] words\nuint16_t[Var] halves\n");
    let registry = compile(source, &["P.thx"]).expect("compile failed");
    let p = registry.lookup("P").unwrap();
    assert_eq!(p.as_protocol().unwrap().static_size, 0);
    assert_eq!(
        p.field("halves").unwrap().placement,
        Placement::Trailing { prefix: SizePrefix::U16, index: 1 }
    );
}

#[test]
fn test_squeeze_overflow() {
    let source = MemorySource::new().with("P.thx", "uint8_t a(4), b(5)\n");
    assert!(matches!(
        compile(source, &["P.thx"]),
        Err(DefError::SqueezeOverflow { bits: 9, capacity: 8, .. })
    ));
}

#[test]
fn test_table_fields() {
    let source = MemorySource::new()
        .with("e/Color.the", "RED\nGREEN\n")
        .with("t/Point.tbx", "int32_t x\nint32_t y\n")
        .with(
            "t/Shape.tbx",
            "A shape.\n-\nenum e/Color.the\ntable t/Point.tbx\nfrom geo/matrix.h import Matrix\n-\n\
             serialize_public false\n\
             max_size 0\n\
             string camelName\n\
             string(16) label\n\
             Point[] points\n\
             Point origin\n\
             Color[] palette\n\
             ~uint8_t legacy\n\
             virtual Matrix transform\n\
             bytes(64) blob\n\
             json meta\n",
        );
    let registry = compile(source, &["t/Shape.tbx"]).expect("compile failed");

    let shape = registry.lookup("Shape").unwrap();
    let table = shape.as_table().unwrap();
    assert_eq!(table.visibility, Visibility::Protected);
    assert_eq!(table.max_size, MaxSize::Declared(0));
    assert_eq!(table.slot_count(), 9);
    assert!(table.has_virtual_fields());
    assert_eq!(table.custom_types.len(), 1);
    assert_eq!(table.custom_types[0].include, "geo/matrix.h");

    let camel = shape.field("camelName").unwrap();
    assert_eq!(camel.internal_name, "camel_name");
    assert_eq!(camel.ty, FieldType::Text);

    assert_eq!(
        shape.field("label").unwrap().placement,
        Placement::Slot { index: 1, max_count: Some(16) }
    );
    assert_eq!(shape.field("points").unwrap().policy.pack, PackStrategy::Vector);
    assert_eq!(shape.field("origin").unwrap().policy.pack, PackStrategy::NestedTable);
    assert_eq!(shape.field("transform").unwrap().policy.pack, PackStrategy::Deferred);

    let legacy = shape.field("legacy").unwrap();
    assert!(legacy.is_deprecated);
    assert_eq!(legacy.placement, Placement::Slot { index: 5, max_count: None });
    assert_eq!(shape.active_fields().count(), 8);
}

#[test]
fn test_table_size_budget() {
    let body: String = (0..60).map(|i| format!("uint64_t f{}\n", i)).collect();

    // without a max_size line the default is only recorded
    let source = MemorySource::new().with("Big.tbx", body.clone());
    let registry = compile(source, &["Big.tbx"]).expect("compile failed");
    let table = registry.lookup("Big").and_then(|d| d.as_table()).unwrap();
    assert_eq!(table.max_size, MaxSize::Default(500));
    assert_eq!(table.bounded_size, 16 + 2 * 60 + 8 * 60);

    let source = MemorySource::new().with("Big.tbx", format!("max_size 500\n{}", body));
    match compile(source, &["Big.tbx"]) {
        Err(DefError::SizeBudgetExceeded { max_size, required, .. }) => {
            assert_eq!(max_size, 500);
            assert_eq!(required, 616);
        }
        other => panic!("expected a budget error, got {:?}", other.map(|r| r.len())),
    }

    let source = MemorySource::new().with("Big.tbx", format!("max_size 1024\n{}", body));
    assert!(compile(source, &["Big.tbx"]).is_ok());

    let options = CompileOptions { default_max_size: 0, ..CompileOptions::default() };
    let source = MemorySource::new().with("Big.tbx", body);
    let registry = compile_with(source, &options, &["Big.tbx"]).expect("compile failed").into_registry();
    assert_eq!(registry.lookup("Big").and_then(|d| d.as_table()).unwrap().max_size, MaxSize::Default(0));
}

#[test]
fn test_table_bounded_fields_exceed_budget() {
    let source = MemorySource::new().with(
        "Note.tbx",
        "max_size 100\nbytes(200) blob\nstring(300) name\n",
    );
    match compile(source, &["Note.tbx"]) {
        Err(DefError::SizeBudgetExceeded { max_size, required, .. }) => {
            assert_eq!(max_size, 100);
            assert_eq!(required, 16 + 2 * 2 + (4 + 4 + 200) + (4 + 4 + 300 + 1));
        }
        other => panic!("expected a budget error, got {:?}", other.map(|r| r.len())),
    }

    // unbounded fields only count their offset
    let source = MemorySource::new().with("Note.tbx", "max_size 40\nbytes blob\nstring name\n");
    let registry = compile(source, &["Note.tbx"]).expect("compile failed");
    assert_eq!(registry.lookup("Note").and_then(|d| d.as_table()).unwrap().bounded_size, 28);

    // deprecated fields are never written
    let source = MemorySource::new().with("Note.tbx", "max_size 40\n~bytes(200) blob\nstring name\n");
    assert!(compile(source, &["Note.tbx"]).is_ok());
}

#[test]
fn test_import_tag_named_definition_rejected() {
    let source = MemorySource::new()
        .with("table.tbx", "uint8_t x\n")
        .with("Holder.tbx", "import table.tbx\ntable inner\n");
    assert!(matches!(
        compile(source, &["Holder.tbx"]),
        Err(DefError::DefinitionSyntax { line: 0, .. })
    ));
}

#[test]
fn test_table_size_limit_on_scalar() {
    let source = MemorySource::new().with("T.tbx", "uint8_t(4) small\n");
    assert!(matches!(compile(source, &["T.tbx"]), Err(DefError::DefinitionSyntax { .. })));
}

#[test]
fn test_record_creation_order() {
    let source = MemorySource::new()
        .with("Other/Thing.sqx", "std::string label\n")
        .with("Owner.sqx", "uint32_t age\nforeign Other/Thing.sqx favourite\n")
        .with(
            "Pet.sqx",
            "-\nenum Kind.the\n-\nKind kind\nforeign Owner owner ON DELETE CASCADE\nforeign Other/Thing.sqx parent ON DELETE CASCADE\n",
        )
        .with("Kind.the", "CAT\nDOG\n");
    let registry = compile(source, &["Pet.sqx"]).expect("compile failed");

    let pet   = registry.lookup("Pet").unwrap();
    let owner = registry.lookup("Owner").unwrap();
    let thing = registry.lookup("Thing").unwrap();

    assert_eq!(registry.creation_order(pet.id), vec![thing.id, owner.id, pet.id]);

    let parent = pet.field("parent").unwrap();
    match &parent.ty {
        FieldType::ForeignKey(fk) => {
            assert_eq!(fk.target.id, thing.id);
            assert_eq!(fk.constraint, "ON DELETE CASCADE");
        }
        other => panic!("expected a foreign key, got {:?}", other),
    }
    assert_eq!(parent.placement, Placement::Column { sql_type: SqlType::Integer });
    assert_eq!(parent.policy.pack, PackStrategy::SqlForeignId);
    assert_eq!(parent.policy.empty, EmptyCheck::NullRowId);

    assert_eq!(pet.field("kind").unwrap().policy.pack, PackStrategy::SqlEnum);
    assert_eq!(
        thing.field("label").unwrap().placement,
        Placement::Column { sql_type: SqlType::Text }
    );
    assert_eq!(pet.as_record().unwrap().references, vec![owner.id, thing.id]);
}

#[test]
fn test_duplicate_definition_name() {
    let source = MemorySource::new()
        .with("a/Color.the", "RED\n")
        .with("b/Color.the", "BLUE\n")
        .with("P.thx", "import a/Color.the\nimport b/Color.the\n");
    assert!(matches!(
        compile(source, &["P.thx"]),
        Err(DefError::DuplicateDefinition { .. })
    ));
}

#[test]
fn test_kind_mismatch() {
    let source = MemorySource::new()
        .with("Color.the", "RED\n")
        .with("P.thx", "-\nbit Color.the\n-\n");
    assert!(matches!(
        compile(source, &["P.thx"]),
        Err(DefError::KindMismatch {
            expected: DefinitionKind::Bitfield,
            actual: DefinitionKind::Enum,
            ..
        })
    ));
}

#[test]
fn test_forbidden_imports() {
    let source = MemorySource::new()
        .with("T.tbx", "uint8_t a\n")
        .with("P.thx", "import T.tbx\n");
    assert!(matches!(compile(source, &["P.thx"]), Err(DefError::DefinitionSyntax { .. })));

    let source = MemorySource::new()
        .with("Color.the", "RED\n")
        .with("E.the", "-\nenum Color.the\n-\nA\n");
    assert!(matches!(compile(source, &["E.the"]), Err(DefError::DefinitionSyntax { .. })));
}

#[test]
fn test_missing_file() {
    let source = MemorySource::new().with("P.thx", "import Gone.the\n");
    assert!(matches!(compile(source, &["P.thx"]), Err(DefError::Io { .. })));
}

#[test]
fn test_unmatched_line_is_fatal() {
    let source = MemorySource::new().with("P.thx", "uint8_t a\nthis is not a field\n");
    let err = compile(source, &["P.thx"]).err().expect("line 2 is not a field");
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.file(), Some("P.thx"));
}

#[test]
fn test_filesystem_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("types")).unwrap();
    fs::write(dir.path().join("types/Level.the"), "# levels\nLOW\nHIGH\n").unwrap();
    fs::write(
        dir.path().join("Reading.thx"),
        "A sensor reading.\n-\nenum types/Level.the\n-\nLevel level\nuint16_t value\n",
    )
    .unwrap();

    let options = CompileOptions {
        root: dir.path().to_path_buf(),
        ..CompileOptions::default()
    };
    let compilation = compile_files(&options, &["Reading.thx"]).expect("compile failed");
    let reading = compilation.root_definitions().next().unwrap();
    assert_eq!(reading.name, "Reading");
    assert_eq!(reading.as_protocol().unwrap().static_size, 3);
    assert_eq!(compilation.registry().definitions().len(), 2);
}
