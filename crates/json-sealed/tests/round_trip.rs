use indexmap::IndexMap;
use json_sealed::{Codec, Declaration, Declared, Product, Registry, RegistryOptions, Union, WriterOptions};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Note {
    text: String,
    tags: Vec<String>,
    score: Option<i64>,
}

impl Declared for Note {
    fn declaration() -> Declaration {
        Product::<Self>::new()
            .label("note")
            .alternate("memo")
            .field("text", |n| &n.text)
            .field("tags", |n| &n.tags)
            .field("score", |n| &n.score)
            .construct(|args| {
                Ok(Note {
                    text: args.required(0)?,
                    tags: args.or_default(1)?,
                    score: args.or_default(2)?,
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Reading {
    sensor: String,
    values: IndexMap<String, f64>,
}

impl Declared for Reading {
    fn declaration() -> Declaration {
        Product::<Self>::new()
            .label("reading")
            .field("sensor", |r| &r.sensor)
            .field("values", |r| &r.values)
            .construct(|args| {
                Ok(Reading {
                    sensor: args.required(0)?,
                    values: args.required(1)?,
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Circle {
    radius: f64,
}

impl Declared for Circle {
    fn declaration() -> Declaration {
        Product::<Self>::new()
            .label("circle")
            .field("radius", |c| &c.radius)
            .construct(|args| {
                Ok(Circle {
                    radius: args.required(0)?,
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Square {
    side: u32,
}

impl Declared for Square {
    fn declaration() -> Declaration {
        Product::<Self>::new()
            .label("square")
            .field("side", |s| &s.side)
            .construct(|args| {
                Ok(Square {
                    side: args.required(0)?,
                })
            })
    }
}

/// Flattened into `Record`'s label space.
#[derive(Debug, Clone, PartialEq)]
enum Figure {
    Circle(Circle),
    Square(Square),
}

impl Declared for Figure {
    fn declaration() -> Declaration {
        Union::<Self>::new()
            .nested_in::<Record>()
            .alternative(Figure::Circle, |f| match f {
                Figure::Circle(c) => Some(c),
                _ => None,
            })
            .alternative(Figure::Square, |f| match f {
                Figure::Square(s) => Some(s),
                _ => None,
            })
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Record {
    Note(Note),
    Reading(Reading),
    Figure(Figure),
}

impl Declared for Record {
    fn declaration() -> Declaration {
        Union::<Self>::new()
            .discriminator("kind")
            .alternative(Record::Note, |r| match r {
                Record::Note(n) => Some(n),
                _ => None,
            })
            .alternative(Record::Reading, |r| match r {
                Record::Reading(x) => Some(x),
                _ => None,
            })
            .alternative(Record::Figure, |r| match r {
                Record::Figure(f) => Some(f),
                _ => None,
            })
            .build()
    }
}

fn arb_text() -> impl Strategy<Value = String> {
    "\\PC{0,12}"
}

fn arb_note() -> impl Strategy<Value = Note> {
    (
        arb_text(),
        prop::collection::vec(arb_text(), 0..4),
        prop::option::of(any::<i64>()),
    )
        .prop_map(|(text, tags, score)| Note { text, tags, score })
}

fn arb_reading() -> impl Strategy<Value = Reading> {
    (
        arb_text(),
        prop::collection::vec((arb_text(), -1.0e6..1.0e6f64), 0..5),
    )
        .prop_map(|(sensor, values)| Reading {
            sensor,
            values: values.into_iter().collect(),
        })
}

fn arb_figure() -> impl Strategy<Value = Figure> {
    prop_oneof![
        (0.0..1.0e6f64).prop_map(|radius| Figure::Circle(Circle { radius })),
        any::<u32>().prop_map(|side| Figure::Square(Square { side })),
    ]
}

fn arb_record() -> impl Strategy<Value = Record> {
    prop_oneof![
        arb_note().prop_map(Record::Note),
        arb_reading().prop_map(Record::Reading),
        arb_figure().prop_map(Record::Figure),
    ]
}

fn codec(options: RegistryOptions) -> Codec<Record> {
    Registry::builder()
        .options(options)
        .build()
        .codec::<Record>()
        .unwrap()
}

proptest! {
    #[test]
    fn records_survive_a_round_trip(record in arb_record()) {
        let codec = codec(RegistryOptions::default());
        let json = codec.to_json(&record).unwrap();
        prop_assert!(json.starts_with("{\"kind\":\""), "key is not first: {}", json);
        prop_assert_eq!(codec.from_json(&json).unwrap(), Some(record));
    }

    #[test]
    fn indented_output_reads_back_the_same(record in arb_record()) {
        let codec = codec(RegistryOptions {
            writer: WriterOptions {
                serialize_nulls: true,
                indent: "  ".to_string(),
            },
            ..Default::default()
        });
        let json = codec.to_json(&record).unwrap();
        prop_assert_eq!(codec.from_json(&json).unwrap(), Some(record));
    }

    #[test]
    fn alternate_label_decodes_to_the_same_leaf(note in arb_note()) {
        let codec = codec(RegistryOptions::default());
        let json = codec.to_json(&Record::Note(note.clone())).unwrap();
        let aliased = json.replacen("\"kind\":\"note\"", "\"kind\":\"memo\"", 1);
        prop_assert_eq!(codec.from_json(&aliased).unwrap(), Some(Record::Note(note)));
    }

    #[test]
    fn figures_share_the_record_key(figure in arb_figure()) {
        let registry = Registry::new();
        let records = registry.codec::<Record>().unwrap();
        let figures = registry.codec::<Figure>().unwrap();
        let via_record = records.to_json(&Record::Figure(figure.clone())).unwrap();
        let via_figure = figures.to_json(&figure).unwrap();
        prop_assert_eq!(&via_record, &via_figure);
        prop_assert_eq!(figures.from_json(&via_record).unwrap(), Some(figure));
    }
}
