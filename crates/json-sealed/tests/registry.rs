use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use json_sealed::{
    qualifiers, Adapted, BuildError, CodecError, Declaration, Declared, DynCodec, JsonAdapter,
    JsonReader, JsonWriter, Product, Qualifiers, Registry, TypeRef, Union,
};

#[derive(Debug, Clone, PartialEq)]
struct Ping {
    seq: u64,
}

impl Declared for Ping {
    fn declaration() -> Declaration {
        Product::<Self>::new()
            .label("ping")
            .field("seq", |p| &p.seq)
            .construct(|args| {
                Ok(Ping {
                    seq: args.required(0)?,
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Pong {
    seq: u64,
}

impl Declared for Pong {
    fn declaration() -> Declaration {
        Product::<Self>::new()
            .label("pong")
            .field("seq", |p| &p.seq)
            .construct(|args| {
                Ok(Pong {
                    seq: args.required(0)?,
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Ping(Ping),
    Pong(Pong),
}

impl Declared for Frame {
    fn declaration() -> Declaration {
        Union::<Self>::new()
            .discriminator("op")
            .alternative(Frame::Ping, |f| match f {
                Frame::Ping(p) => Some(p),
                _ => None,
            })
            .alternative(Frame::Pong, |f| match f {
                Frame::Pong(p) => Some(p),
                _ => None,
            })
            .build()
    }
}

#[test]
fn codecs_are_cached_and_evictable() {
    let registry = Registry::new();
    let none = Qualifiers::new();
    assert!(!registry.is_cached::<Frame>(&none));

    let first = registry.codec::<Frame>().unwrap();
    assert!(registry.is_cached::<Frame>(&none));
    // Leaves are cached as a side effect of building the union.
    assert!(registry.is_cached::<Ping>(&none));

    let second = registry.codec::<Frame>().unwrap();
    assert!(Arc::ptr_eq(first.erased(), second.erased()));

    assert!(registry.evict::<Frame>());
    assert!(!registry.evict::<Frame>());
    assert!(!registry.is_cached::<Frame>(&none));

    let rebuilt = registry.codec::<Frame>().unwrap();
    assert!(!Arc::ptr_eq(first.erased(), rebuilt.erased()));
    // The evicted codec keeps working for whoever still holds it.
    assert_eq!(
        first.from_json(r#"{"op":"pong","seq":2}"#).unwrap(),
        Some(Frame::Pong(Pong { seq: 2 }))
    );
}

#[test]
fn registry_is_shared_across_threads() {
    let registry = Arc::new(Registry::new());
    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let registry = registry.clone();
            thread::spawn(move || {
                let codec = registry.codec::<Frame>().unwrap();
                let frame = if i % 2 == 0 {
                    Frame::Ping(Ping { seq: i })
                } else {
                    Frame::Pong(Pong { seq: i })
                };
                let json = codec.to_json(&frame).unwrap();
                assert_eq!(codec.from_json(&json).unwrap(), Some(frame));
                codec
            })
        })
        .collect();

    let codecs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let cached = registry.codec::<Frame>().unwrap();
    // Racing builders may produce duplicates, but only one is ever cached
    // and every later lookup sees it.
    assert!(codecs.iter().any(|c| Arc::ptr_eq(c.erased(), cached.erased())));
    assert!(Arc::ptr_eq(
        cached.erased(),
        registry.codec::<Frame>().unwrap().erased()
    ));
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    name: String,
    children: Vec<Node>,
}

impl Declared for Node {
    fn declaration() -> Declaration {
        Product::<Self>::new()
            .field("name", |n| &n.name)
            .field("children", |n| &n.children)
            .construct(|args| {
                Ok(Node {
                    name: args.required(0)?,
                    children: args.or_default(1)?,
                })
            })
    }
}

#[test]
fn racing_recursive_builds_only_publish_finished_codecs() {
    let json = r#"{"name":"a","children":[{"name":"b","children":[{"name":"c"}]}]}"#;
    for _ in 0..20 {
        let registry = Arc::new(Registry::new());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    // Half the threads start from the list so that its codec
                    // may be requested while another thread is inside `Node`.
                    if i % 2 == 0 {
                        let codec = registry.codec::<Node>().unwrap();
                        codec.from_json(json).unwrap().unwrap()
                    } else {
                        let codec = registry.codec::<Vec<Node>>().unwrap();
                        let wrapped = format!("[{json}]");
                        codec.from_json(&wrapped).unwrap().unwrap().remove(0)
                    }
                })
            })
            .collect();
        for handle in handles {
            let node = handle.join().unwrap();
            assert_eq!(node.children[0].children[0].name, "c");
        }
    }
}

#[test]
fn codec_handles_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Registry>();
    assert_send_sync::<json_sealed::Codec<Frame>>();
}

// ---------------------------------------------------------------------------
// Factories and adapters

struct UppercaseAdapter;

impl JsonAdapter for UppercaseAdapter {
    type Value = String;

    fn from_json(&self, reader: &mut JsonReader<'_>) -> Result<String, CodecError> {
        Ok(reader.next_string()?.to_uppercase())
    }

    fn to_json(&self, writer: &mut JsonWriter, value: &String) -> Result<(), CodecError> {
        Ok(writer.string_value(&value.to_lowercase())?)
    }
}

#[test]
fn unqualified_adapter_overrides_builtin() {
    let registry = Registry::builder()
        .adapter(std::iter::empty(), UppercaseAdapter)
        .build();
    let codec = registry.codec::<String>().unwrap();
    assert_eq!(codec.from_json(r#""shout""#).unwrap(), Some("SHOUT".to_string()));
    assert_eq!(codec.to_json(&"QUIET".to_string()).unwrap(), r#""quiet""#);
    // Adapters see no nulls.
    assert_eq!(codec.from_json("null").unwrap(), None);

    // Other registries are unaffected.
    let plain = Registry::new().codec::<String>().unwrap();
    assert_eq!(plain.from_json(r#""shout""#).unwrap(), Some("shout".to_string()));
}

#[test]
fn qualified_codec_is_looked_up_by_qualifier_set() {
    let registry = Registry::builder()
        .adapter(["Loud"], UppercaseAdapter)
        .build();
    let loud = registry
        .qualified_codec::<String>(&qualifiers(["Loud"]))
        .unwrap();
    assert_eq!(loud.from_json(r#""a""#).unwrap(), Some("A".to_string()));

    let plain = registry.codec::<String>().unwrap();
    assert_eq!(plain.from_json(r#""a""#).unwrap(), Some("a".to_string()));

    let err = registry
        .qualified_codec::<String>(&qualifiers(["Loud", "Other"]))
        .unwrap_err();
    assert!(matches!(err, BuildError::NoCodec { .. }));
}

#[test]
fn custom_factory_is_consulted_first() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let registry = Registry::builder()
        .factory(
            move |ty: TypeRef,
                  _qualifiers: &Qualifiers,
                  _registry: &Registry|
                  -> Result<Option<Arc<dyn DynCodec>>, BuildError> {
                seen.fetch_add(1, Ordering::SeqCst);
                if ty == TypeRef::of::<Ping>() {
                    let codec: Arc<dyn DynCodec> = Arc::new(Adapted::new(BarePingAdapter));
                    return Ok(Some(codec));
                }
                Ok(None)
            },
        )
        .build();

    let frames = registry.codec::<Frame>().unwrap();
    // The union still writes its key; the leaf comes from the factory.
    assert_eq!(
        frames.to_json(&Frame::Ping(Ping { seq: 7 })).unwrap(),
        r#"{"op":"ping","seq":7}"#
    );
    assert_eq!(
        frames.from_json(r#"{"op":"ping","seq":"7"}"#).unwrap(),
        Some(Frame::Ping(Ping { seq: 7 }))
    );
    assert!(calls.load(Ordering::SeqCst) >= 3);

    // Cached codecs are not rebuilt.
    let before = calls.load(Ordering::SeqCst);
    registry.codec::<Frame>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), before);
}

/// Accepts the sequence number as a string as well as a number.
struct BarePingAdapter;

impl JsonAdapter for BarePingAdapter {
    type Value = Ping;

    fn from_json(&self, reader: &mut JsonReader<'_>) -> Result<Ping, CodecError> {
        let mut seq = None;
        reader.begin_object()?;
        while reader.has_next()? {
            match reader.next_name()?.as_str() {
                "seq" => {
                    let path = reader.path();
                    let text = reader.next_string()?;
                    seq = Some(text.parse::<u64>().map_err(|_| CodecError::TypeMismatch {
                        expected: "a sequence number".to_string(),
                        path,
                    })?);
                }
                _ => reader.skip_value()?,
            }
        }
        reader.end_object()?;
        seq.map(|seq| Ping { seq })
            .ok_or_else(|| CodecError::MissingField {
                field: "seq".to_string(),
                type_name: "Ping".to_string(),
                path: reader.path(),
            })
    }

    fn to_json(&self, writer: &mut JsonWriter, value: &Ping) -> Result<(), CodecError> {
        writer.begin_object()?;
        writer.name("seq")?;
        writer.u64_value(value.seq)?;
        writer.end_object()?;
        Ok(())
    }
}

/// A union with no key of its own and no keyed parent.
#[derive(Debug)]
enum Loose {
    Ping(Ping),
}

impl Declared for Loose {
    fn declaration() -> Declaration {
        Union::<Self>::new()
            .alternative(Loose::Ping, |l| {
                let Loose::Ping(p) = l;
                Some(p)
            })
            .build()
    }
}

#[test]
fn type_without_codec_is_reported() {
    match Registry::new().codec::<Loose>().unwrap_err() {
        BuildError::NoCodec {
            type_name,
            qualifiers,
        } => {
            assert!(type_name.ends_with("Loose"), "{type_name}");
            assert_eq!(qualifiers, "{}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
