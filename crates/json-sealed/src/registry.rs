//! Codec registry: resolves a (type, qualifiers) pair to a codec and
//! memoizes the result.
//!
//! Factories are consulted in order: exact adapters and user factories as
//! registered, then the built-in factory for standard library types, then
//! the declared-type dispatcher. The first factory returning a codec wins.
//!
//! Codecs built while resolving one request are staged per thread and only
//! published to the shared cache once the outermost build succeeds, so no
//! other thread can observe a codec that still forwards to an unfinished
//! stand-in. A failed build discards everything staged beneath it.

use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use indexmap::IndexMap;
use json_sealed_stream::{JsonReader, JsonWriter, ReaderOptions, WriterOptions};
use tracing::debug;

use crate::builtin::BuiltinFactory;
use crate::codec::{Adapted, AnyValue, Codec, DynCodec, Instance, JsonAdapter};
use crate::dispatch::DeclaredFactory;
use crate::error::{BuildError, CodecError};
use crate::shape::{Declared, TypeRef};

/// Qualifier names selecting an alternative codec for the same Rust type.
pub type Qualifiers = BTreeSet<&'static str>;

pub fn qualifiers<I>(names: I) -> Qualifiers
where
    I: IntoIterator<Item = &'static str>,
{
    names.into_iter().collect()
}

/// Options applied by [`Codec::from_json`] and [`Codec::to_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    pub reader: ReaderOptions,
    pub writer: WriterOptions,
}

/// Produces codecs for the types it understands.
///
/// Returning `Ok(None)` passes the request on to the next factory.
pub trait CodecFactory: Send + Sync {
    fn create(
        &self,
        ty: TypeRef,
        qualifiers: &Qualifiers,
        registry: &Registry,
    ) -> Result<Option<Arc<dyn DynCodec>>, BuildError>;
}

impl<F> CodecFactory for F
where
    F: Fn(TypeRef, &Qualifiers, &Registry) -> Result<Option<Arc<dyn DynCodec>>, BuildError>
        + Send
        + Sync,
{
    fn create(
        &self,
        ty: TypeRef,
        qualifiers: &Qualifiers,
        registry: &Registry,
    ) -> Result<Option<Arc<dyn DynCodec>>, BuildError> {
        self(ty, qualifiers, registry)
    }
}

/// Serves one adapter for exactly one (type, qualifiers) pair.
struct ExactAdapterFactory {
    id: TypeId,
    qualifiers: Qualifiers,
    codec: Arc<dyn DynCodec>,
}

impl CodecFactory for ExactAdapterFactory {
    fn create(
        &self,
        ty: TypeRef,
        qualifiers: &Qualifiers,
        _registry: &Registry,
    ) -> Result<Option<Arc<dyn DynCodec>>, BuildError> {
        if ty.id() == self.id && *qualifiers == self.qualifiers {
            return Ok(Some(self.codec.clone()));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    id: TypeId,
    qualifiers: Qualifiers,
}

/// Stand-in handed out for a key whose construction is still running on
/// the current thread. Forwards to the finished codec.
struct DeferredCodec {
    type_name: &'static str,
    target: OnceLock<Arc<dyn DynCodec>>,
}

impl DeferredCodec {
    fn target(&self) -> Result<&Arc<dyn DynCodec>, CodecError> {
        self.target
            .get()
            .ok_or_else(|| CodecError::Unresolved(self.type_name.to_string()))
    }
}

impl DynCodec for DeferredCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        self.target()?.decode(reader)
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        self.target()?.encode(writer, value)
    }
}

/// Per-thread state of one outermost `codec_for` call and everything it
/// builds recursively.
#[derive(Default)]
struct BuildSession {
    deferred: HashMap<CacheKey, Arc<DeferredCodec>>,
    staged: IndexMap<CacheKey, Arc<dyn DynCodec>>,
    depth: usize,
}

/// Drops the current thread's session if a factory panics mid-build.
struct SessionGuard<'a> {
    sessions: &'a Mutex<HashMap<ThreadId, BuildSession>>,
    thread: ThreadId,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.thread);
        }
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    factories: Vec<Arc<dyn CodecFactory>>,
    options: RegistryOptions,
}

impl RegistryBuilder {
    pub fn factory(mut self, factory: impl CodecFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Registers `adapter` for `A::Value` under exactly `qualifiers`
    /// (an empty set binds the unqualified type).
    pub fn adapter<A, I>(mut self, qualifiers: I, adapter: A) -> Self
    where
        A: JsonAdapter,
        I: IntoIterator<Item = &'static str>,
    {
        self.factories.push(Arc::new(ExactAdapterFactory {
            id: TypeId::of::<A::Value>(),
            qualifiers: qualifiers.into_iter().collect(),
            codec: Arc::new(Adapted::new(adapter)),
        }));
        self
    }

    pub fn options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Registry {
        let mut factories = self.factories;
        factories.push(Arc::new(BuiltinFactory));
        factories.push(Arc::new(DeclaredFactory));
        Registry {
            factories,
            cache: RwLock::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            options: self.options,
        }
    }
}

pub struct Registry {
    factories: Vec<Arc<dyn CodecFactory>>,
    cache: RwLock<HashMap<CacheKey, Arc<dyn DynCodec>>>,
    sessions: Mutex<HashMap<ThreadId, BuildSession>>,
    options: RegistryOptions,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn codec<T: Declared>(&self) -> Result<Codec<T>, BuildError> {
        self.qualified_codec::<T>(&Qualifiers::new())
    }

    pub fn qualified_codec<T: Declared>(
        &self,
        qualifiers: &Qualifiers,
    ) -> Result<Codec<T>, BuildError> {
        let codec = self.codec_for(TypeRef::of::<T>(), qualifiers)?;
        Ok(Codec::new(codec, self.options.clone()))
    }

    /// Returns the codec for `ty` under `qualifiers`, building and caching
    /// it on first use.
    ///
    /// A request for a key already being built on this thread gets a
    /// stand-in that forwards to the finished codec.
    pub fn codec_for(
        &self,
        ty: TypeRef,
        qualifiers: &Qualifiers,
    ) -> Result<Arc<dyn DynCodec>, BuildError> {
        let key = CacheKey {
            id: ty.id(),
            qualifiers: qualifiers.clone(),
        };
        if let Some(codec) = self.read_cache().get(&key) {
            return Ok(codec.clone());
        }

        let thread = thread::current().id();
        let (deferred, mark) = {
            let mut sessions = self.lock_sessions();
            let session = sessions.entry(thread).or_default();
            if let Some(codec) = session.staged.get(&key) {
                return Ok(codec.clone());
            }
            if let Some(deferred) = session.deferred.get(&key) {
                debug!(type_name = ty.name(), "recursive codec request, deferring");
                return Ok(deferred.clone() as Arc<dyn DynCodec>);
            }
            let deferred = Arc::new(DeferredCodec {
                type_name: ty.name(),
                target: OnceLock::new(),
            });
            session.deferred.insert(key.clone(), deferred.clone());
            session.depth += 1;
            (deferred, session.staged.len())
        };

        let guard = SessionGuard {
            sessions: &self.sessions,
            thread,
        };
        let built = self.build(ty, qualifiers);
        drop(guard);

        let staged = {
            let mut sessions = self.lock_sessions();
            let session = sessions.entry(thread).or_default();
            session.deferred.remove(&key);
            session.depth = session.depth.saturating_sub(1);
            match &built {
                Ok(codec) => {
                    let _ = deferred.target.set(codec.clone());
                    session.staged.insert(key.clone(), codec.clone());
                }
                Err(_) => session.staged.truncate(mark),
            }
            if session.depth > 0 {
                return built;
            }
            sessions.remove(&thread).map(|session| session.staged)
        };
        let built = built?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        for (staged_key, codec) in staged.into_iter().flatten() {
            cache.entry(staged_key).or_insert(codec);
        }
        Ok(cache.get(&key).cloned().unwrap_or(built))
    }

    /// Drops every cached codec for `T`, whatever its qualifiers.
    /// Returns whether anything was removed.
    pub fn evict<T: Declared>(&self) -> bool {
        let id = TypeId::of::<T>();
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let before = cache.len();
        cache.retain(|key, _| key.id != id);
        before != cache.len()
    }

    pub fn is_cached<T: Declared>(&self, qualifiers: &Qualifiers) -> bool {
        self.read_cache().contains_key(&CacheKey {
            id: TypeId::of::<T>(),
            qualifiers: qualifiers.clone(),
        })
    }

    fn read_cache(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, Arc<dyn DynCodec>>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, BuildSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build(&self, ty: TypeRef, qualifiers: &Qualifiers) -> Result<Arc<dyn DynCodec>, BuildError> {
        for factory in &self.factories {
            if let Some(codec) = factory.create(ty, qualifiers, self)? {
                debug!(type_name = ty.name(), ?qualifiers, "built codec");
                return Ok(codec);
            }
        }
        Err(BuildError::NoCodec {
            type_name: ty.name().to_string(),
            qualifiers: format!("{qualifiers:?}"),
        })
    }
}
