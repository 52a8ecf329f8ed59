//! Region naming: name sources, callable identity and the finalization
//! state machine shared by every named region.
//!
//! A named region starts either resolved (custom string, callable
//! identity) or unresolved (nothing yet, or only a provisional call-site
//! name). Exactly one transition to the resolved state is allowed. After
//! it, the name is immutable and applying the region to a further
//! callable is only legal when the name was a custom string.

use core::any::type_name;
use core::fmt;
use std::borrow::Cow;

use parking_lot::Mutex;

use crate::callsite::CallSite;
use crate::error::{RegionError, RegionResult};
use crate::handles::StringHandle;
use crate::manager::Instrumentation;

/// What is known about a callable's name
///
/// Resolution prefers the qualified name, then the simple name, then a
/// `"{type}.__call__"` name synthesized from the type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    qualified: Option<Cow<'static, str>>,
    simple: Option<Cow<'static, str>>,
    type_name: Option<Cow<'static, str>>,
}

impl Identity {
    /// Identity of a function, method or closure type
    ///
    /// The qualified name is the type path below the crate root, so
    /// `my_app::Decoder::decode` is named `Decoder::decode`.
    ///
    /// ```rust
    /// use ittmark::Identity;
    ///
    /// struct Decoder;
    /// impl Decoder {
    ///     fn decode(&self) {}
    /// }
    ///
    /// fn identity_of<F>(_f: F) -> Identity {
    ///     Identity::of_fn::<F>()
    /// }
    ///
    /// let identity = identity_of(Decoder::decode);
    /// assert_eq!(identity.simple_name(), Some("decode"));
    /// assert!(identity.resolve().is_ok_and(|name| name.ends_with("main::Decoder::decode")));
    /// ```
    pub fn of_fn<F: ?Sized>() -> Self {
        let path = type_name::<F>();
        Self {
            qualified: Some(Cow::Borrowed(below_crate_root(path))),
            simple: Some(Cow::Borrowed(last_segment(path))),
            type_name: None,
        }
    }

    /// Identity of the function or closure behind `f`
    ///
    /// ```rust
    /// use ittmark::Identity;
    ///
    /// fn render() {}
    /// let identity = Identity::of_val(&render);
    /// assert_eq!(identity.simple_name(), Some("render"));
    /// ```
    pub fn of_val<F: ?Sized>(_f: &F) -> Self {
        Self::of_fn::<F>()
    }

    /// Identity of a callable object, named after its type only
    pub fn of_object<T: ?Sized>() -> Self {
        Self {
            type_name: Some(Cow::Borrowed(last_segment(type_name::<T>()))),
            ..Self::default()
        }
    }

    /// An identity carrying no name at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Set the qualified name
    #[must_use]
    pub fn with_qualified_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.qualified = Some(name.into());
        self
    }

    /// Set the simple name
    #[must_use]
    pub fn with_simple_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.simple = Some(name.into());
        self
    }

    /// Set the type name
    #[must_use]
    pub fn with_type_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    /// Qualified name, if known
    pub fn qualified_name(&self) -> Option<&str> {
        self.qualified.as_deref()
    }

    /// Simple name, if known
    pub fn simple_name(&self) -> Option<&str> {
        self.simple.as_deref()
    }

    /// Resolve the region name this identity stands for
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::UnnamedRegion`] when the identity carries no
    /// name of any kind.
    pub fn resolve(&self) -> RegionResult<String> {
        if let Some(name) = &self.qualified {
            return Ok(name.to_string());
        }
        if let Some(name) = &self.simple {
            return Ok(name.to_string());
        }
        if let Some(ty) = &self.type_name {
            return Ok(format!("{ty}.__call__"));
        }
        Err(RegionError::UnnamedRegion)
    }
}

/// Type path without its leading crate segment
///
/// Paths that do not start with a plain identifier, such as
/// `<T as Trait>::call` or `&str`, are kept whole.
fn below_crate_root(path: &str) -> &str {
    match path.split_once("::") {
        Some((krate, rest))
            if !krate.is_empty()
                && krate.chars().all(|c| c.is_alphanumeric() || c == '_') =>
        {
            rest
        }
        _ => path,
    }
}

/// Last `::` segment of a type path, ignoring generic arguments
fn last_segment(path: &str) -> &str {
    let base = path.split_once('<').map_or(path, |(head, _)| head);
    base.rsplit("::").next().unwrap_or(base)
}

/// Where a region name comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Source {
    /// Nothing yet; the name arrives with a deferred wrap
    #[default]
    Unset,
    /// Explicit name, used verbatim
    Custom(String),
    /// Provisional `"{file}:{line}"` name
    CallSite(CallSite),
    /// Name of a wrapped callable
    Callable(Identity),
}

impl From<&str> for Source {
    fn from(name: &str) -> Self {
        Source::Custom(name.to_owned())
    }
}

impl From<String> for Source {
    fn from(name: String) -> Self {
        Source::Custom(name)
    }
}

impl From<CallSite> for Source {
    fn from(site: CallSite) -> Self {
        Source::CallSite(site)
    }
}

impl From<Identity> for Source {
    fn from(identity: Identity) -> Self {
        Source::Callable(identity)
    }
}

/// Kind of source the current name came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// No name yet
    Unset,
    /// Explicit string
    Custom,
    /// Call-site location
    CallSite,
    /// Callable identity
    Callable,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NameKind::Unset => "unset",
            NameKind::Custom => "custom",
            NameKind::CallSite => "call_site",
            NameKind::Callable => "callable",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct NameState {
    name: Option<StringHandle>,
    kind: NameKind,
    finalized: bool,
}

/// Finalization state machine embedded in every named region
#[derive(Debug)]
pub(crate) struct Naming {
    state: Mutex<NameState>,
}

impl Naming {
    /// Resolve the initial name of `source`; nothing is finalized yet
    pub(crate) fn new(instr: &Instrumentation, source: Source) -> RegionResult<Self> {
        let (name, kind) = match source {
            Source::Unset => (None, NameKind::Unset),
            Source::Custom(name) => (Some(instr.string_handle(&name)?), NameKind::Custom),
            Source::CallSite(site) => (
                Some(instr.string_handle(&site.to_string())?),
                NameKind::CallSite,
            ),
            Source::Callable(identity) => (
                Some(instr.string_handle(&identity.resolve()?)?),
                NameKind::Callable,
            ),
        };
        Ok(Self {
            state: Mutex::new(NameState {
                name,
                kind,
                finalized: false,
            }),
        })
    }

    /// Finalize now when the name can no longer change
    pub(crate) fn finalize_if_determined(
        &self,
        on_final: impl FnOnce(&StringHandle) -> RegionResult<()>,
    ) -> RegionResult<()> {
        let mut state = self.state.lock();
        match state.kind {
            NameKind::Custom | NameKind::Callable => finalize(&mut state, on_final),
            NameKind::Unset | NameKind::CallSite => Ok(()),
        }
    }

    /// Run `begin` with the final name, finalizing first if needed
    pub(crate) fn begin_with(
        &self,
        on_final: impl FnOnce(&StringHandle) -> RegionResult<()>,
        begin: impl FnOnce(&StringHandle) -> RegionResult<()>,
    ) -> RegionResult<()> {
        let name = {
            let mut state = self.state.lock();
            if !state.finalized {
                finalize(&mut state, on_final)?;
            }
            state.name.clone().ok_or(RegionError::UnnamedRegion)?
        };
        begin(&name)
    }

    /// Deferred-wrap callback: adopt the callable's name or enforce lock-in
    pub(crate) fn on_wrap(
        &self,
        instr: &Instrumentation,
        identity: &Identity,
        on_final: impl FnOnce(&StringHandle) -> RegionResult<()>,
    ) -> RegionResult<()> {
        let mut state = self.state.lock();
        if !state.finalized {
            state.name = Some(instr.string_handle(&identity.resolve()?)?);
            state.kind = NameKind::Callable;
            return finalize(&mut state, on_final);
        }
        if state.kind != NameKind::Custom {
            return Err(RegionError::AnonymousRewrap);
        }
        Ok(())
    }

    pub(crate) fn name(&self) -> Option<StringHandle> {
        self.state.lock().name.clone()
    }

    pub(crate) fn kind(&self) -> NameKind {
        self.state.lock().kind
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.state.lock().finalized
    }
}

fn finalize(
    state: &mut NameState,
    on_final: impl FnOnce(&StringHandle) -> RegionResult<()>,
) -> RegionResult<()> {
    let name = state.name.as_ref().ok_or(RegionError::UnnamedRegion)?;
    on_final(name)?;
    state.finalized = true;
    tracing::trace!(name = %name, kind = %state.kind, "region name finalized");
    Ok(())
}

/// Write a name for display, `None` when still unresolved
pub(crate) struct DisplayName(pub(crate) Option<StringHandle>);

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{name}"),
            None => f.write_str("None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryBackend;
    use std::sync::Arc;

    fn instr() -> Instrumentation {
        Instrumentation::with_backend(Arc::new(MemoryBackend::new()))
    }

    fn sample_fn() {}

    struct Worker;

    #[test]
    fn test_identity_prefers_qualified_name() -> RegionResult<()> {
        let identity = Identity::of_val(&sample_fn);
        let name = identity.resolve()?;
        assert_eq!(name, "naming::tests::sample_fn");
        assert_eq!(identity.simple_name(), Some("sample_fn"));
        Ok(())
    }

    #[test]
    fn test_identity_falls_back_to_simple_then_type() -> RegionResult<()> {
        let simple = Identity::anonymous().with_simple_name("step");
        assert_eq!(simple.resolve()?, "step");

        let object = Identity::of_object::<Worker>();
        assert_eq!(object.resolve()?, "Worker.__call__");

        assert_eq!(
            Identity::anonymous().resolve(),
            Err(RegionError::UnnamedRegion)
        );
        Ok(())
    }

    #[test]
    fn test_crate_segment_is_dropped() {
        assert_eq!(below_crate_root("app::Decoder::decode"), "Decoder::decode");
        assert_eq!(below_crate_root("app::run::{{closure}}"), "run::{{closure}}");
        assert_eq!(
            below_crate_root("<app::Worker as app::Job>::run"),
            "<app::Worker as app::Job>::run"
        );
        assert_eq!(below_crate_root("main"), "main");
    }

    #[test]
    fn test_last_segment_ignores_generics() {
        assert_eq!(last_segment("a::b::Traced<c::D, e::F>"), "Traced");
        assert_eq!(last_segment("plain"), "plain");
    }

    #[test]
    fn test_custom_name_finalizes_and_allows_rewrap() -> RegionResult<()> {
        let instr = instr();
        let naming = Naming::new(&instr, Source::from("frame"))?;
        naming.finalize_if_determined(|_| Ok(()))?;
        assert!(naming.is_finalized());
        assert_eq!(naming.kind(), NameKind::Custom);

        naming.on_wrap(&instr, &Identity::of_val(&sample_fn), |_| Ok(()))?;
        naming.on_wrap(&instr, &Identity::of_val(&sample_fn), |_| Ok(()))?;
        assert_eq!(naming.name().map(|n| n.to_string()), Some("frame".into()));
        Ok(())
    }

    #[test]
    fn test_call_site_name_is_provisional() -> RegionResult<()> {
        let instr = instr();
        let naming = Naming::new(&instr, Source::from(CallSite::new("sample.rs", 10)))?;
        naming.finalize_if_determined(|_| Ok(()))?;
        assert!(!naming.is_finalized());

        naming.on_wrap(&instr, &Identity::of_object::<Worker>(), |_| Ok(()))?;
        assert!(naming.is_finalized());
        assert_eq!(
            naming.name().map(|n| n.to_string()),
            Some("Worker.__call__".into())
        );

        let err = naming.on_wrap(&instr, &Identity::of_object::<Worker>(), |_| Ok(()));
        assert_eq!(err, Err(RegionError::AnonymousRewrap));
        Ok(())
    }

    #[test]
    fn test_begin_finalizes_once() -> RegionResult<()> {
        let instr = instr();
        let naming = Naming::new(&instr, Source::from(CallSite::new("sample.rs", 10)))?;
        let mut finals = 0;
        let mut begun = Vec::new();

        naming.begin_with(
            |_| {
                finals += 1;
                Ok(())
            },
            |name| {
                begun.push(name.to_string());
                Ok(())
            },
        )?;
        naming.begin_with(
            |_| {
                finals += 1;
                Ok(())
            },
            |name| {
                begun.push(name.to_string());
                Ok(())
            },
        )?;

        assert_eq!(finals, 1);
        assert_eq!(begun, vec!["sample.rs:10", "sample.rs:10"]);
        Ok(())
    }

    #[test]
    fn test_unset_source_cannot_begin() -> RegionResult<()> {
        let instr = instr();
        let naming = Naming::new(&instr, Source::Unset)?;
        let result = naming.begin_with(|_| Ok(()), |_| Ok(()));
        assert_eq!(result, Err(RegionError::UnnamedRegion));
        assert!(!naming.is_finalized());
        Ok(())
    }

    #[test]
    fn test_failed_callback_leaves_region_unfinalized() -> RegionResult<()> {
        let instr = instr();
        let naming = Naming::new(&instr, Source::from("x"))?;
        let result =
            naming.finalize_if_determined(|_| Err(RegionError::backend("create_event", "down")));
        assert_eq!(result, Err(RegionError::backend("create_event", "down")));
        assert!(!naming.is_finalized());
        Ok(())
    }
}
