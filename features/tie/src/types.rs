use std::{
    any::{Any, TypeId},
    sync::Arc,
};

/// Errors reported by user factories
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// A wired graph may be handed to other threads once it is built,
/// so anything taking part in it needs to be Send + Sync + 'static.
///
/// Capability traits therefore need `Send + Sync` as supertraits.
pub trait Injectable: Send + Sync + 'static {}
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// Value produced by a component, erased to its concrete type
#[derive(Clone)]
pub(crate) struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub(crate) fn new<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    pub(crate) fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }
}

/// A provider's value, cast to the declared type of the slot it fills.
///
/// Internally this is a boxed `Arc<I>` where `I` is the slot type, which
/// may be a concrete component or a `dyn Trait` capability.
pub struct Resolved {
    info: TypeInfo,
    value: Box<dyn Any + Send + Sync>,
}

impl Resolved {
    pub(crate) fn new<I: ?Sized + Injectable>(value: Arc<I>) -> Self {
        Resolved {
            info: TypeInfo::of::<I>(),
            value: Box::new(value),
        }
    }

    /// The type this value was cast to
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    /// Returns the shared value if it was cast to `I`
    pub fn downcast<I: ?Sized + Injectable>(&self) -> Option<Arc<I>> {
        self.value.downcast_ref::<Arc<I>>().cloned()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short_name())
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// The type name with all module paths removed, `dyn app::Greeter` becomes `dyn Greeter`
    pub fn short_name(&self) -> String {
        short_type_name(self.type_name)
    }
}

/// Strips every `path::` prefix from a rendered type name, generics included
pub(crate) fn short_type_name(name: &str) -> String {
    let mut short = String::with_capacity(name.len());
    let mut segment = String::new();
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else {
            short.push_str(&segment);
            segment.clear();
            short.push(c);
        }
    }
    short.push_str(&segment);

    short
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {}

    struct Service;

    #[test]
    fn short_names_drop_module_paths() {
        assert_eq!(short_type_name("app::services::Mailer"), "Mailer");
        assert_eq!(short_type_name("Mailer"), "Mailer");
        assert_eq!(
            short_type_name("core::result::Result<app::X, std::io::Error>"),
            "Result<X, Error>"
        );
        assert_eq!(
            short_type_name("alloc::sync::Arc<dyn app::Greeter>"),
            "Arc<dyn Greeter>"
        );
    }

    #[test]
    fn type_info_displays_short_name() {
        assert_eq!(TypeInfo::of::<Service>().to_string(), "Service");
        assert_eq!(TypeInfo::of::<dyn Greeter>().to_string(), "dyn Greeter");
    }

    #[test]
    fn resolved_only_downcasts_to_its_cast_type() {
        let resolved = Resolved::new::<Service>(Arc::new(Service));
        assert!(resolved.downcast::<Service>().is_some());
        assert!(resolved.downcast::<dyn Greeter>().is_none());
        assert_eq!(resolved.info(), TypeInfo::of::<Service>());
    }

    #[test]
    fn instance_downcast_reports_actual_type() {
        let instance = Instance::new(Arc::new(Service));
        assert!(instance.downcast::<Service>().is_ok());
        assert_eq!(
            instance.downcast::<String>().err(),
            Some(std::any::type_name::<Service>())
        );
    }
}
