use std::sync::Arc;

use crate::{
    component::Component,
    types::{DynError, Injectable, Resolved, TypeInfo},
};

/// A factory parameter, each parameter is one slot of the factory.
///
/// Implemented for `Arc<T>`, where `T` is a capability (`dyn Trait`) or a concrete component.
pub trait Param: Sized + Send + 'static {
    /// The type the parameter is declared as
    fn declared() -> TypeInfo;

    /// Takes the parameter out of a provider's value
    fn extract(resolved: &Resolved) -> Option<Self>;
}

impl<T: ?Sized + Injectable> Param for Arc<T> {
    fn declared() -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn extract(resolved: &Resolved) -> Option<Self> {
        resolved.downcast::<T>()
    }
}

/// Return type of a factory, either the component itself or a `Result` of it
pub trait FactoryOutput: 'static {
    type Produces: Component;

    /// Whether the factory can report a failure
    const FALLIBLE: bool;

    fn into_result(self) -> Result<Self::Produces, DynError>;
}

impl<T: Component> FactoryOutput for T {
    type Produces = T;
    const FALLIBLE: bool = false;

    fn into_result(self) -> Result<T, DynError> {
        Ok(self)
    }
}

impl<T: Component, E: Into<DynError> + 'static> FactoryOutput for Result<T, E> {
    type Produces = T;
    const FALLIBLE: bool = true;

    fn into_result(self) -> Result<T, DynError> {
        self.map_err(Into::into)
    }
}

/// A function constructing a component from its resolved parameters
///
/// Implemented for every `Fn(Arc<A>, Arc<B>, ...) -> Out` with up to eight parameters.
pub trait Factory<Args, Out: FactoryOutput>: Send + Sync + 'static {
    /// Declared types of all parameters, in order
    fn params() -> Vec<TypeInfo>;

    /// Calls the factory, `args` holds one value per parameter
    fn invoke(&self, args: &[Resolved]) -> Result<Out::Produces, DynError>;
}

fn missing_argument<P: Param>(position: usize) -> DynError {
    format!(
        "argument {position} could not be resolved as '{}'",
        P::declared()
    )
    .into()
}

macro_rules! impl_factory {
    ($($param:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<Fun, Out, $($param,)*> Factory<($($param,)*), Out> for Fun
        where
            Fun: Fn($($param),*) -> Out + Send + Sync + 'static,
            Out: FactoryOutput,
            $($param: Param,)*
        {
            fn params() -> Vec<TypeInfo> {
                vec![$(<$param as Param>::declared()),*]
            }

            fn invoke(&self, args: &[Resolved]) -> Result<Out::Produces, DynError> {
                let mut args = args.iter();
                let mut position = 0;
                $(
                    let $param = args
                        .next()
                        .and_then(<$param as Param>::extract)
                        .ok_or_else(|| missing_argument::<$param>(position))?;
                    position += 1;
                )*

                (self)($($param),*).into_result()
            }
        }
    };
}

impl_factory!();
impl_factory!(A1);
impl_factory!(A1, A2);
impl_factory!(A1, A2, A3);
impl_factory!(A1, A2, A3, A4);
impl_factory!(A1, A2, A3, A4, A5);
impl_factory!(A1, A2, A3, A4, A5, A6);
impl_factory!(A1, A2, A3, A4, A5, A6, A7);
impl_factory!(A1, A2, A3, A4, A5, A6, A7, A8);

#[cfg(test)]
mod tests {
    use super::*;

    trait Store: Send + Sync {}

    struct Memory;
    impl Store for Memory {}

    struct Service {
        store: Arc<dyn Store>,
    }
    impl Component for Service {}

    #[derive(Debug)]
    struct Broken;
    impl std::fmt::Display for Broken {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("broken")
        }
    }
    impl std::error::Error for Broken {}

    fn service(store: Arc<dyn Store>) -> Service {
        Service { store }
    }

    fn failing(_store: Arc<dyn Store>, _memory: Arc<Memory>) -> Result<Service, Broken> {
        Err(Broken)
    }

    fn params_of<Args, Out: FactoryOutput, F: Factory<Args, Out>>(_: &F) -> Vec<TypeInfo> {
        F::params()
    }

    fn fallible<Args, Out: FactoryOutput, F: Factory<Args, Out>>(_: &F) -> bool {
        Out::FALLIBLE
    }

    #[test]
    fn params_follow_the_signature() {
        assert_eq!(params_of(&service), vec![TypeInfo::of::<dyn Store>()]);
        assert_eq!(
            params_of(&failing),
            vec![TypeInfo::of::<dyn Store>(), TypeInfo::of::<Memory>()]
        );
        assert!(!fallible(&service));
        assert!(fallible(&failing));
    }

    #[test]
    fn invoke_passes_resolved_arguments() {
        let store: Arc<dyn Store> = Arc::new(Memory);
        let built = Factory::invoke(&service, &[Resolved::new(store.clone())])
            .expect("factory is infallible");

        assert!(Arc::ptr_eq(&built.store, &store));
    }

    #[test]
    fn invoke_reports_factory_errors() {
        let store: Arc<dyn Store> = Arc::new(Memory);
        let result = Factory::invoke(
            &failing,
            &[Resolved::new(store), Resolved::new(Arc::new(Memory))],
        );

        assert_eq!(result.err().map(|e| e.to_string()), Some("broken".into()));
    }

    #[test]
    fn invoke_rejects_missing_arguments() {
        let result = Factory::invoke(&service, &[]);
        assert!(result.is_err());
    }
}
