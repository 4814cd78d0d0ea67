//! Named slot access on types this crate does not own
//!
//! A slot matches a lookup only when its name is equal and its declared type is
//! exactly the requested type; there is no assignability check. To find a handler
//! slot, ask for the slot's declared trait-object type (`Arc<dyn Handler>`), not the
//! concrete handler currently stored in it: a lookup by concrete type is `NotFound`.
//! A trait-object slot accepts any concrete handler on `set`.
//!
//! Host units expose their internals through [`Reflect`]: a list of declared slots,
//! type-erased reads and writes, and an optional base. A base is the embedded struct
//! a type extends, so slot lookup can walk from the most-derived type upward the way
//! field lookup walks a class hierarchy.
//!
//! Handles are cheap and are never cached: resolve one, use it, drop it.

use std::any::{Any, TypeId};
use std::fmt;

use crate::error::{FieldAccessError, FieldResult};

/// Runtime identity of a slot or owner type
#[derive(Clone, Copy)]
pub struct SlotType {
    id: TypeId,
    name: &'static str,
}

impl SlotType {
    /// Identity of `T`
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for SlotType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SlotType {}

impl fmt::Debug for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One slot declared directly on a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDecl {
    /// Slot name
    pub name: &'static str,
    /// Declared type
    pub ty: SlotType,
    /// Shared by every instance; never copied and never written
    pub class_level: bool,
}

impl SlotDecl {
    /// Per-instance slot of type `T`
    pub fn instance<T: Any>(name: &'static str) -> Self {
        Self {
            name,
            ty: SlotType::of::<T>(),
            class_level: false,
        }
    }

    /// Class-level slot of type `T`
    pub fn class_level<T: Any>(name: &'static str) -> Self {
        Self {
            name,
            ty: SlotType::of::<T>(),
            class_level: true,
        }
    }
}

/// Slot-level introspection of one type in a hierarchy
///
/// Usually implemented with [`reflect!`](crate::reflect). Each level of a hierarchy
/// implements it separately and reports only its own slots; [`base`](Self::base)
/// links a level to the one it extends.
pub trait Reflect: Any + Send + Sync {
    /// Runtime type of this level
    fn runtime_type(&self) -> SlotType;

    /// View as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Slots declared directly on this level
    fn declared_slots(&self) -> Vec<SlotDecl>;

    /// Clone of the named slot's value, boxed
    fn read_slot(&self, name: &str) -> Option<Box<dyn Any + Send>>;

    /// Replace the named slot's value
    ///
    /// # Errors
    ///
    /// Returns [`FieldAccessError::TypeMismatch`] if `value` has the wrong type,
    /// [`FieldAccessError::Inaccessible`] for class-level slots, and
    /// [`FieldAccessError::NotFound`] for unknown names.
    fn write_slot(&mut self, name: &str, value: Box<dyn Any + Send>) -> FieldResult<()>;

    /// The level this type extends
    fn base(&self) -> Option<&dyn Reflect> {
        None
    }

    /// Mutable access to the level this type extends
    fn base_mut(&mut self) -> Option<&mut dyn Reflect> {
        None
    }

    /// Short name of the runtime type
    fn type_name(&self) -> &'static str {
        let full = self.runtime_type().name();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Located slot, valid for instances of the type it was resolved on
#[derive(Debug, Clone, Copy)]
pub struct FieldHandle {
    owner: SlotType,
    declared_on: SlotType,
    depth: usize,
    decl: SlotDecl,
}

impl FieldHandle {
    /// Slot name
    pub fn name(&self) -> &'static str {
        self.decl.name
    }

    /// Declared slot type
    pub fn slot_type(&self) -> SlotType {
        self.decl.ty
    }

    /// Type in the hierarchy that declares the slot
    pub fn declared_on(&self) -> SlotType {
        self.declared_on
    }

    /// Number of base hops from the owner to the declaring level
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Read the slot
    ///
    /// # Errors
    ///
    /// Returns [`FieldAccessError::Incompatible`] if `target` is not the type the
    /// handle was resolved on, [`FieldAccessError::TypeMismatch`] if `T` is not the
    /// declared type, and [`FieldAccessError::Inaccessible`] if the level refuses the
    /// read.
    pub fn get<T: Any + Clone>(&self, target: &dyn Reflect) -> FieldResult<T> {
        self.check_owner(target.runtime_type())?;
        self.check_type::<T>()?;
        let level = descend(target, self.depth).ok_or_else(|| self.inaccessible())?;
        let value = level.read_slot(self.decl.name).ok_or_else(|| self.inaccessible())?;
        value
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| self.mismatch::<T>())
    }

    /// Write the slot
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get), plus any error the level reports for the write.
    pub fn set<T: Any + Send>(&self, target: &mut dyn Reflect, value: T) -> FieldResult<()> {
        self.check_owner(target.runtime_type())?;
        self.check_type::<T>()?;
        if self.decl.class_level {
            return Err(self.inaccessible());
        }
        let level = descend_mut(target, self.depth).ok_or_else(|| self.inaccessible())?;
        level.write_slot(self.decl.name, Box::new(value))
    }

    fn check_owner(&self, actual: SlotType) -> FieldResult<()> {
        if actual == self.owner {
            Ok(())
        } else {
            Err(FieldAccessError::Incompatible {
                from: self.owner.name(),
                to: actual.name(),
            })
        }
    }

    fn check_type<T: Any>(&self) -> FieldResult<()> {
        if SlotType::of::<T>() == self.decl.ty {
            Ok(())
        } else {
            Err(self.mismatch::<T>())
        }
    }

    fn mismatch<T: Any>(&self) -> FieldAccessError {
        FieldAccessError::TypeMismatch {
            owner: self.declared_on.name(),
            name: self.decl.name.to_string(),
            declared: self.decl.ty.name(),
            requested: std::any::type_name::<T>(),
        }
    }

    fn inaccessible(&self) -> FieldAccessError {
        FieldAccessError::Inaccessible {
            owner: self.declared_on.name(),
            name: self.decl.name.to_string(),
        }
    }
}

/// Locate slot `name` of type `requested` on `target` or its bases
///
/// The most-derived level is searched first and the first match wins.
///
/// # Errors
///
/// Returns [`FieldAccessError::NotFound`] once the hierarchy is exhausted.
pub fn find(target: &dyn Reflect, name: &str, requested: SlotType) -> FieldResult<FieldHandle> {
    let owner = target.runtime_type();
    let mut level = Some(target);
    let mut depth = 0;

    while let Some(current) = level {
        if let Some(decl) = current
            .declared_slots()
            .into_iter()
            .find(|d| d.name == name && d.ty == requested)
        {
            return Ok(FieldHandle {
                owner,
                declared_on: current.runtime_type(),
                depth,
                decl,
            });
        }
        level = current.base();
        depth += 1;
    }

    Err(FieldAccessError::NotFound {
        owner: owner.name(),
        name: name.to_string(),
        requested: requested.name(),
    })
}

/// [`find`] with the requested type given as a type parameter
///
/// # Errors
///
/// See [`find`].
pub fn find_typed<T: Any>(target: &dyn Reflect, name: &str) -> FieldResult<FieldHandle> {
    find(target, name, SlotType::of::<T>())
}

/// Copy every instance slot of `from` into `to`
///
/// `to` must be `from`'s runtime type or extend it. Slots are copied level by level
/// through `from`'s whole hierarchy; class-level slots are skipped. Returns the
/// number of slots copied.
///
/// # Errors
///
/// Returns [`FieldAccessError::Incompatible`] if `to` does not extend `from`'s type,
/// or the first read/write failure.
pub fn copy_all(from: &dyn Reflect, to: &mut dyn Reflect) -> FieldResult<usize> {
    let source = from.runtime_type();
    let target_name = to.runtime_type().name();
    let incompatible = || FieldAccessError::Incompatible {
        from: source.name(),
        to: target_name,
    };

    let mut offset = 0;
    let mut cursor = Some(&*to);
    loop {
        match cursor {
            Some(level) if level.runtime_type() == source => break,
            Some(level) => {
                cursor = level.base();
                offset += 1;
            }
            None => return Err(incompatible()),
        }
    }

    let mut copied = 0;
    let mut level = Some(from);
    let mut step = 0;
    while let Some(current) = level {
        let target = descend_mut(to, offset + step).ok_or_else(incompatible)?;
        for decl in current
            .declared_slots()
            .into_iter()
            .filter(|d| !d.class_level)
        {
            let value = current
                .read_slot(decl.name)
                .ok_or_else(|| FieldAccessError::Inaccessible {
                    owner: current.runtime_type().name(),
                    name: decl.name.to_string(),
                })?;
            target.write_slot(decl.name, value)?;
            copied += 1;
        }
        level = current.base();
        step += 1;
    }

    Ok(copied)
}

fn descend(target: &dyn Reflect, depth: usize) -> Option<&dyn Reflect> {
    let mut level = target;
    for _ in 0..depth {
        level = level.base()?;
    }
    Some(level)
}

fn descend_mut(target: &mut dyn Reflect, depth: usize) -> Option<&mut dyn Reflect> {
    let mut level = target;
    for _ in 0..depth {
        level = level.base_mut()?;
    }
    Some(level)
}

/// Implement [`Reflect`] for a struct
///
/// Instance slots must be `Clone + Send + 'static`. A base is named by the field
/// that embeds it; class-level slots are computed values that copy and write
/// operations skip.
///
/// ```rust
/// use tokenweave_pipeline::fields::{self, Reflect};
/// use tokenweave_pipeline::reflect;
///
/// struct Stage {
///     path: String,
/// }
///
/// struct LoginStage {
///     base: Stage,
///     attempts: u32,
/// }
///
/// reflect!(Stage { path: String });
/// reflect!(LoginStage : base base {
///     attempts: u32,
/// } static {
///     KIND: &'static str = "login",
/// });
///
/// let mut login = LoginStage { base: Stage { path: "/login".into() }, attempts: 0 };
/// let handle = fields::find_typed::<String>(&login, "path").unwrap();
/// assert_eq!(handle.depth(), 1);
/// handle.set(&mut login, "/signin".to_string()).unwrap();
/// assert_eq!(login.base.path, "/signin");
/// ```
#[macro_export]
macro_rules! reflect {
    (
        $ty:ty $(: base $base:ident)? {
            $($slot:ident : $slot_ty:ty),* $(,)?
        }
        $(static { $($cslot:ident : $cslot_ty:ty = $cval:expr),* $(,)? })?
    ) => {
        impl $crate::fields::Reflect for $ty {
            fn runtime_type(&self) -> $crate::fields::SlotType {
                $crate::fields::SlotType::of::<Self>()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn declared_slots(&self) -> ::std::vec::Vec<$crate::fields::SlotDecl> {
                ::std::vec![
                    $($crate::fields::SlotDecl::instance::<$slot_ty>(stringify!($slot)),)*
                    $($($crate::fields::SlotDecl::class_level::<$cslot_ty>(stringify!($cslot)),)*)?
                ]
            }

            #[allow(unused_variables)]
            fn read_slot(
                &self,
                name: &str,
            ) -> ::std::option::Option<::std::boxed::Box<dyn ::std::any::Any + Send>> {
                $(
                    if name == stringify!($slot) {
                        let value: $slot_ty = ::std::clone::Clone::clone(&self.$slot);
                        return ::std::option::Option::Some(::std::boxed::Box::new(value));
                    }
                )*
                $($(
                    if name == stringify!($cslot) {
                        let value: $cslot_ty = $cval;
                        return ::std::option::Option::Some(::std::boxed::Box::new(value));
                    }
                )*)?
                ::std::option::Option::None
            }

            #[allow(unused_variables)]
            fn write_slot(
                &mut self,
                name: &str,
                value: ::std::boxed::Box<dyn ::std::any::Any + Send>,
            ) -> $crate::error::FieldResult<()> {
                $(
                    if name == stringify!($slot) {
                        let value = value.downcast::<$slot_ty>().map_err(|_| {
                            $crate::error::FieldAccessError::TypeMismatch {
                                owner: ::std::any::type_name::<Self>(),
                                name: name.to_string(),
                                declared: ::std::any::type_name::<$slot_ty>(),
                                requested: "<erased>",
                            }
                        })?;
                        self.$slot = *value;
                        return ::std::result::Result::Ok(());
                    }
                )*
                $($(
                    if name == stringify!($cslot) {
                        return ::std::result::Result::Err(
                            $crate::error::FieldAccessError::Inaccessible {
                                owner: ::std::any::type_name::<Self>(),
                                name: name.to_string(),
                            },
                        );
                    }
                )*)?
                ::std::result::Result::Err($crate::error::FieldAccessError::NotFound {
                    owner: ::std::any::type_name::<Self>(),
                    name: name.to_string(),
                    requested: "<erased>",
                })
            }

            $(
                fn base(&self) -> ::std::option::Option<&dyn $crate::fields::Reflect> {
                    ::std::option::Option::Some(&self.$base)
                }

                fn base_mut(&mut self) -> ::std::option::Option<&mut dyn $crate::fields::Reflect> {
                    ::std::option::Option::Some(&mut self.$base)
                }
            )?
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello;

    impl Greeter for Hello {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct Stage {
        path: String,
        greeter: Arc<dyn Greeter>,
    }

    struct LoginStage {
        base: Stage,
        path: u16,
        attempts: u32,
    }

    struct AuditedLoginStage {
        login: LoginStage,
        audit: Vec<String>,
    }

    struct Unrelated {
        path: String,
    }

    reflect!(Stage {
        path: String,
        greeter: Arc<dyn Greeter>,
    });
    reflect!(LoginStage : base base {
        path: u16,
        attempts: u32,
    } static {
        KIND: &'static str = "login",
    });
    reflect!(AuditedLoginStage : base login { audit: Vec<String> });
    reflect!(Unrelated { path: String });

    fn login() -> LoginStage {
        LoginStage {
            base: Stage {
                path: "/login".into(),
                greeter: Arc::new(Hello),
            },
            path: 8080,
            attempts: 3,
        }
    }

    #[test]
    fn test_find_prefers_most_derived_match() {
        let stage = login();
        let handle = find_typed::<u16>(&stage, "path").unwrap();
        assert_eq!(handle.depth(), 0);
        assert_eq!(handle.get::<u16>(&stage).unwrap(), 8080);
    }

    #[test]
    fn test_find_walks_to_base_on_type_mismatch() {
        let stage = login();
        let handle = find_typed::<String>(&stage, "path").unwrap();
        assert_eq!(handle.depth(), 1);
        assert_eq!(handle.declared_on(), SlotType::of::<Stage>());
        assert_eq!(handle.get::<String>(&stage).unwrap(), "/login");
    }

    #[test]
    fn test_find_by_concrete_type_of_trait_object_slot() {
        let stage = login();
        let err = find_typed::<Arc<Hello>>(&stage, "greeter").unwrap_err();
        assert!(err.is_not_found());

        let handle = find_typed::<Arc<dyn Greeter>>(&stage, "greeter").unwrap();
        assert_eq!(handle.depth(), 1);
        let greeter = handle.get::<Arc<dyn Greeter>>(&stage).unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_find_reports_not_found() {
        let stage = login();
        let err = find_typed::<bool>(&stage, "path").unwrap_err();
        assert!(err.is_not_found());
        assert!(find_typed::<String>(&stage, "missing").is_err());
    }

    #[test]
    fn test_trait_object_slot_round_trip() {
        struct Hi;
        impl Greeter for Hi {
            fn greet(&self) -> String {
                "hi".into()
            }
        }

        let mut stage = login();
        let handle = find_typed::<Arc<dyn Greeter>>(&stage, "greeter").unwrap();
        let current: Arc<dyn Greeter> = handle.get(&stage).unwrap();
        assert_eq!(current.greet(), "hello");

        handle.set::<Arc<dyn Greeter>>(&mut stage, Arc::new(Hi)).unwrap();
        assert_eq!(stage.base.greeter.greet(), "hi");
    }

    #[test]
    fn test_handle_rejects_other_owner_and_type() {
        let stage = login();
        let other = Unrelated { path: "/x".into() };
        let handle = find_typed::<String>(&stage, "path").unwrap();

        assert!(matches!(
            handle.get::<String>(&other),
            Err(FieldAccessError::Incompatible { .. })
        ));
        assert!(matches!(
            handle.get::<u16>(&stage),
            Err(FieldAccessError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_class_level_slot_is_read_only() {
        let mut stage = login();
        let handle = find_typed::<&'static str>(&stage, "KIND").unwrap();
        assert_eq!(handle.get::<&'static str>(&stage).unwrap(), "login");
        assert!(matches!(
            handle.set(&mut stage, "other"),
            Err(FieldAccessError::Inaccessible { .. })
        ));
    }

    #[test]
    fn test_copy_all_into_same_type() {
        let from = login();
        let mut to = LoginStage {
            base: Stage {
                path: String::new(),
                greeter: Arc::new(Hello),
            },
            path: 0,
            attempts: 0,
        };
        // path, attempts, base.path, base.greeter; KIND is class-level
        assert_eq!(copy_all(&from, &mut to).unwrap(), 4);
        assert_eq!(to.path, 8080);
        assert_eq!(to.attempts, 3);
        assert_eq!(to.base.path, "/login");
        assert!(Arc::ptr_eq(&to.base.greeter, &from.base.greeter));
    }

    #[test]
    fn test_copy_all_into_extension() {
        let from = login();
        let mut to = AuditedLoginStage {
            login: LoginStage {
                base: Stage {
                    path: String::new(),
                    greeter: Arc::new(Hello),
                },
                path: 0,
                attempts: 0,
            },
            audit: vec!["kept".into()],
        };
        copy_all(&from, &mut to).unwrap();
        assert_eq!(to.login.attempts, 3);
        assert_eq!(to.login.base.path, "/login");
        assert_eq!(to.audit, vec!["kept".to_string()]);
    }

    #[test]
    fn test_copy_all_between_unrelated_types() {
        let from = Unrelated { path: "/x".into() };
        let mut to = login();
        assert!(matches!(
            copy_all(&from, &mut to),
            Err(FieldAccessError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_type_name_is_short() {
        assert_eq!(login().type_name(), "LoginStage");
    }
}
