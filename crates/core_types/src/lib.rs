use std::any::Any;
use std::rc::Rc;

pub type ProcessId = u64;
pub type TimerId = u64;

/// Opaque node identity within a live document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(pub u32);

impl DomId {
    /// Reserved sentinel for "unassigned/invalid" identity.
    pub const INVALID: DomId = DomId(u32::MAX);
}

/// Type-erased message/payload value. The runtime is single-threaded; all
/// values stay on the loop thread and are shared by reference count.
pub type Value = Rc<dyn Any>;

/// Message-remapping function accumulated through `Map` wrappers.
pub type TaggerFn = Rc<dyn Fn(Value) -> Value>;

pub fn val<T: 'static>(v: T) -> Value {
    Rc::new(v)
}

/// The unit value, used where a task or message carries no payload.
pub fn unit() -> Value {
    Rc::new(())
}

pub fn cast<T: 'static>(v: &Value) -> Option<&T> {
    v.downcast_ref::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrips_through_cast() {
        let v = val(41_u32);
        assert_eq!(cast::<u32>(&v), Some(&41));
        assert_eq!(cast::<i64>(&v), None);
    }

    #[test]
    fn unit_is_unit() {
        assert!(cast::<()>(&unit()).is_some());
    }
}
